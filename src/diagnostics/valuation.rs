//! Mack's valuation (calendar-year) correlation test
//!
//! Each link ratio is classified as large (L) or small (S) relative to the
//! median of its development column; ratios equal to the median are dropped.
//! Under the chain-ladder assumptions a calendar period should not be
//! dominated by either class, so for every valuation period
//! `Z = min(L, S)` is compared with its distribution under independence:
//!
//! ```text
//! n = L + S,  m = floor((n - 1) / 2)
//! E[Z]   = n/2 - C(n-1, m) · n / 2^n
//! Var[Z] = n(n-1)/4 - C(n-1, m) · n(n-1) / 2^n + E[Z] - E[Z]^2
//! ```
//!
//! The aggregate test sums Z, E[Z] and Var[Z] over all valuation periods.
//!
//! Reference: Mack T (1997). Measuring the variability of chain ladder reserve
//! estimates. *CAS Forum* Spring 1997, Appendix H.

use super::threshold::normal_multiplier;
use super::types::{
    AcceptanceRange, AggregateOutcome, CorrelationTestResult, InsufficientData, Outcome,
    PeriodOutcome, Statistic, TestKind, ValuationStatistic, Verdict,
};
use crate::error::Result;
use crate::triangle::Triangle;
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Large/small counts for one valuation period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    large: u32,
    small: u32,
}

impl Tally {
    fn classified(&self) -> u32 {
        self.large + self.small
    }

    /// Z, E[Z] and Var[Z] for this period
    fn moments(&self) -> (f64, f64, f64) {
        let n = self.classified();
        if n == 0 {
            return (0.0, 0.0, 0.0);
        }
        let z = self.large.min(self.small) as f64;
        let nf = n as f64;
        let m = (n - 1) / 2;
        let weight = binomial(n - 1, m) / 2f64.powi(n as i32);
        let expectation = nf / 2.0 - weight * nf;
        let variance =
            nf * (nf - 1.0) / 4.0 - weight * nf * (nf - 1.0) + expectation - expectation * expectation;
        (z, expectation, variance)
    }
}

/// Run the valuation correlation test
///
/// With `aggregate` the result is a single verdict for the whole triangle;
/// otherwise one verdict per valuation period, ordered by valuation date.
/// Periods with fewer than two classified ratios are reported as
/// insufficient data.
pub fn valuation_correlation(
    triangle: &Triangle,
    critical_value: f64,
    aggregate: bool,
) -> Result<CorrelationTestResult> {
    let multiplier = normal_multiplier(critical_value)?;
    let tallies = classify(triangle);

    let outcome = if aggregate {
        Outcome::Aggregate(aggregate_outcome(triangle, &tallies, multiplier))
    } else {
        Outcome::PerPeriod(
            tallies
                .iter()
                .map(|(valuation, tally)| period_outcome(*valuation, tally, multiplier))
                .collect(),
        )
    };

    Ok(CorrelationTestResult {
        kind: TestKind::ValuationCorrelation,
        critical_value,
        outcome,
    })
}

/// Count large and small ratios per valuation date
///
/// Every valuation date holding at least one ratio gets an entry, even when
/// all of its ratios sit on a column median.
fn classify(triangle: &Triangle) -> BTreeMap<NaiveDate, Tally> {
    let mut tallies: BTreeMap<NaiveDate, Tally> = BTreeMap::new();

    for column in triangle.ratio_columns() {
        let values: Vec<f64> = column.iter().map(|r| r.value).collect();
        let Some(column_median) = median(&values) else {
            continue;
        };
        for ratio in &column {
            let tally = tallies.entry(ratio.valuation).or_default();
            if ratio.value > column_median {
                tally.large += 1;
            } else if ratio.value < column_median {
                tally.small += 1;
            }
        }
    }

    tallies
}

fn statistic(
    z: f64,
    expectation: f64,
    variance: f64,
    classified: u32,
    multiplier: f64,
) -> ValuationStatistic {
    ValuationStatistic {
        z,
        expectation,
        variance,
        classified,
        range: AcceptanceRange::around(expectation, multiplier * variance.sqrt()),
    }
}

fn aggregate_outcome(
    triangle: &Triangle,
    tallies: &BTreeMap<NaiveDate, Tally>,
    multiplier: f64,
) -> AggregateOutcome {
    let (mut z, mut expectation, mut variance, mut classified) = (0.0, 0.0, 0.0, 0);
    for tally in tallies.values() {
        let (zj, ej, vj) = tally.moments();
        z += zj;
        expectation += ej;
        variance += vj;
        classified += tally.classified();
    }

    if variance <= 0.0 {
        let reason = format!(
            "{} needs a valuation period with at least two link ratios off their column median",
            triangle.column()
        );
        warn!("Valuation correlation inconclusive: {}", reason);
        return AggregateOutcome {
            verdict: Verdict::InsufficientData(InsufficientData::new(reason)),
            statistic: None,
        };
    }

    let stat = statistic(z, expectation, variance, classified, multiplier);
    let verdict = Verdict::from_exceeds(!stat.range.contains(z));
    debug!(
        "Valuation correlation for {}: Z={} E[Z]={:.4} Var[Z]={:.4} range=[{:.4}, {:.4}] -> {}",
        triangle.column(),
        z,
        expectation,
        variance,
        stat.range.lower,
        stat.range.upper,
        verdict
    );

    AggregateOutcome {
        verdict,
        statistic: Some(Statistic::Valuation(stat)),
    }
}

fn period_outcome(valuation: NaiveDate, tally: &Tally, multiplier: f64) -> PeriodOutcome {
    let label = valuation.format("%Y-%m-%d").to_string();

    if tally.classified() < 2 {
        return PeriodOutcome {
            label,
            valuation,
            verdict: Verdict::InsufficientData(InsufficientData::new(format!(
                "{} classified link ratio(s) in valuation period {}",
                tally.classified(),
                valuation
            ))),
            statistic: None,
        };
    }

    let (z, expectation, variance) = tally.moments();
    let stat = statistic(z, expectation, variance, tally.classified(), multiplier);
    PeriodOutcome {
        label,
        valuation,
        verdict: Verdict::from_exceeds(!stat.range.contains(z)),
        statistic: Some(stat),
    }
}

/// Median of a slice; the mean of the two middle values for even lengths
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Binomial coefficient; exact for the small arguments seen in triangles
fn binomial(n: u32, k: u32) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::fixtures::{calendar_shock_triangle, taylor_ashe_triangle};
    use crate::error::DiagnosticsError;
    use approx::assert_abs_diff_eq;

    fn total_statistic(result: &CorrelationTestResult) -> ValuationStatistic {
        match &result.outcome {
            Outcome::Aggregate(AggregateOutcome {
                statistic: Some(Statistic::Valuation(stat)),
                ..
            }) => stat.clone(),
            other => panic!("expected valuation statistic, got {:?}", other),
        }
    }

    #[test]
    fn test_tally_moments() {
        let (z, e, v) = Tally { large: 1, small: 1 }.moments();
        assert_eq!(z, 1.0);
        assert_abs_diff_eq!(e, 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(v, 0.25, epsilon = 1e-15);

        let (z, e, v) = Tally { large: 3, small: 0 }.moments();
        assert_eq!(z, 0.0);
        assert_abs_diff_eq!(e, 0.75, epsilon = 1e-15);
        assert_abs_diff_eq!(v, 0.1875, epsilon = 1e-15);

        assert_eq!(Tally { large: 1, small: 0 }.moments(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_median_and_binomial() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(binomial(8, 3), 56.0);
        assert_eq!(binomial(5, 0), 1.0);
    }

    #[test]
    fn test_calendar_shock_fails_at_ten_percent() {
        let tri = calendar_shock_triangle();
        let result = valuation_correlation(&tri, 0.10, true).unwrap();
        assert_eq!(result.statistic_exceeds_threshold(), Some(true));

        let stat = total_statistic(&result);
        assert_eq!(stat.z, 0.0);
        assert_abs_diff_eq!(stat.expectation, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stat.variance, 0.375, epsilon = 1e-12);
        assert_abs_diff_eq!(stat.range.lower, 0.492737, epsilon = 1e-5);
    }

    #[test]
    fn test_calendar_shock_passes_at_tenth_of_a_percent() {
        let tri = calendar_shock_triangle();
        let result = valuation_correlation(&tri, 0.001, true).unwrap();
        assert_eq!(result.statistic_exceeds_threshold(), Some(false));
    }

    #[test]
    fn test_per_period_labels_and_verdicts() {
        let tri = calendar_shock_triangle();
        let result = valuation_correlation(&tri, 0.10, false).unwrap();
        assert_eq!(
            result.labels(),
            vec!["2017-12-31", "2018-12-31", "2019-12-31", "2020-12-31"]
        );
        let verdicts: Vec<&str> = result.verdicts().iter().map(|v| v.label()).collect();
        assert_eq!(verdicts, vec!["Insufficient Data", "Insufficient Data", "Fail", "Fail"]);
        assert_eq!(result.statistic_exceeds_threshold(), None);

        let relaxed = valuation_correlation(&tri, 0.05, false).unwrap();
        let verdicts: Vec<&str> = relaxed.verdicts().iter().map(|v| v.label()).collect();
        assert_eq!(verdicts, vec!["Insufficient Data", "Insufficient Data", "Pass", "Pass"]);
    }

    #[test]
    fn test_taylor_ashe_passes() {
        let tri = taylor_ashe_triangle();
        let result = valuation_correlation(&tri, 0.05, true).unwrap();
        assert_eq!(result.statistic_exceeds_threshold(), Some(false));

        let stat = total_statistic(&result);
        assert_eq!(stat.z, 12.0);
        assert_abs_diff_eq!(stat.expectation, 12.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stat.variance, 3.345703125, epsilon = 1e-12);
    }

    #[test]
    fn test_single_origin_is_insufficient() {
        let tri = Triangle::from_rows("paid", 2020, &[12, 24, 36], vec![vec![100.0, 150.0, 170.0]])
            .unwrap();
        let result = valuation_correlation(&tri, 0.10, true).unwrap();
        assert!(result.is_insufficient());
        assert_eq!(result.statistic_exceeds_threshold(), None);
    }

    #[test]
    fn test_raising_critical_value_never_turns_fail_into_pass() {
        let grid = [0.0, 0.001, 0.01, 0.05, 0.1, 0.2, 0.5, 0.8, 1.0];
        for tri in [calendar_shock_triangle(), taylor_ashe_triangle()] {
            let mut failed = false;
            for &p in &grid {
                let fails = valuation_correlation(&tri, p, true)
                    .unwrap()
                    .statistic_exceeds_threshold()
                    .unwrap();
                assert!(!(failed && !fails), "Fail turned into Pass at p = {}", p);
                failed = fails;
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let tri = taylor_ashe_triangle();
        let a = valuation_correlation(&tri, 0.1, false).unwrap();
        let b = valuation_correlation(&tri, 0.1, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_critical_value() {
        let tri = taylor_ashe_triangle();
        assert!(matches!(
            valuation_correlation(&tri, 1.2, true),
            Err(DiagnosticsError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_link_ratio_triangle_gives_same_result() {
        let tri = taylor_ashe_triangle();
        let ratios = tri.link_ratios().unwrap();
        let from_values = valuation_correlation(&tri, 0.1, false).unwrap();
        let from_ratios = valuation_correlation(&ratios, 0.1, false).unwrap();
        assert_eq!(from_values, from_ratios);
    }
}
