//! Mack's development correlation test
//!
//! For each pair of adjacent link-ratio columns the ratios of the origins
//! shared by both columns are ranked within their column, and Spearman's
//! rank correlation is computed:
//!
//! ```text
//! T_k = 1 - 6 Σ (r_ik - s_ik)^2 / (n^3 - n)
//! ```
//!
//! The pair correlations are combined with weights `n - 1` into
//! `T = Σ w_k T_k / Σ w_k`, whose variance under independence is `1 / Σ w_k`.
//! `T` is compared with a Student's t bound using the number of usable pairs
//! as degrees of freedom.

use super::threshold::student_t_multiplier;
use super::types::{
    AcceptanceRange, AggregateOutcome, CorrelationTestResult, DevelopmentStatistic,
    InsufficientData, Outcome, RankCorrelation, Statistic, TestKind, Verdict,
};
use crate::error::{validate_critical_value, Result};
use crate::triangle::{LinkRatio, Triangle, ValueType};
use log::{debug, warn};

/// Minimum development periods for the test to be defined
const MIN_DEVELOPMENT_PERIODS: usize = 3;

/// Run the development correlation test (aggregate only)
///
/// Returns an insufficient-data verdict when the triangle has fewer than
/// three development periods or no adjacent pair of link-ratio columns
/// sharing at least two origins.
pub fn development_correlation(
    triangle: &Triangle,
    critical_value: f64,
) -> Result<CorrelationTestResult> {
    validate_critical_value(critical_value)?;

    let columns = triangle.ratio_columns();
    let periods = match triangle.value_type() {
        ValueType::Values => triangle.n_development(),
        ValueType::LinkRatios => triangle.n_development() + 1,
    };

    let aggregate = if periods < MIN_DEVELOPMENT_PERIODS {
        insufficient(
            triangle,
            format!(
                "{} has {} development period(s), at least {} required",
                triangle.column(),
                periods,
                MIN_DEVELOPMENT_PERIODS
            ),
        )
    } else {
        let pairs: Vec<RankCorrelation> = (1..columns.len())
            .filter_map(|k| rank_correlation(&columns[k - 1], &columns[k], k))
            .collect();

        if pairs.is_empty() {
            insufficient(
                triangle,
                format!(
                    "{} has no adjacent development periods sharing two or more link ratios",
                    triangle.column()
                ),
            )
        } else {
            evaluate(triangle, pairs, critical_value)?
        }
    };

    Ok(CorrelationTestResult {
        kind: TestKind::DevelopmentCorrelation,
        critical_value,
        outcome: Outcome::Aggregate(aggregate),
    })
}

fn insufficient(triangle: &Triangle, reason: String) -> AggregateOutcome {
    warn!(
        "Development correlation inconclusive for {}: {}",
        triangle.column(),
        reason
    );
    AggregateOutcome {
        verdict: Verdict::InsufficientData(InsufficientData::new(reason)),
        statistic: None,
    }
}

fn evaluate(
    triangle: &Triangle,
    pairs: Vec<RankCorrelation>,
    critical_value: f64,
) -> Result<AggregateOutcome> {
    let total_weight: f64 = pairs.iter().map(|p| p.weight).sum();
    let t = pairs.iter().map(|p| p.weight * p.t).sum::<f64>() / total_weight;
    let variance = 1.0 / total_weight;
    let degrees_of_freedom = pairs.len();

    let multiplier = student_t_multiplier(critical_value, degrees_of_freedom)?;
    let range = AcceptanceRange::around(0.0, multiplier * variance.sqrt());
    let verdict = Verdict::from_exceeds(!range.contains(t));

    debug!(
        "Development correlation for {}: T={:.4} Var[T]={:.4} df={} bound={:.4} -> {}",
        triangle.column(),
        t,
        variance,
        degrees_of_freedom,
        range.upper,
        verdict
    );

    Ok(AggregateOutcome {
        verdict,
        statistic: Some(Statistic::Development(DevelopmentStatistic {
            t,
            variance,
            degrees_of_freedom,
            range,
            pairs,
        })),
    })
}

/// Spearman correlation of `later` against `earlier` over their shared origins
///
/// `None` when fewer than two origins are shared.
fn rank_correlation(
    earlier: &[LinkRatio],
    later: &[LinkRatio],
    column: usize,
) -> Option<RankCorrelation> {
    let (prior, current): (Vec<f64>, Vec<f64>) = later
        .iter()
        .filter_map(|l| {
            earlier
                .iter()
                .find(|e| e.origin == l.origin)
                .map(|e| (e.value, l.value))
        })
        .unzip();

    let n = current.len();
    if n < 2 {
        return None;
    }

    let r = average_ranks(&current);
    let s = average_ranks(&prior);
    let squared: f64 = r.iter().zip(&s).map(|(a, b)| (a - b).powi(2)).sum();
    let nf = n as f64;

    Some(RankCorrelation {
        column,
        size: n,
        t: 1.0 - 6.0 * squared / (nf * nf * nf - nf),
        weight: nf - 1.0,
    })
}

/// 1-based ranks with ties sharing their average rank
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            ranks[i] = rank;
        }
        start = end + 1;
    }
    ranks
}
