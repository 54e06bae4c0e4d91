//! Core types for correlation test results

use super::{development_correlation, valuation_correlation};
use crate::error::{DiagnosticsError, Result};
use crate::triangle::Triangle;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which of Mack's correlation tests produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TestKind {
    /// Correlation across calendar (valuation) periods
    ValuationCorrelation,
    /// Correlation between adjacent development periods
    DevelopmentCorrelation,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::ValuationCorrelation => "valuation correlation",
            TestKind::DevelopmentCorrelation => "development correlation",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = DiagnosticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "valuation correlation" | "valuation" => Ok(TestKind::ValuationCorrelation),
            "development correlation" | "development" => Ok(TestKind::DevelopmentCorrelation),
            _ => Err(DiagnosticsError::InvalidTestKind(s.to_string())),
        }
    }
}

/// Shape of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    /// A single verdict for the whole triangle
    Aggregate,
    /// One verdict per valuation period
    PerPeriod,
}

/// A concrete test invocation
///
/// The development test is only defined in aggregate form, so the three
/// variants cover every valid (kind, scope) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TestRequest {
    /// Valuation correlation over all years
    ValuationTotal,
    /// Valuation correlation for each valuation period
    ValuationByPeriod,
    /// Development correlation
    Development,
}

impl TestRequest {
    /// The aggregate request for a test kind
    pub fn aggregate(kind: TestKind) -> Self {
        match kind {
            TestKind::ValuationCorrelation => TestRequest::ValuationTotal,
            TestKind::DevelopmentCorrelation => TestRequest::Development,
        }
    }

    pub fn kind(&self) -> TestKind {
        match self {
            TestRequest::ValuationTotal | TestRequest::ValuationByPeriod => {
                TestKind::ValuationCorrelation
            }
            TestRequest::Development => TestKind::DevelopmentCorrelation,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            TestRequest::ValuationByPeriod => Scope::PerPeriod,
            TestRequest::ValuationTotal | TestRequest::Development => Scope::Aggregate,
        }
    }

    /// Heading used when presenting the result
    pub fn title(&self) -> &'static str {
        match self {
            TestRequest::ValuationTotal => "Mack Valuation Correlation Test - All Years",
            TestRequest::ValuationByPeriod => "Mack Valuation Correlation Test - Individual Years",
            TestRequest::Development => "Mack Development Correlation Test",
        }
    }

    /// Evaluate this request against a triangle
    pub fn run(&self, triangle: &Triangle, critical_value: f64) -> Result<CorrelationTestResult> {
        match self {
            TestRequest::ValuationTotal => valuation_correlation(triangle, critical_value, true),
            TestRequest::ValuationByPeriod => valuation_correlation(triangle, critical_value, false),
            TestRequest::Development => development_correlation(triangle, critical_value),
        }
    }
}

/// The triangle lacks the periods or ratios a test needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("insufficient data: {reason}")]
pub struct InsufficientData {
    pub reason: String,
}

impl InsufficientData {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outcome of comparing a statistic against its threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Verdict {
    /// Statistic within the acceptance range
    Pass,
    /// Statistic exceeds the threshold; the assumption is violated
    Fail,
    /// Test undefined for this triangle or period
    InsufficientData(InsufficientData),
}

impl Verdict {
    pub fn from_exceeds(exceeds: bool) -> Self {
        if exceeds {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }

    /// `Some(true)` for Fail, `Some(false)` for Pass, `None` when inconclusive
    pub fn exceeds_threshold(&self) -> Option<bool> {
        match self {
            Verdict::Pass => Some(false),
            Verdict::Fail => Some(true),
            Verdict::InsufficientData(_) => None,
        }
    }

    /// The conclusive outcome, or the reason there is none
    pub fn conclusive(&self) -> std::result::Result<bool, InsufficientData> {
        match self {
            Verdict::Pass => Ok(false),
            Verdict::Fail => Ok(true),
            Verdict::InsufficientData(reason) => Err(reason.clone()),
        }
    }

    pub fn is_conclusive(&self) -> bool {
        !matches!(self, Verdict::InsufficientData(_))
    }

    /// Display text: "Pass", "Fail" or "Insufficient Data"
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "Pass",
            Verdict::Fail => "Fail",
            Verdict::InsufficientData(_) => "Insufficient Data",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Closed interval a statistic must stay within to pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AcceptanceRange {
    pub lower: f64,
    pub upper: f64,
}

impl AcceptanceRange {
    /// Symmetric range `center ± half_width`
    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            lower: center - half_width,
            upper: center + half_width,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        !(value < self.lower || value > self.upper)
    }
}

/// Mack's Z statistic for one valuation period or the whole triangle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationStatistic {
    /// Sum of min(L, S)
    pub z: f64,
    /// Expected value of Z under independence
    pub expectation: f64,
    pub variance: f64,
    /// Number of ratios classified as large or small
    pub classified: u32,
    pub range: AcceptanceRange,
}

/// Spearman rank correlation between two adjacent link-ratio columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankCorrelation {
    /// Index of the later link-ratio column in the pair
    pub column: usize,
    /// Number of origins shared by the pair
    pub size: usize,
    pub t: f64,
    pub weight: f64,
}

/// Mack's T statistic for the development correlation test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevelopmentStatistic {
    /// Weighted mean of the pair correlations
    pub t: f64,
    pub variance: f64,
    /// Number of usable column pairs
    pub degrees_of_freedom: usize,
    pub range: AcceptanceRange,
    pub pairs: Vec<RankCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statistic {
    Valuation(ValuationStatistic),
    Development(DevelopmentStatistic),
}

/// Result for the whole triangle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateOutcome {
    pub verdict: Verdict,
    /// Absent when the test is inconclusive
    pub statistic: Option<Statistic>,
}

/// Result for one valuation period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodOutcome {
    pub label: String,
    pub valuation: NaiveDate,
    pub verdict: Verdict,
    pub statistic: Option<ValuationStatistic>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Aggregate(AggregateOutcome),
    /// Ordered by valuation date
    PerPeriod(Vec<PeriodOutcome>),
}

/// Outcome of one correlation test evaluation
///
/// Derived purely from the triangle, the critical value and the request;
/// identical inputs produce equal results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationTestResult {
    pub kind: TestKind,
    pub critical_value: f64,
    pub outcome: Outcome,
}

impl CorrelationTestResult {
    pub fn scope(&self) -> Scope {
        match self.outcome {
            Outcome::Aggregate(_) => Scope::Aggregate,
            Outcome::PerPeriod(_) => Scope::PerPeriod,
        }
    }

    /// Valuation-period labels aligned with `verdicts()`; empty for aggregate results
    pub fn labels(&self) -> Vec<&str> {
        match &self.outcome {
            Outcome::Aggregate(_) => Vec::new(),
            Outcome::PerPeriod(periods) => periods.iter().map(|p| p.label.as_str()).collect(),
        }
    }

    /// One verdict for an aggregate result, one per period otherwise
    pub fn verdicts(&self) -> Vec<&Verdict> {
        match &self.outcome {
            Outcome::Aggregate(agg) => vec![&agg.verdict],
            Outcome::PerPeriod(periods) => periods.iter().map(|p| &p.verdict).collect(),
        }
    }

    /// Verdict of an aggregate result
    pub fn aggregate_verdict(&self) -> Option<&Verdict> {
        match &self.outcome {
            Outcome::Aggregate(agg) => Some(&agg.verdict),
            Outcome::PerPeriod(_) => None,
        }
    }

    /// For an aggregate result: `Some(true)` means the assumption is violated
    pub fn statistic_exceeds_threshold(&self) -> Option<bool> {
        self.aggregate_verdict().and_then(Verdict::exceeds_threshold)
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self.aggregate_verdict(), Some(Verdict::InsufficientData(_)))
    }
}
