//! Mack's correlation diagnostics for loss development triangles
//!
//! Two tests gate the validity of the chain-ladder method:
//! - **Valuation correlation**: calendar periods must not systematically
//!   push link ratios above or below their column medians
//! - **Development correlation**: link ratios of adjacent development periods
//!   must not be rank-correlated
//!
//! Both are pure functions of a [`Triangle`](crate::triangle::Triangle) and a
//! critical value in [0, 1]. A test that cannot be evaluated yields
//! [`Verdict::InsufficientData`] rather than an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use triangle_diagnostics::diagnostics::{valuation_correlation, development_correlation};
//!
//! let total = valuation_correlation(&triangle, 0.10, true)?;
//! println!("Status: {}", total.aggregate_verdict().unwrap());
//!
//! let dev = development_correlation(&triangle, 0.50)?;
//! println!("Fail? {:?}", dev.statistic_exceeds_threshold());
//! ```

mod development;
mod threshold;
mod types;
mod valuation;

pub use development::development_correlation;
pub use threshold::{normal_multiplier, student_t_multiplier};
pub use types::{
    AcceptanceRange, AggregateOutcome, CorrelationTestResult, DevelopmentStatistic,
    InsufficientData, Outcome, PeriodOutcome, RankCorrelation, Scope, Statistic, TestKind,
    TestRequest, ValuationStatistic, Verdict,
};
pub use valuation::valuation_correlation;
