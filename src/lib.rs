//! Triangle Diagnostics - Mack's correlation tests for loss development triangles
//!
//! This library provides:
//! - Loss triangle loading from long-format CSV, per column and business line
//! - Mack's valuation (calendar-year) correlation test, in total and per period
//! - Mack's development correlation test
//! - Critical values bound to results that recompute on every change
//! - Display-agnostic grids and status lines for presentation layers

pub mod analysis;
pub mod binding;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod triangle;

// Re-export commonly used types
pub use analysis::{AnalysisSession, ColumnDiagnostics, ColumnReport, TestReport};
pub use binding::{
    AggregateStatusLabel, Change, CriticalValue, ResultGrid, TableProjection, ThresholdBinding,
};
pub use config::DiagnosticsConfig;
pub use diagnostics::{
    development_correlation, valuation_correlation, CorrelationTestResult, TestKind, TestRequest,
    Verdict,
};
pub use error::{DiagnosticsError, Result};
pub use triangle::{get_column, load_source, Triangle, TriangleAccessor, TriangleSource, ValueType};
