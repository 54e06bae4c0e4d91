//! Error types for triangle loading and diagnostics

use thiserror::Error;

/// All errors generated by the diagnostics library.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("invalid critical value {value}: must lie in [0, 1]")]
    InvalidParameter { value: f64 },

    #[error("column '{column}' not found (available: {})", .available.join(", "))]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    #[error("business line '{0}' not found in triangle source")]
    BusinessLineNotFound(String),

    #[error("invalid test kind '{0}': expected 'valuation correlation' or 'development correlation'")]
    InvalidTestKind(String),

    #[error("invalid triangle: {0}")]
    InvalidTriangle(String),

    #[error("failed to build reference distribution: {0}")]
    Distribution(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiagnosticsError {
    /// Usage errors are reported to the caller and never retried.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            DiagnosticsError::InvalidParameter { .. }
                | DiagnosticsError::ColumnNotFound { .. }
                | DiagnosticsError::BusinessLineNotFound(_)
                | DiagnosticsError::InvalidTestKind(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DiagnosticsError>;

/// Reject critical values outside the closed unit interval (NaN included).
pub fn validate_critical_value(value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(DiagnosticsError::InvalidParameter { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_critical_value_bounds() {
        assert!(validate_critical_value(0.0).is_ok());
        assert!(validate_critical_value(1.0).is_ok());
        assert!(validate_critical_value(0.1).is_ok());
        assert!(matches!(
            validate_critical_value(1.2),
            Err(DiagnosticsError::InvalidParameter { .. })
        ));
        assert!(validate_critical_value(-0.01).is_err());
        assert!(validate_critical_value(f64::NAN).is_err());
    }

    #[test]
    fn test_column_not_found_message_lists_columns() {
        let err = DiagnosticsError::ColumnNotFound {
            column: "reported".to_string(),
            available: vec!["paid".to_string(), "incurred".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "column 'reported' not found (available: paid, incurred)"
        );
        assert!(err.is_usage_error());
    }
}
