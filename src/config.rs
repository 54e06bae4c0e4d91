//! Diagnostic configuration: default critical values and segmentation

use crate::error::{validate_critical_value, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default critical value for Mack's valuation correlation test
pub const MACK_VALUATION_CRITICAL: f64 = 0.10;

/// Default critical value for Mack's development correlation test
pub const MACK_DEVELOPMENT_CRITICAL: f64 = 0.50;

/// Configuration for a diagnostics session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Initial critical value for the valuation correlation test (all years and individual years)
    pub valuation_critical: f64,

    /// Initial critical value for the development correlation test
    pub development_critical: f64,

    /// Business line to analyse; None sums across all lines
    pub business_line: Option<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self::mack_defaults()
    }
}

impl DiagnosticsConfig {
    /// Critical values used by Mack (1997): 10% for valuation, 50% for development
    pub fn mack_defaults() -> Self {
        Self {
            valuation_critical: MACK_VALUATION_CRITICAL,
            development_critical: MACK_DEVELOPMENT_CRITICAL,
            business_line: None,
        }
    }

    /// Restrict the analysis to one business line
    pub fn with_business_line(mut self, business_line: impl Into<String>) -> Self {
        self.business_line = Some(business_line.into());
        self
    }

    /// Load from a JSON file; missing fields fall back to defaults
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse from a JSON string; missing fields fall back to defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check both critical values lie in [0, 1]
    pub fn validate(&self) -> Result<()> {
        validate_critical_value(self.valuation_critical)?;
        validate_critical_value(self.development_critical)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticsError;

    #[test]
    fn test_default_config() {
        let config = DiagnosticsConfig::default();
        assert_eq!(config.valuation_critical, 0.10);
        assert_eq!(config.development_critical, 0.50);
        assert!(config.business_line.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DiagnosticsConfig::from_json_str(r#"{"development_critical": 0.25}"#).unwrap();
        assert_eq!(config.valuation_critical, MACK_VALUATION_CRITICAL);
        assert_eq!(config.development_critical, 0.25);
    }

    #[test]
    fn test_json_out_of_range_rejected() {
        let err = DiagnosticsConfig::from_json_str(r#"{"valuation_critical": 1.5}"#).unwrap_err();
        assert!(matches!(err, DiagnosticsError::InvalidParameter { .. }));
    }

    #[test]
    fn test_with_business_line() {
        let config = DiagnosticsConfig::mack_defaults().with_business_line("Auto");
        assert_eq!(config.business_line.as_deref(), Some("Auto"));
    }
}
