//! Critical multipliers derived from a critical value
//!
//! A critical value `p` is the two-sided significance level: the acceptance
//! range is `center ± q(1 - p/2) · sd` for the reference quantile function `q`.
//! `p = 0` never rejects; raising `p` narrows the range.

use crate::error::{validate_critical_value, DiagnosticsError, Result};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Two-sided standard normal multiplier `Φ⁻¹(1 - p/2)`
pub fn normal_multiplier(critical_value: f64) -> Result<f64> {
    let p = validate_critical_value(critical_value)?;
    if p == 0.0 {
        return Ok(f64::INFINITY);
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| DiagnosticsError::Distribution(e.to_string()))?;
    Ok(normal.inverse_cdf(1.0 - p / 2.0))
}

/// Two-sided Student's t multiplier with `degrees_of_freedom` degrees of freedom
pub fn student_t_multiplier(critical_value: f64, degrees_of_freedom: usize) -> Result<f64> {
    let p = validate_critical_value(critical_value)?;
    if degrees_of_freedom == 0 {
        return Err(DiagnosticsError::Distribution(
            "Student's t needs at least one degree of freedom".to_string(),
        ));
    }
    if p == 0.0 {
        return Ok(f64::INFINITY);
    }
    if p == 1.0 {
        return Ok(0.0);
    }
    let t = StudentsT::new(0.0, 1.0, degrees_of_freedom as f64)
        .map_err(|e| DiagnosticsError::Distribution(e.to_string()))?;
    Ok(t.inverse_cdf(1.0 - p / 2.0))
}
