//! Input Validation
//!
//! Numerical guards shared by the configuration, curriculum and cohort checks.
//!
//! Functions:
//! - Scalar range checks
//! - Per-student vector checks

use crate::error::{Result, SimulationError};

pub fn require_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimulationError::invalid(name, format!("must be finite, got {value}")))
    }
}

/// Strictly positive and finite
pub fn require_positive(name: &'static str, value: f64) -> Result<()> {
    require_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(SimulationError::invalid(name, format!("must be > 0, got {value}")))
    }
}

pub fn require_non_negative(name: &'static str, value: f64) -> Result<()> {
    require_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(SimulationError::invalid(name, format!("must be >= 0, got {value}")))
    }
}

/// Closed unit interval [0, 1]
pub fn require_unit_interval(name: &'static str, value: f64) -> Result<()> {
    require_finite(name, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimulationError::invalid(
            name,
            format!("must lie in [0, 1], got {value}"),
        ))
    }
}

/// Every entry finite and >= 0. Reports the first offending student.
pub fn require_all_non_negative(name: &'static str, values: &[f64]) -> Result<()> {
    match values.iter().position(|&v| !v.is_finite() || v < 0.0) {
        None => Ok(()),
        Some(i) => Err(SimulationError::invalid(
            name,
            format!("student {i} has value {}, must be finite and >= 0", values[i]),
        )),
    }
}

pub fn require_length(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SimulationError::LengthMismatch {
            name,
            expected,
            actual,
        })
    }
}
