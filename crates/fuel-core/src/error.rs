//! Error taxonomy for the fuel engine.

use thiserror::Error;

/// Errors raised while validating inputs or running the fuel pipeline.
///
/// None of these escape the manager boundary as panics: update methods log
/// and return them with prior state untouched, and the calculation pipeline
/// converts them into an empty result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FuelError {
    /// Malformed or missing required numeric fields.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// A recompute was requested before the minimum state was present.
    #[error("insufficient data for fuel calculation: {0}")]
    InsufficientData(String),

    /// Unexpected failure inside the calculation pipeline.
    #[error("fuel computation failed: {0}")]
    Computation(String),
}

impl FuelError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Reject NaN/inf and negative values for a named field.
pub(crate) fn require_non_negative(field: &'static str, value: f64) -> Result<(), FuelError> {
    if !value.is_finite() {
        return Err(FuelError::invalid(field, format!("{value} is not a finite number")));
    }
    if value < 0.0 {
        return Err(FuelError::invalid(field, format!("{value} must not be negative")));
    }
    Ok(())
}

/// Reject NaN/inf and values that are not strictly positive.
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<(), FuelError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FuelError::invalid(field, format!("{value} must be a positive number")));
    }
    Ok(())
}
