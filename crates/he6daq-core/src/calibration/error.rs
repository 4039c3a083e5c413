use thiserror::Error;

use super::hardware::{AdcCore, ParameterKind};

/// Failures talking to the ADC register or snapshot collaborators.
///
/// Any of these aborts the calibration call in progress. Running out of
/// refinement iterations is not an error and never shows up here.
///
/// # Examples
/// ```
/// use he6daq_core::calibration::HardwareError;
///
/// let err = HardwareError::Unreachable("connection refused".to_string());
/// assert!(err.to_string().contains("unreachable"));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    #[error("hardware unreachable: {0}")]
    Unreachable(String),
    #[error("register access failed ({core}, {kind}): {message}")]
    Register {
        core: AdcCore,
        kind: ParameterKind,
        message: String,
    },
    #[error("snapshot contains no samples")]
    EmptySnapshot,
    #[error("malformed snapshot: {reason}")]
    MalformedSnapshot { reason: String },
}
