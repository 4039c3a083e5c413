use thiserror::Error;

/// Errors returned by packet decoding.
///
/// # Examples
/// ```
/// use he6daq_core::packet::FormatError;
///
/// let err = FormatError::LengthMismatch { expected: 8224, actual: 12 };
/// assert!(err.to_string().contains("packet length mismatch"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("packet length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("buffer too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
}
