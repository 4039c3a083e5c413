use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hardware::ZdokSlot;

/// Iteration budget and convergence tolerance for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Refinement rounds allowed after the linearized estimate.
    pub max_iterations: u32,
    /// Largest accepted residual, as a fraction of the standard deviation.
    pub tolerance: f64,
}

/// Parameters of one calibration run. Every field is supplied by the caller.
///
/// # Examples
/// ```
/// use he6daq_core::calibration::CalibrationConfig;
///
/// let json = r#"{
///     "slot": 0,
///     "offset": { "max_iterations": 10, "tolerance": 0.005 },
///     "gain": { "max_iterations": 10, "tolerance": 0.005 },
///     "phase": { "max_iterations": 0, "tolerance": 1.0 },
///     "groups": 8
/// }"#;
/// let config: CalibrationConfig = serde_json::from_str(json)?;
/// config.validate()?;
/// assert_eq!(config.groups, 8);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub slot: ZdokSlot,
    pub offset: TuningConfig,
    pub gain: TuningConfig,
    /// Carried for a uniform shape; phase tuning only reads back.
    pub phase: TuningConfig,
    /// Snapshot bursts captured per measurement.
    pub groups: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("snapshot group count must be at least 1")]
    NoGroups,
    #[error("{parameter} tolerance must be a positive finite number, got {value}")]
    InvalidTolerance { parameter: &'static str, value: f64 },
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groups == 0 {
            return Err(ConfigError::NoGroups);
        }
        for (parameter, tuning) in [("offset", &self.offset), ("gain", &self.gain)] {
            if !(tuning.tolerance.is_finite() && tuning.tolerance > 0.0) {
                return Err(ConfigError::InvalidTolerance {
                    parameter,
                    value: tuning.tolerance,
                });
            }
        }
        Ok(())
    }
}
