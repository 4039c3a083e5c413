//! ADC core calibration.
//!
//! The four interleaved cores of an ADC drift apart in offset, gain and
//! phase; the mismatch shows up as fixed-pattern spurs. This module matches
//! the cores in closed loop:
//! - `hardware`: slot/core/parameter identifiers and the collaborator traits
//!   ([`RegisterInterface`], [`SnapshotSource`])
//! - `snapshot`: raw snapshot matrices, the raw-to-physical column reorder
//!   and per-core statistics
//! - `engine`: the offset and gain procedures and the phase readback
//! - `events`: diagnostics emitted at each milestone of a run
//! - `sim`: a deterministic ADC model for dry runs and tests
//!
//! Offsets are tuned on all four cores; gains on cores 2..4 against core 1.
//! Each procedure zeroes the parameter, probes it with ten resolution steps,
//! solves the linearized response and then refines one step at a time until
//! every core is within tolerance or the iteration budget runs out. Running
//! out is reported, not raised. Only hardware failures abort a run.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod hardware;
pub mod sim;
pub mod snapshot;

pub use config::{CalibrationConfig, ConfigError, TuningConfig};
pub use engine::{
    CalibrationState, CoreCalibrationEngine, CoreCalibrationResult, TuningOutcome, TuningResult,
};
pub use error::HardwareError;
pub use events::{CalibrationEvent, CalibrationObserver, TracingObserver};
pub use hardware::{AdcCore, CORE_COUNT, ParameterKind, RegisterInterface, SnapshotSource, ZdokSlot};
pub use sim::{RegisterWrite, SimulatedAdc, SimulatedAdcConfig};
pub use snapshot::{CoreMatrix, CoreStats, RAW_COLUMN_FOR_CORE, RawSnapshot};
