//! Identifiers and collaborator traits for the ADC hardware.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::HardwareError;
use super::snapshot::RawSnapshot;

/// Number of interleaved cores in one ADC.
pub const CORE_COUNT: usize = 4;

/// Physical slot of one ADC card on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZdokSlot(pub u8);

impl fmt::Display for ZdokSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZDOK{}", self.0)
    }
}

/// One of the four interleaved ADC cores, numbered from 1 as the SPI
/// parameter interface numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdcCore {
    Core1 = 1,
    Core2 = 2,
    Core3 = 3,
    Core4 = 4,
}

impl AdcCore {
    pub const ALL: [AdcCore; CORE_COUNT] =
        [AdcCore::Core1, AdcCore::Core2, AdcCore::Core3, AdcCore::Core4];

    /// Zero-based position in per-core arrays.
    pub fn index(self) -> usize {
        self as usize - 1
    }

    /// One-based core number used for device addressing.
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for AdcCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core{}", self.number())
    }
}

/// Per-core analog tuning parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Millivolts.
    Offset,
    /// Percent.
    Gain,
    /// Picoseconds.
    Phase,
}

impl ParameterKind {
    /// Step size the hardware quantizes written values to.
    pub fn resolution(self) -> f64 {
        match self {
            ParameterKind::Offset => 0.4,
            ParameterKind::Gain => 0.14,
            ParameterKind::Phase => 0.11,
        }
    }

    /// Documented tuning range. Not enforced: out-of-range values are passed
    /// through to the hardware.
    pub fn range(self) -> (f64, f64) {
        match self {
            ParameterKind::Offset => (-50.0, 50.0),
            ParameterKind::Gain => (-18.0, 18.0),
            ParameterKind::Phase => (-14.0, 14.0),
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ParameterKind::Offset => "mV",
            ParameterKind::Gain => "%",
            ParameterKind::Phase => "ps",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParameterKind::Offset => "offset",
            ParameterKind::Gain => "gain",
            ParameterKind::Phase => "phase",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-core SPI parameter access.
///
/// Written values are quantized by the hardware; `get_parameter` returns the
/// value actually latched.
pub trait RegisterInterface {
    fn set_parameter(
        &mut self,
        slot: ZdokSlot,
        core: AdcCore,
        kind: ParameterKind,
        value: f64,
    ) -> Result<(), HardwareError>;

    fn get_parameter(
        &mut self,
        slot: ZdokSlot,
        core: AdcCore,
        kind: ParameterKind,
    ) -> Result<f64, HardwareError>;
}

/// Raw sample snapshots read from device memory.
pub trait SnapshotSource {
    /// Capture `groups` consecutive snapshot bursts and return them as one
    /// matrix in raw interleave order.
    fn acquire(&mut self, slot: ZdokSlot, groups: usize) -> Result<RawSnapshot, HardwareError>;
}
