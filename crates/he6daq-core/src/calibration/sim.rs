//! Deterministic model of a four-core interleaved ADC.
//!
//! Each core digitizes the same sine tone with its own offset and gain
//! mismatch. Register writes are quantized to the parameter resolution and
//! shift the core's offset (mV) or scale its gain (%). Snapshots come back
//! in raw interleave order, clipped to signed 8 bits.

use std::collections::HashMap;
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::error::HardwareError;
use super::hardware::{
    AdcCore, CORE_COUNT, ParameterKind, RegisterInterface, SnapshotSource, ZdokSlot,
};
use super::snapshot::{RAW_COLUMN_FOR_CORE, RawSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedAdcConfig {
    /// Intrinsic offset of each core, in mV.
    pub core_offsets_mv: [f64; CORE_COUNT],
    /// Intrinsic gain error of each core, in percent.
    pub core_gains_pct: [f64; CORE_COUNT],
    pub mv_per_lsb: f64,
    /// Tone amplitude before any gain error, in LSB.
    pub amplitude_lsb: f64,
    /// Rows (samples per core) in one snapshot burst.
    pub samples_per_group: usize,
    /// Tone frequency relative to the aggregate sample rate.
    pub tone_cycles_per_sample: f64,
}

impl Default for SimulatedAdcConfig {
    fn default() -> Self {
        Self {
            core_offsets_mv: [0.0; CORE_COUNT],
            core_gains_pct: [0.0; CORE_COUNT],
            mv_per_lsb: 2.0,
            amplitude_lsb: 40.0,
            samples_per_group: 4096,
            tone_cycles_per_sample: 0.061_803_398_874_989_48,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterWrite {
    pub slot: ZdokSlot,
    pub core: AdcCore,
    pub kind: ParameterKind,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct SimulatedAdc {
    config: SimulatedAdcConfig,
    parameters: HashMap<(ZdokSlot, AdcCore, ParameterKind), f64>,
    writes: Vec<RegisterWrite>,
    acquisitions: usize,
}

impl SimulatedAdc {
    pub fn new(config: SimulatedAdcConfig) -> Self {
        Self {
            config,
            parameters: HashMap::new(),
            writes: Vec::new(),
            acquisitions: 0,
        }
    }

    pub fn config(&self) -> &SimulatedAdcConfig {
        &self.config
    }

    /// Currently latched value of one parameter.
    pub fn parameter(&self, slot: ZdokSlot, core: AdcCore, kind: ParameterKind) -> f64 {
        self.parameters
            .get(&(slot, core, kind))
            .copied()
            .unwrap_or(0.0)
    }

    /// Every write received so far, before quantization.
    pub fn register_writes(&self) -> &[RegisterWrite] {
        &self.writes
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }

    fn sample(&self, slot: ZdokSlot, core: AdcCore, n: usize) -> i8 {
        let i = core.index();
        let gain_pct =
            self.config.core_gains_pct[i] + self.parameter(slot, core, ParameterKind::Gain);
        let offset_mv =
            self.config.core_offsets_mv[i] + self.parameter(slot, core, ParameterKind::Offset);
        let phase = TAU * self.config.tone_cycles_per_sample * n as f64;
        let value = self.config.amplitude_lsb * (1.0 + gain_pct / 100.0) * phase.sin()
            + offset_mv / self.config.mv_per_lsb;
        value.round().clamp(i8::MIN as f64, i8::MAX as f64) as i8
    }
}

fn quantize(value: f64, kind: ParameterKind) -> f64 {
    let latched = (value / kind.resolution()).round() * kind.resolution();
    if latched == 0.0 { 0.0 } else { latched }
}

impl RegisterInterface for SimulatedAdc {
    fn set_parameter(
        &mut self,
        slot: ZdokSlot,
        core: AdcCore,
        kind: ParameterKind,
        value: f64,
    ) -> Result<(), HardwareError> {
        if !value.is_finite() {
            return Err(HardwareError::Register {
                core,
                kind,
                message: format!("cannot latch non-finite value {value}"),
            });
        }
        self.writes.push(RegisterWrite {
            slot,
            core,
            kind,
            value,
        });
        self.parameters
            .insert((slot, core, kind), quantize(value, kind));
        Ok(())
    }

    fn get_parameter(
        &mut self,
        slot: ZdokSlot,
        core: AdcCore,
        kind: ParameterKind,
    ) -> Result<f64, HardwareError> {
        Ok(self.parameter(slot, core, kind))
    }
}

impl SnapshotSource for SimulatedAdc {
    fn acquire(&mut self, slot: ZdokSlot, groups: usize) -> Result<RawSnapshot, HardwareError> {
        self.acquisitions += 1;
        let rows = groups * self.config.samples_per_group;
        let mut snapshot = RawSnapshot::default();
        for group in 0..groups {
            let first = group * self.config.samples_per_group;
            let burst = (first..first + self.config.samples_per_group)
                .map(|row| {
                    let physical: [i8; CORE_COUNT] = std::array::from_fn(|i| {
                        let core = AdcCore::ALL[i];
                        self.sample(slot, core, row * CORE_COUNT + i)
                    });
                    RAW_COLUMN_FOR_CORE.map(|core_index| physical[core_index])
                })
                .collect();
            snapshot.extend(RawSnapshot::from_rows(burst));
        }
        debug_assert_eq!(snapshot.len(), rows);
        Ok(snapshot)
    }
}
