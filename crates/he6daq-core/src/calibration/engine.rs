//! Closed-loop offset and gain matching of the four ADC cores.

use serde::{Deserialize, Serialize};

use super::config::{CalibrationConfig, TuningConfig};
use super::error::HardwareError;
use super::events::{CalibrationEvent, CalibrationObserver, TracingObserver};
use super::hardware::{
    AdcCore, CORE_COUNT, ParameterKind, RegisterInterface, SnapshotSource, ZdokSlot,
};
use super::snapshot::{CoreMatrix, CoreStats, mean_over_std, std_ratio};

/// Size of the probe perturbation, in resolution steps.
const TEST_STEPS: f64 = 10.0;
/// Slope recorded for cores that are never solved for.
const PLACEHOLDER_SLOPE: f64 = 1.0;

/// Where a tuning procedure stands.
///
/// `Initializing` zeroes the parameter, probes it and applies the
/// linearized solution. `Probing` refines one resolution step per round.
/// The other two states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    Initializing,
    Probing,
    Converged,
    IterationExhausted,
}

/// How a tuning procedure ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub state: CalibrationState,
    /// Refinement rounds performed after the linearized solution.
    pub iterations: u32,
}

impl TuningOutcome {
    pub fn converged(&self) -> bool {
        self.state == CalibrationState::Converged
    }
}

/// Latched parameter values of one procedure plus its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningResult {
    pub values: [f64; CORE_COUNT],
    pub outcome: TuningOutcome,
}

/// Output of a full calibration of one ADC. Index `i` is core `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreCalibrationResult {
    pub slot: ZdokSlot,
    /// Millivolts, as latched by the hardware.
    pub offsets: [f64; CORE_COUNT],
    /// Percent. Core 1 is the reference and always reads 0.
    pub gains: [f64; CORE_COUNT],
    /// Picoseconds, read back without tuning.
    pub phases: [f64; CORE_COUNT],
    pub offset_outcome: TuningOutcome,
    pub gain_outcome: TuningOutcome,
}

struct Procedure {
    kind: ParameterKind,
    tuned: &'static [AdcCore],
    target: f64,
    metric: fn(&[CoreStats; CORE_COUNT]) -> [f64; CORE_COUNT],
}

const OFFSET: Procedure = Procedure {
    kind: ParameterKind::Offset,
    tuned: &AdcCore::ALL,
    target: 0.0,
    metric: mean_over_std,
};

// Core 1 is the gain reference and is never adjusted.
const GAIN: Procedure = Procedure {
    kind: ParameterKind::Gain,
    tuned: &[AdcCore::Core2, AdcCore::Core3, AdcCore::Core4],
    target: 1.0,
    metric: std_ratio,
};

impl Procedure {
    fn residual(&self, metric: f64) -> f64 {
        metric - self.target
    }

    fn within(&self, metrics: &[f64; CORE_COUNT], tolerance: f64) -> bool {
        self.tuned
            .iter()
            .all(|core| self.residual(metrics[core.index()]).abs() < tolerance)
    }

    /// Largest absolute residual over the tuned cores.
    fn worst_residual(&self, metrics: &[f64; CORE_COUNT]) -> f64 {
        self.tuned
            .iter()
            .map(|core| self.residual(metrics[core.index()]).abs())
            .fold(0.0, f64::max)
    }
}

struct TuningRun {
    state: CalibrationState,
    values: [f64; CORE_COUNT],
    slopes: [f64; CORE_COUNT],
    metrics: [f64; CORE_COUNT],
    iterations: u32,
    best_values: [f64; CORE_COUNT],
    best_metrics: [f64; CORE_COUNT],
    best_residual: f64,
}

impl TuningRun {
    fn new() -> Self {
        Self {
            state: CalibrationState::Initializing,
            values: [0.0; CORE_COUNT],
            slopes: [PLACEHOLDER_SLOPE; CORE_COUNT],
            metrics: [0.0; CORE_COUNT],
            iterations: 0,
            best_values: [0.0; CORE_COUNT],
            best_metrics: [0.0; CORE_COUNT],
            best_residual: f64::INFINITY,
        }
    }

    /// Remember the current point if its worst core beats every earlier one.
    /// Ties keep the earlier point.
    fn record(&mut self, procedure: &Procedure) {
        let worst = procedure.worst_residual(&self.metrics);
        if worst < self.best_residual {
            self.best_residual = worst;
            self.best_values = self.values;
            self.best_metrics = self.metrics;
        }
    }

    fn finish(self) -> TuningResult {
        TuningResult {
            values: self.values,
            outcome: TuningOutcome {
                state: self.state,
                iterations: self.iterations,
            },
        }
    }
}

// Quantizing or negating zero yields -0.0; report it as 0.0.
fn positive_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

fn usable_slope(slope: f64) -> bool {
    slope.is_finite() && slope != 0.0
}

/// Sign of the parameter change that moves the metric upward.
fn step_direction(slope: f64) -> f64 {
    if usable_slope(slope) { slope.signum() } else { 1.0 }
}

/// Runs the offset/gain/phase procedures against one hardware handle.
///
/// The engine borrows the handle mutably for its whole lifetime, so
/// register writes, readbacks and acquisitions happen strictly in sequence
/// and no second calibration can touch the same handle meanwhile.
///
/// # Examples
/// ```
/// use he6daq_core::calibration::{
///     CalibrationConfig, CoreCalibrationEngine, SimulatedAdc, SimulatedAdcConfig,
///     TuningConfig, ZdokSlot,
/// };
///
/// let mut adc = SimulatedAdc::new(SimulatedAdcConfig {
///     core_offsets_mv: [0.8, -1.2, 0.4, 2.0],
///     samples_per_group: 1024,
///     ..SimulatedAdcConfig::default()
/// });
/// let tuning = TuningConfig { max_iterations: 10, tolerance: 0.005 };
/// let config = CalibrationConfig {
///     slot: ZdokSlot(0),
///     offset: tuning,
///     gain: tuning,
///     phase: TuningConfig { max_iterations: 0, tolerance: 1.0 },
///     groups: 2,
/// };
/// let result = CoreCalibrationEngine::new(&mut adc).run(&config)?;
/// assert_eq!(result.gains[0], 0.0);
/// # Ok::<(), he6daq_core::calibration::HardwareError>(())
/// ```
pub struct CoreCalibrationEngine<'h, H: ?Sized, O = TracingObserver> {
    hardware: &'h mut H,
    observer: O,
}

impl<'h, H> CoreCalibrationEngine<'h, H>
where
    H: RegisterInterface + SnapshotSource + ?Sized,
{
    pub fn new(hardware: &'h mut H) -> Self {
        Self {
            hardware,
            observer: TracingObserver,
        }
    }
}

impl<'h, H, O> CoreCalibrationEngine<'h, H, O>
where
    H: RegisterInterface + SnapshotSource + ?Sized,
    O: CalibrationObserver,
{
    pub fn with_observer<P: CalibrationObserver>(
        self,
        observer: P,
    ) -> CoreCalibrationEngine<'h, H, P> {
        CoreCalibrationEngine {
            hardware: self.hardware,
            observer,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Match offsets, then gains, then read back phases.
    ///
    /// # Errors
    /// Any [`HardwareError`] from the register or snapshot collaborator is
    /// returned unchanged. Parameters written before the failure stay
    /// written.
    #[tracing::instrument(name = "calibrate_adc", level = "debug", skip_all, fields(slot = %config.slot))]
    pub fn run(&mut self, config: &CalibrationConfig) -> Result<CoreCalibrationResult, HardwareError> {
        let offset = self.calibrate_offset(config.slot, config.offset, config.groups)?;
        let gain = self.calibrate_gain(config.slot, config.gain, config.groups)?;
        let phases = self.calibrate_phase(config.slot)?;
        Ok(CoreCalibrationResult {
            slot: config.slot,
            offsets: offset.values,
            gains: gain.values,
            phases,
            offset_outcome: offset.outcome,
            gain_outcome: gain.outcome,
        })
    }

    /// Drive every core's mean-over-standard-deviation to zero.
    pub fn calibrate_offset(
        &mut self,
        slot: ZdokSlot,
        tuning: TuningConfig,
        groups: usize,
    ) -> Result<TuningResult, HardwareError> {
        self.tune(&OFFSET, slot, tuning, groups)
    }

    /// Drive the standard deviation of cores 2..4 to that of core 1.
    pub fn calibrate_gain(
        &mut self,
        slot: ZdokSlot,
        tuning: TuningConfig,
        groups: usize,
    ) -> Result<TuningResult, HardwareError> {
        let mut result = self.tune(&GAIN, slot, tuning, groups)?;
        result.values[AdcCore::Core1.index()] = 0.0;
        Ok(result)
    }

    /// Read back the current phase of every core. Nothing is adjusted.
    pub fn calibrate_phase(&mut self, slot: ZdokSlot) -> Result<[f64; CORE_COUNT], HardwareError> {
        let mut phases = [0.0; CORE_COUNT];
        for core in AdcCore::ALL {
            phases[core.index()] = self
                .hardware
                .get_parameter(slot, core, ParameterKind::Phase)?;
        }
        self.observer.on_event(&CalibrationEvent::PhaseReadback {
            slot,
            values: phases,
        });
        Ok(phases)
    }

    fn tune(
        &mut self,
        procedure: &Procedure,
        slot: ZdokSlot,
        tuning: TuningConfig,
        groups: usize,
    ) -> Result<TuningResult, HardwareError> {
        let mut run = TuningRun::new();
        loop {
            match run.state {
                CalibrationState::Initializing => {
                    self.initialize(procedure, slot, tuning, groups, &mut run)?
                }
                CalibrationState::Probing => self.refine(procedure, slot, tuning, groups, &mut run)?,
                CalibrationState::Converged => {
                    self.observer.on_event(&CalibrationEvent::Converged {
                        slot,
                        kind: procedure.kind,
                        iterations: run.iterations,
                    });
                    return Ok(run.finish());
                }
                CalibrationState::IterationExhausted => {
                    self.restore_best(procedure, slot, &mut run)?;
                    self.observer.on_event(&CalibrationEvent::IterationExhausted {
                        slot,
                        kind: procedure.kind,
                        iterations: run.iterations,
                        metrics: run.metrics,
                    });
                    return Ok(run.finish());
                }
            }
        }
    }

    fn initialize(
        &mut self,
        procedure: &Procedure,
        slot: ZdokSlot,
        tuning: TuningConfig,
        groups: usize,
        run: &mut TuningRun,
    ) -> Result<(), HardwareError> {
        let kind = procedure.kind;
        self.observer.on_event(&CalibrationEvent::Started { slot, kind });

        for core in AdcCore::ALL {
            self.hardware.set_parameter(slot, core, kind, 0.0)?;
        }
        let baseline = self.measure(procedure, slot, groups)?;

        let test_step = TEST_STEPS * kind.resolution();
        for &core in procedure.tuned {
            self.hardware.set_parameter(slot, core, kind, test_step)?;
        }
        let probed = self.measure(procedure, slot, groups)?;

        let mut estimates = [0.0; CORE_COUNT];
        for &core in procedure.tuned {
            let i = core.index();
            let slope = (probed[i] - baseline[i]) / test_step;
            run.slopes[i] = slope;
            estimates[i] = if usable_slope(slope) {
                positive_zero(-procedure.residual(baseline[i]) / slope)
            } else {
                tracing::warn!(%slot, %kind, %core, slope, "probe had no usable effect, keeping zero");
                0.0
            };
        }
        self.observer.on_event(&CalibrationEvent::ProbeComputed {
            slot,
            kind,
            test_step,
            baseline,
            probed,
            slopes: run.slopes,
            estimates,
        });

        for &core in procedure.tuned {
            let i = core.index();
            self.hardware.set_parameter(slot, core, kind, estimates[i])?;
            run.values[i] = positive_zero(self.hardware.get_parameter(slot, core, kind)?);
        }
        run.metrics = self.measure(procedure, slot, groups)?;
        run.record(procedure);
        self.observer.on_event(&CalibrationEvent::SolutionApplied {
            slot,
            kind,
            values: run.values,
            metrics: run.metrics,
        });

        run.state = if procedure.within(&run.metrics, tuning.tolerance) {
            CalibrationState::Converged
        } else {
            CalibrationState::Probing
        };
        Ok(())
    }

    fn refine(
        &mut self,
        procedure: &Procedure,
        slot: ZdokSlot,
        tuning: TuningConfig,
        groups: usize,
        run: &mut TuningRun,
    ) -> Result<(), HardwareError> {
        if run.iterations >= tuning.max_iterations {
            run.state = CalibrationState::IterationExhausted;
            return Ok(());
        }
        run.iterations += 1;

        let kind = procedure.kind;
        let step = kind.resolution();
        for &core in procedure.tuned {
            let i = core.index();
            let residual = procedure.residual(run.metrics[i]);
            let direction = step_direction(run.slopes[i]);
            if residual > tuning.tolerance {
                self.hardware
                    .set_parameter(slot, core, kind, run.values[i] - direction * step)?;
            } else if residual < -tuning.tolerance {
                self.hardware
                    .set_parameter(slot, core, kind, run.values[i] + direction * step)?;
            }
            run.values[i] = positive_zero(self.hardware.get_parameter(slot, core, kind)?);
        }
        run.metrics = self.measure(procedure, slot, groups)?;
        run.record(procedure);
        self.observer.on_event(&CalibrationEvent::IterationStep {
            slot,
            kind,
            iteration: run.iterations,
            values: run.values,
            metrics: run.metrics,
        });

        if procedure.within(&run.metrics, tuning.tolerance) {
            run.state = CalibrationState::Converged;
        }
        Ok(())
    }

    /// Latch the best point seen so far back into the hardware. The returned
    /// values are the readbacks, so they match what the hardware holds.
    fn restore_best(
        &mut self,
        procedure: &Procedure,
        slot: ZdokSlot,
        run: &mut TuningRun,
    ) -> Result<(), HardwareError> {
        if run.best_values == run.values {
            return Ok(());
        }
        let kind = procedure.kind;
        tracing::debug!(%slot, %kind, best = run.best_residual, "restoring best point");
        for &core in procedure.tuned {
            let i = core.index();
            self.hardware
                .set_parameter(slot, core, kind, run.best_values[i])?;
            run.values[i] = positive_zero(self.hardware.get_parameter(slot, core, kind)?);
        }
        run.metrics = run.best_metrics;
        Ok(())
    }

    fn measure(
        &mut self,
        procedure: &Procedure,
        slot: ZdokSlot,
        groups: usize,
    ) -> Result<[f64; CORE_COUNT], HardwareError> {
        let raw = self.hardware.acquire(slot, groups)?;
        let stats = CoreMatrix::from_raw(&raw)?.stats()?;
        Ok((procedure.metric)(&stats))
    }
}
