//! Diagnostic events emitted while a calibration runs.

use serde::Serialize;

use super::hardware::{CORE_COUNT, ParameterKind, ZdokSlot};

/// Milestones of a calibration procedure.
///
/// `metrics` hold the quantity being driven to its target: mean over
/// standard deviation for offset, standard deviation relative to core 1 for
/// gain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CalibrationEvent {
    Started {
        slot: ZdokSlot,
        kind: ParameterKind,
    },
    ProbeComputed {
        slot: ZdokSlot,
        kind: ParameterKind,
        test_step: f64,
        baseline: [f64; CORE_COUNT],
        probed: [f64; CORE_COUNT],
        slopes: [f64; CORE_COUNT],
        estimates: [f64; CORE_COUNT],
    },
    SolutionApplied {
        slot: ZdokSlot,
        kind: ParameterKind,
        values: [f64; CORE_COUNT],
        metrics: [f64; CORE_COUNT],
    },
    IterationStep {
        slot: ZdokSlot,
        kind: ParameterKind,
        iteration: u32,
        values: [f64; CORE_COUNT],
        metrics: [f64; CORE_COUNT],
    },
    Converged {
        slot: ZdokSlot,
        kind: ParameterKind,
        iterations: u32,
    },
    IterationExhausted {
        slot: ZdokSlot,
        kind: ParameterKind,
        iterations: u32,
        metrics: [f64; CORE_COUNT],
    },
    PhaseReadback {
        slot: ZdokSlot,
        values: [f64; CORE_COUNT],
    },
}

/// Receives calibration events as they happen.
pub trait CalibrationObserver {
    fn on_event(&mut self, event: &CalibrationEvent);
}

/// Collects every event, in order.
impl CalibrationObserver for Vec<CalibrationEvent> {
    fn on_event(&mut self, event: &CalibrationEvent) {
        self.push(event.clone());
    }
}

impl<O: CalibrationObserver + ?Sized> CalibrationObserver for &mut O {
    fn on_event(&mut self, event: &CalibrationEvent) {
        (**self).on_event(event);
    }
}

/// Renders events as `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CalibrationObserver for TracingObserver {
    fn on_event(&mut self, event: &CalibrationEvent) {
        match event {
            CalibrationEvent::Started { slot, kind } => {
                tracing::info!(%slot, %kind, "calibration started");
            }
            CalibrationEvent::ProbeComputed {
                slot,
                kind,
                test_step,
                baseline,
                probed,
                estimates,
                ..
            } => {
                tracing::debug!(
                    %slot,
                    %kind,
                    "with zero settings metrics are [{}], with {:+.2} {} they are [{}]",
                    format_values(baseline, 4),
                    test_step,
                    kind.unit(),
                    format_values(probed, 4),
                );
                tracing::debug!(%slot, %kind, "linear estimates [{}]", format_values(estimates, 2));
            }
            CalibrationEvent::SolutionApplied {
                slot,
                kind,
                values,
                metrics,
            } => {
                tracing::info!(
                    %slot,
                    %kind,
                    "solution [{}] {}, metrics [{}]",
                    format_values(values, 2),
                    kind.unit(),
                    format_values(metrics, 4),
                );
            }
            CalibrationEvent::IterationStep {
                slot,
                kind,
                iteration,
                values,
                metrics,
            } => {
                tracing::debug!(
                    %slot,
                    %kind,
                    iteration,
                    "refined [{}] {}, metrics [{}]",
                    format_values(values, 2),
                    kind.unit(),
                    format_values(metrics, 4),
                );
            }
            CalibrationEvent::Converged {
                slot,
                kind,
                iterations,
            } => {
                tracing::info!(%slot, %kind, iterations, "solution good enough");
            }
            CalibrationEvent::IterationExhausted {
                slot,
                kind,
                iterations,
                metrics,
            } => {
                tracing::warn!(
                    %slot,
                    %kind,
                    iterations,
                    "maximum number of iterations reached, keeping best effort (metrics [{}])",
                    format_values(metrics, 4),
                );
            }
            CalibrationEvent::PhaseReadback { slot, values } => {
                tracing::info!(
                    %slot,
                    "phase tuning not implemented, phase parameters are [{}] ps",
                    format_values(values, 2),
                );
            }
        }
    }
}

fn format_values(values: &[f64], precision: usize) -> String {
    values
        .iter()
        .map(|v| format!("{v:+.precision$}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::{CalibrationEvent, CalibrationObserver, format_values};
    use crate::calibration::hardware::{ParameterKind, ZdokSlot};

    #[test]
    fn vec_observer_records_in_order() {
        let mut events: Vec<CalibrationEvent> = Vec::new();
        let observer: &mut dyn CalibrationObserver = &mut events;
        observer.on_event(&CalibrationEvent::Started {
            slot: ZdokSlot(0),
            kind: ParameterKind::Offset,
        });
        observer.on_event(&CalibrationEvent::Converged {
            slot: ZdokSlot(0),
            kind: ParameterKind::Offset,
            iterations: 0,
        });
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], CalibrationEvent::Converged { .. }));
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = CalibrationEvent::PhaseReadback {
            slot: ZdokSlot(1),
            values: [0.0; 4],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "phase_readback");
        assert_eq!(value["slot"], 1);
    }

    #[test]
    fn format_values_signed() {
        assert_eq!(format_values(&[1.0, -0.25], 2), "+1.00, -0.25");
    }
}
