//! Injectable structured log sink (spec: "inject a log sink as an optional
//! parameter to the solver session; the default is silent. No static
//! singletons."). This is distinct from the `log` crate facade used
//! elsewhere in the crate for ambient `trace!`/`debug!`/`warn!` diagnosis —
//! `SolveEvent`s are the ordered, structured record that becomes the
//! `verbose` textual log in the solve output (spec §6).

use std::fmt;

/// One entry in the solver's event trail.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveEvent {
    StrategyAttempted { camera: String, strategy: String },
    StrategySucceeded { camera: String, strategy: String, reliable: bool },
    StrategyFailed { camera: String, strategy: String, reason: String },
    StrategyRolledBack { strategy: String, reason: String },
    TierCommitted { tier: String },
    IterationSummary { iteration: u32, residual_norm: f64, damping: f64, accepted: bool },
    Converged { iterations: u32, final_residual: f64 },
    NotConverged { iterations: u32, final_residual: f64 },
    Cancelled { iterations: u32 },
    Message(String),
}

impl fmt::Display for SolveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveEvent::StrategyAttempted { camera, strategy } => {
                write!(f, "attempting `{strategy}` on camera `{camera}`")
            }
            SolveEvent::StrategySucceeded { camera, strategy, reliable } => {
                write!(f, "`{strategy}` succeeded on camera `{camera}` (reliable={reliable})")
            }
            SolveEvent::StrategyFailed { camera, strategy, reason } => {
                write!(f, "`{strategy}` failed on camera `{camera}`: {reason}")
            }
            SolveEvent::StrategyRolledBack { strategy, reason } => {
                write!(f, "rolled back `{strategy}`: {reason}")
            }
            SolveEvent::TierCommitted { tier } => write!(f, "committed {tier}"),
            SolveEvent::IterationSummary { iteration, residual_norm, damping, accepted } => {
                write!(
                    f,
                    "iter {iteration}: |r|={residual_norm:.6} lambda={damping:.3e} accepted={accepted}"
                )
            }
            SolveEvent::Converged { iterations, final_residual } => {
                write!(f, "converged after {iterations} iterations, residual={final_residual:.6}")
            }
            SolveEvent::NotConverged { iterations, final_residual } => {
                write!(f, "not converged after {iterations} iterations, residual={final_residual:.6}")
            }
            SolveEvent::Cancelled { iterations } => write!(f, "cancelled after {iterations} iterations"),
            SolveEvent::Message(msg) => write!(f, "{msg}"),
        }
    }
}

/// Sink that receives every `SolveEvent` emitted during a solve.
pub trait SolveLog {
    fn record(&mut self, event: SolveEvent);
}

/// Default sink: drops everything. Used when the caller passes no sink.
#[derive(Debug, Default)]
pub struct NullLog;

impl SolveLog for NullLog {
    fn record(&mut self, _event: SolveEvent) {}
}

/// Sink that keeps every event in order, for `verbose` output.
#[derive(Debug, Default)]
pub struct RecordingLog {
    pub events: Vec<SolveEvent>,
}

impl SolveLog for RecordingLog {
    fn record(&mut self, event: SolveEvent) {
        self.events.push(event);
    }
}

impl RecordingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_text(&self) -> Vec<String> {
        self.events.iter().map(|e| e.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_log_preserves_order() {
        let mut log = RecordingLog::new();
        log.record(SolveEvent::Message("a".into()));
        log.record(SolveEvent::Message("b".into()));
        assert_eq!(log.to_text(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn null_log_drops_everything() {
        let mut log = NullLog;
        log.record(SolveEvent::Message("dropped".into()));
    }
}
