use std::time::Instant;

use tinytrace_core::{Observation, Step};
use tracing::debug;

use crate::line_stats::LineStatsTracker;
use crate::variables::VariableTracker;

/// How elapsed time per step is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timing {
    /// Monotonic clock between the end of the previous step's bookkeeping
    /// and the arrival of the current observation. Includes the engine's own
    /// overhead for the previous step.
    #[default]
    WallClock,
    /// Difference between consecutive observation timestamps. Deterministic
    /// for recorded logs.
    Timestamps,
}

#[derive(Debug)]
enum Clock {
    Wall(Instant),
    Stamps(Option<f64>),
}

impl Clock {
    fn new(timing: Timing, start_timestamp: Option<f64>) -> Self {
        match timing {
            Timing::WallClock => Clock::Wall(Instant::now()),
            Timing::Timestamps => Clock::Stamps(start_timestamp),
        }
    }

    fn elapsed(&self, observation: &Observation) -> f64 {
        match self {
            Clock::Wall(mark) => mark.elapsed().as_secs_f64(),
            Clock::Stamps(Some(last)) => (observation.timestamp - last).max(0.0),
            Clock::Stamps(None) => 0.0,
        }
    }

    fn mark(&mut self, observation: &Observation) {
        match self {
            Clock::Wall(mark) => *mark = Instant::now(),
            Clock::Stamps(last) => *last = Some(observation.timestamp),
        }
    }
}

/// Turns observations into steps.
///
/// Assigns step ids, times each step, and delegates line accounting and
/// environment diffing to the two trackers it composes.
#[derive(Debug)]
pub struct StepRecorder {
    next_step: u64,
    clock: Clock,
    lines: LineStatsTracker,
    variables: VariableTracker,
}

impl StepRecorder {
    pub fn new(timing: Timing) -> Self {
        Self::with_start(timing, None)
    }

    /// Creates a recorder whose first step is timed from `start_timestamp`
    /// under [`Timing::Timestamps`].
    pub fn with_start(timing: Timing, start_timestamp: Option<f64>) -> Self {
        Self {
            next_step: 1,
            clock: Clock::new(timing, start_timestamp),
            lines: LineStatsTracker::new(),
            variables: VariableTracker::new(),
        }
    }

    /// Restarts wall-clock timing, typically right before the target starts.
    pub fn restart_clock(&mut self) {
        if let Clock::Wall(mark) = &mut self.clock {
            *mark = Instant::now();
        }
    }

    /// Process one observation into the next step.
    pub fn advance(&mut self, observation: Observation) -> Step {
        let step = self.next_step;
        self.next_step += 1;

        let elapsed = self.clock.elapsed(&observation);
        let line_runtime = self.lines.record(observation.line, elapsed);
        let actions = self.variables.diff(step, observation.line, &observation.env);

        debug!(step, line = observation.line, elapsed, actions = actions.len(), "recorded step");

        self.clock.mark(&observation);
        Step {
            step,
            timestamp: observation.timestamp,
            line_num: observation.line,
            line_runtime,
            actions,
        }
    }

    /// Number of steps recorded so far.
    pub fn steps_recorded(&self) -> u64 {
        self.next_step - 1
    }

    pub fn lines(&self) -> &LineStatsTracker {
        &self.lines
    }

    pub fn variables(&self) -> &VariableTracker {
        &self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinytrace_core::{Action, Environment, Value};

    fn observation(timestamp: f64, line: u32, x: i64) -> Observation {
        let mut env = Environment::new();
        env.insert("x".to_string(), Value::Int(x));
        Observation::with_timestamp(timestamp, line, env)
    }

    #[test]
    fn test_step_ids_are_contiguous() {
        let mut recorder = StepRecorder::new(Timing::WallClock);
        let ids: Vec<u64> = (0..4).map(|i| recorder.advance(observation(0.0, 1, i)).step).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(recorder.steps_recorded(), 4);
    }

    #[test]
    fn test_timestamp_timing_uses_observation_deltas() {
        let mut recorder = StepRecorder::with_start(Timing::Timestamps, Some(10.0));
        let first = recorder.advance(observation(10.5, 3, 0));
        let second = recorder.advance(observation(11.0, 3, 0));
        assert!((first.line_runtime.total_time - 0.5).abs() < 1e-9);
        assert_eq!(second.line_runtime.times_executed, 2);
        assert!((second.line_runtime.total_time - 1.0).abs() < 1e-9);
        assert!(second.actions.is_empty());
    }

    #[test]
    fn test_step_carries_actions_and_line() {
        let mut recorder = StepRecorder::new(Timing::Timestamps);
        let step = recorder.advance(observation(1.0, 7, 2));
        assert_eq!(step.line_num, 7);
        assert_eq!(step.timestamp, 1.0);
        assert_eq!(step.line_runtime.total_time, 0.0);
        assert!(matches!(step.actions.as_slice(), [Action::InitVar { var, .. }] if var == "x"));
    }
}
