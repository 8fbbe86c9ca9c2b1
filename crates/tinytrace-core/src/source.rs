//! Contracts between observation producers and the analysis engine.

use crate::trace::{CodeInfo, Observation};
use crate::value::Value;
use crate::Result;

/// A pull-based producer of observations.
///
/// Yields one observation per executed statement of the target, in real
/// execution order, then the target's return value. Each observation must
/// already be decoupled from later mutation of the target's variables.
pub trait ObservationSource {
    /// Identity of the traced callable.
    fn code_info(&self) -> CodeInfo;

    /// The next observation, or `None` once the target has finished.
    fn next_observation(&mut self) -> Result<Option<Observation>>;

    /// The target's return value. Only meaningful after the stream ended.
    fn return_value(&mut self) -> Result<Value>;

    /// Timestamp at which the target started, if the source knows it.
    fn start_timestamp(&self) -> Option<f64> {
        None
    }
}

/// A push-based consumer, invoked synchronously once per executed statement.
///
/// The target does not continue until `visit` returns.
pub trait StepVisitor {
    fn visit(&mut self, observation: Observation);
}

impl<V: StepVisitor + ?Sized> StepVisitor for &mut V {
    fn visit(&mut self, observation: Observation) {
        (**self).visit(observation)
    }
}
