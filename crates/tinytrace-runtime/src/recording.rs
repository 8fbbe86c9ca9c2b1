//! Raw observation logs, for analyzing a run after the fact.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tinytrace_core::trace::unix_timestamp;
use tinytrace_core::{CodeInfo, Error, Observation, ObservationSource, Result, StepVisitor, Value};

/// Every observation of one run, in execution order, plus the return value.
///
/// Collects observations as a [`StepVisitor`] while the target runs, and
/// replays them as an [`ObservationSource`] for [`Analyzer::drain`].
///
/// [`Analyzer::drain`]: tinytrace_analysis::Analyzer::drain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationLog {
    code_info: CodeInfo,
    start_timestamp: f64,
    observations: Vec<Observation>,
    returned_value: Option<Value>,
    #[serde(skip)]
    cursor: usize,
}

impl ObservationLog {
    /// Starts an empty log, stamped with the current time.
    pub fn new(code_info: CodeInfo) -> Self {
        Self {
            code_info,
            start_timestamp: unix_timestamp(),
            observations: Vec::new(),
            returned_value: None,
            cursor: 0,
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Whether the target ran to completion.
    pub fn is_complete(&self) -> bool {
        self.returned_value.is_some()
    }

    pub fn set_returned_value(&mut self, value: Value) {
        self.returned_value = Some(value);
    }

    /// Rewind replay to the first observation.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

impl StepVisitor for ObservationLog {
    fn visit(&mut self, observation: Observation) {
        self.observations.push(observation);
    }
}

impl ObservationSource for ObservationLog {
    fn code_info(&self) -> CodeInfo {
        self.code_info.clone()
    }

    fn next_observation(&mut self) -> Result<Option<Observation>> {
        let next = self.observations.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }

    fn return_value(&mut self) -> Result<Value> {
        self.returned_value.clone().ok_or_else(|| {
            Error::Other(format!(
                "observation log for '{}' has no return value; the run did not finish",
                self.code_info.name
            ))
        })
    }

    fn start_timestamp(&self) -> Option<f64> {
        Some(self.start_timestamp)
    }
}
