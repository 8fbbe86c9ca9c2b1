//! Trace types shared by the runtime, the analysis engine and reporters.
//!
//! [`AnalysisResult`] is the only artifact that leaves the engine; every
//! reporter and the persistence codec work from these types.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{Key, TypeTag, Value};

/// A flat, first-declared-order snapshot of a program's variables.
pub type Environment = IndexMap<String, Value>;

/// Seconds since the Unix epoch, as a float.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// One raw snapshot of program state at a single executed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: f64,
    pub line: u32,
    pub env: Environment,
}

impl Observation {
    /// Creates an observation stamped with the current time.
    pub fn new(line: u32, env: Environment) -> Self {
        Self {
            timestamp: unix_timestamp(),
            line,
            env,
        }
    }

    pub fn with_timestamp(timestamp: f64, line: u32, env: Environment) -> Self {
        Self { timestamp, line, env }
    }
}

/// Identity of the traced callable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeInfo {
    /// Function name
    pub name: String,
    /// Positional argument values, in call order
    pub args: Vec<Value>,
    /// Command-line arguments the target saw
    #[serde(default)]
    pub cmd_args: Vec<String>,
    /// Where the function came from (file or module path), when known
    #[serde(default)]
    pub source: Option<String>,
}

impl CodeInfo {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            cmd_args: Vec::new(),
            source: None,
        }
    }

    pub fn with_cmd_args(mut self, cmd_args: Vec<String>) -> Self {
        self.cmd_args = cmd_args;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Aggregated execution count and time for one source line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStats {
    pub line_num: u32,
    pub times_executed: u64,
    /// Accumulated wall time, in seconds
    pub total_time: f64,
}

impl LineStats {
    pub fn new(line_num: u32) -> Self {
        Self {
            line_num,
            times_executed: 0,
            total_time: 0.0,
        }
    }

    /// Counts one execution that took `elapsed` seconds.
    pub fn record(&mut self, elapsed: f64) {
        self.times_executed += 1;
        self.total_time += elapsed;
    }

    /// Mean time per execution, or zero for a line never executed.
    pub fn average(&self) -> f64 {
        if self.times_executed == 0 {
            0.0
        } else {
            self.total_time / self.times_executed as f64
        }
    }
}

/// A single reported change to one variable within a step.
///
/// List and dict actions describe one position or key each; a variable
/// whose list changed in three places yields three actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    InitVar {
        var: String,
        val: Value,
    },
    ChangeVar {
        var: String,
        prev_val: Value,
        new_val: Value,
    },
    ListAdd {
        var: String,
        index: usize,
        val: Value,
    },
    ListChange {
        var: String,
        index: usize,
        prev_val: Value,
        new_val: Value,
    },
    ListRemove {
        var: String,
        index: usize,
    },
    DictAdd {
        var: String,
        key: Key,
        val: Value,
    },
    DictChange {
        var: String,
        key: Key,
        prev_val: Value,
        new_val: Value,
    },
    DictRemove {
        var: String,
        key: Key,
    },
}

impl Action {
    /// The variable this action applies to.
    pub fn var(&self) -> &str {
        match self {
            Action::InitVar { var, .. }
            | Action::ChangeVar { var, .. }
            | Action::ListAdd { var, .. }
            | Action::ListChange { var, .. }
            | Action::ListRemove { var, .. }
            | Action::DictAdd { var, .. }
            | Action::DictChange { var, .. }
            | Action::DictRemove { var, .. } => var,
        }
    }

    /// The export tag of this action (`init_var`, `list_add`, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            Action::InitVar { .. } => "init_var",
            Action::ChangeVar { .. } => "change_var",
            Action::ListAdd { .. } => "list_add",
            Action::ListChange { .. } => "list_change",
            Action::ListRemove { .. } => "list_remove",
            Action::DictAdd { .. } => "dict_add",
            Action::DictChange { .. } => "dict_change",
            Action::DictRemove { .. } => "dict_remove",
        }
    }
}

/// The engine's processed record for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based ordinal
    pub step: u64,
    pub timestamp: f64,
    pub line_num: u32,
    /// Stats of `line_num` as of this execution
    pub line_runtime: LineStats,
    pub actions: Vec<Action>,
}

/// One full-value entry in a variable's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: u64,
    pub line: u32,
    pub value: Value,
}

/// Exported value history of one variable, with its inferred type and range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableHistoryExport {
    pub var: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    /// `(min, max)` over the history, for numeric variables only
    pub range: Option<(Value, Value)>,
    pub val_history: Vec<HistoryEntry>,
}

impl VariableHistoryExport {
    /// The entry that introduced the variable.
    pub fn first(&self) -> Option<&HistoryEntry> {
        self.val_history.first()
    }

    /// The variable's value as of `step`, if it existed by then.
    pub fn value_at(&self, step: u64) -> Option<&Value> {
        self.val_history
            .iter()
            .take_while(|entry| entry.step <= step)
            .last()
            .map(|entry| &entry.value)
    }
}

/// The complete exported trace.
///
/// A partial result (kept after a target failure) carries `Value::None` as
/// its returned value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub code_info: CodeInfo,
    pub execution_log: Vec<Step>,
    pub returned_value: Value,
    pub variable_history: Vec<VariableHistoryExport>,
    pub line_history: Vec<LineStats>,
}

impl AnalysisResult {
    pub fn step_count(&self) -> usize {
        self.execution_log.len()
    }

    pub fn variable(&self, name: &str) -> Option<&VariableHistoryExport> {
        self.variable_history.iter().find(|var| var.var == name)
    }

    pub fn line(&self, line_num: u32) -> Option<&LineStats> {
        self.line_history.iter().find(|line| line.line_num == line_num)
    }

    /// All actions touching `var`, paired with the step they occurred in.
    pub fn actions_for<'a>(&'a self, var: &'a str) -> impl Iterator<Item = (u64, &'a Action)> + 'a {
        self.execution_log.iter().flat_map(move |step| {
            step.actions
                .iter()
                .filter(move |action| action.var() == var)
                .map(move |action| (step.step, action))
        })
    }
}
