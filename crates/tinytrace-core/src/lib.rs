//! Core types and schemas for tinytrace.
//!
//! This crate defines the data structures shared across the workspace: the
//! runtime [`Value`](value::Value) model, observations and the exported
//! [`AnalysisResult`](trace::AnalysisResult), the producer/consumer traits
//! between instrumentation and analysis, the error type and the result
//! codec. It contains no analysis logic.

pub mod codec;
pub mod error;
pub mod source;
pub mod trace;
pub mod value;

pub use error::{Error, Result};
pub use source::{ObservationSource, StepVisitor};
pub use trace::{
    Action, AnalysisResult, CodeInfo, Environment, HistoryEntry, LineStats, Observation, Step, VariableHistoryExport,
};
pub use value::{FromValue, Key, ToKey, ToValue, TypeTag, Value};

// Re-exported for the environment type and for macro-generated code.
pub use indexmap;
