use thiserror::Error;

use crate::trace::AnalysisResult;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Unknown program: {0}")]
    UnknownProgram(String),

    #[error("Program '{program}' takes {expected} argument(s), but {actual} were given")]
    ArityMismatch {
        program: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid argument {index} for program '{program}': {message}")]
    InvalidArgument {
        program: String,
        index: usize,
        message: String,
    },

    #[error("Cannot convert {found} to {expected}")]
    Conversion { expected: String, found: String },

    /// The traced program failed mid-run. `partial` holds the steps recorded
    /// before the failure when the session was configured to keep them.
    #[error("Traced program '{program}' failed: {message}")]
    TargetRuntime {
        program: String,
        message: String,
        partial: Option<Box<AnalysisResult>>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures raised before the target started running.
    pub fn is_instrumentation(&self) -> bool {
        matches!(
            self,
            Error::UnknownProgram(_) | Error::ArityMismatch { .. } | Error::InvalidArgument { .. }
        )
    }

    /// The partial result attached to a target failure, if any.
    pub fn partial_result(&self) -> Option<&AnalysisResult> {
        match self {
            Error::TargetRuntime { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
