//! tinytrace: line-level execution tracing and variable-change analysis.
//!
//! This is the main entry point for traced programs. It re-exports the core
//! functionality from the other tinytrace crates.

pub use tinytrace_analysis as analysis;
pub use tinytrace_core as core;
pub use tinytrace_macros::{program, ToValue};
pub use tinytrace_runtime as runtime;
pub use tinytrace_runtime::observe;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::analysis::{Analyzer, AnalyzerConfig, ConsoleReport, ReportOptions, Timing};
    pub use crate::core::{
        codec::{read_results, write_results, Format},
        AnalysisResult, CodeInfo, Error, FromValue, Result, ToValue, Value,
    };
    pub use crate::runtime::{
        find_program, iter_programs, program_count, Frame, ObservationLog, ProgramRegistration, Session, SessionConfig,
    };
    pub use crate::{observe, program, ToValue};
}
