//! The tinytrace analysis engine.
//!
//! This crate provides:
//! - The per-step recorder that turns observations into steps
//! - Variable histories with list and dict diffing
//! - Per-line execution statistics
//! - Result assembly and the console report

pub mod analyzer;
pub mod diff;
pub mod line_stats;
pub mod recorder;
pub mod report;
pub mod variables;

pub use analyzer::{Analyzer, AnalyzerConfig};
pub use line_stats::LineStatsTracker;
pub use recorder::{StepRecorder, Timing};
pub use report::{describe, ConsoleReport, ReportOptions};
pub use variables::{VariableHistory, VariableTracker};
