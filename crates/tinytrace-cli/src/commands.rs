//! Command implementations for the tinytrace CLI.

mod debug;
mod program;
mod suite;
pub mod utils;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tinytrace::analysis::{Analyzer, AnalyzerConfig, ConsoleReport, ReportOptions, Timing};
use tinytrace::core::codec::{read_results, write_results, Format};
use tinytrace::core::AnalysisResult;
use tinytrace::runtime::ObservationLog;

pub use debug::{debug, DebugOptions};
pub use program::list_programs;
pub use suite::test;

/// Print the console report for `result` to stdout.
fn print_report(result: &AnalysisResult, options: ReportOptions) -> Result<()> {
    ConsoleReport::with_options(result, options)
        .write_to(io::stdout().lock())
        .context("Failed to write report")
}

fn save_results(path: &Path, result: &AnalysisResult, format: Format) -> Result<()> {
    write_results(path, result, format).with_context(|| format!("Failed to write results to {}", path.display()))?;
    println!("Saved {} step(s) to {}", result.step_count(), path.display());
    Ok(())
}

/// Parse command: print a saved result file.
pub fn parse(file: &Path, report: ReportOptions) -> Result<()> {
    let result = read_results(file).with_context(|| format!("Failed to read results from {}", file.display()))?;
    print_report(&result, report)
}

/// Replay command: analyze a raw observation log.
pub fn replay(file: &Path, output: Option<&Path>, format: Format, report: ReportOptions) -> Result<()> {
    let mut log = ObservationLog::read_json(file)
        .with_context(|| format!("Failed to read observation log from {}", file.display()))?;
    let config = AnalyzerConfig::default().with_timing(Timing::Timestamps);
    let result = Analyzer::drain(&mut log, config).context("Failed to analyze observation log")?;

    match output {
        Some(path) => save_results(path, &result, format),
        None => print_report(&result, report),
    }
}
