use std::path::PathBuf;

use anyhow::{Context, Result};
use tinytrace::analysis::ReportOptions;
use tinytrace::core::codec::Format;
use tinytrace::runtime::{Session, SessionConfig};
use tracing::info;

use super::utils::args::parse_args;
use super::{print_report, save_results};

/// Options for the debug command.
#[derive(Debug, Clone)]
pub struct DebugOptions {
    pub program: String,
    pub args: Vec<String>,
    pub output: Option<PathBuf>,
    pub format: Format,
    pub cmd_args: Vec<String>,
    pub keep_partial: bool,
    pub record: Option<PathBuf>,
}

/// Debug command: trace one registered program.
pub fn debug(options: DebugOptions, report: ReportOptions) -> Result<()> {
    let args = parse_args(&options.args);
    let session = Session::new(SessionConfig {
        keep_partial: options.keep_partial,
        cmd_args: options.cmd_args.clone(),
        ..SessionConfig::default()
    });

    if let Some(path) = &options.record {
        let log = session
            .record(&options.program, args)
            .with_context(|| format!("Failed to record '{}'", options.program))?;
        log.write_json(path)
            .with_context(|| format!("Failed to write observation log to {}", path.display()))?;
        println!("Recorded {} observation(s) to {}", log.len(), path.display());
        return Ok(());
    }

    let result = match session.run(&options.program, args) {
        Ok(result) => result,
        Err(err) => {
            if let Some(partial) = err.partial_result() {
                info!(steps = partial.step_count(), "emitting partial result");
                match &options.output {
                    Some(path) => save_results(path, partial, options.format)?,
                    None => print_report(partial, report)?,
                }
            }
            return Err(err).with_context(|| format!("Failed to trace '{}'", options.program));
        }
    };

    match &options.output {
        Some(path) => save_results(path, &result, options.format),
        None => print_report(&result, report),
    }
}
