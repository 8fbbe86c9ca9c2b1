//! CLI tool for tinytrace.
//!
//! Provides commands for tracing registered programs, reporting saved
//! results, and running the built-in suite.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tinytrace::analysis::ReportOptions;
use tinytrace::core::codec::Format;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tinytrace")]
#[command(about = "Line-level tracer and variable-change analyzer", long_about = None)]
#[command(version)]
struct Cli {
    /// Disable ANSI colours in reports
    #[arg(long, global = true, env = "TINYTRACE_NO_COLOR")]
    no_color: bool,

    /// Decimal places for times in reports
    #[arg(long, global = true, default_value_t = 5)]
    precision: usize,

    /// Raise the log level (-v info, -vv debug); TINYTRACE_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace a registered program and report or save the results
    Debug {
        /// Name of the registered program
        program: String,

        /// Program arguments: int, float, JSON literal, or plain string
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,

        /// Save results to this file instead of printing them
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Encoding of the saved results
        #[arg(long, value_enum, default_value = "binary")]
        format: FormatArg,

        /// Command-line argument recorded with the results (repeatable)
        #[arg(long = "cmd-arg")]
        cmd_args: Vec<String>,

        /// On failure, keep the steps recorded before the error
        #[arg(long)]
        keep_partial: bool,

        /// Save the raw observation log to this file instead of analyzing
        #[arg(long, conflicts_with = "output")]
        record: Option<PathBuf>,
    },

    /// Print a saved result file in human-readable form
    Parse {
        /// Result file written by `debug --output` or `test`
        file: PathBuf,
    },

    /// Analyze a raw observation log written by `debug --record`
    Replay {
        /// Observation log file
        file: PathBuf,

        /// Save results to this file instead of printing them
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Encoding of the saved results
        #[arg(long, value_enum, default_value = "binary")]
        format: FormatArg,
    },

    /// Run the built-in suite of traced programs
    Test {
        /// Write one result file per program here instead of printing
        output_dir: Option<PathBuf>,
    },

    /// List registered programs
    List,
}

/// Result file encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Pretty-printed JSON
    Json,
    /// Compact binary (default)
    Binary,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => Format::Json,
            FormatArg::Binary => Format::Binary,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("TINYTRACE_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let report = ReportOptions {
        color: !cli.no_color,
        precision: cli.precision,
    };

    match cli.command {
        Commands::Debug {
            program,
            args,
            output,
            format,
            cmd_args,
            keep_partial,
            record,
        } => commands::debug(
            commands::DebugOptions {
                program,
                args,
                output,
                format: format.into(),
                cmd_args,
                keep_partial,
                record,
            },
            report,
        ),
        Commands::Parse { file } => commands::parse(&file, report),
        Commands::Replay { file, output, format } => commands::replay(&file, output.as_deref(), format.into(), report),
        Commands::Test { output_dir } => commands::test(output_dir.as_deref(), report),
        Commands::List => commands::list_programs(),
    }
}
