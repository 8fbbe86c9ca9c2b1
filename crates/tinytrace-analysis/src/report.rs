//! Human-readable console rendering of an [`AnalysisResult`].

use std::fmt::Write as _;
use std::io;

use chrono::DateTime;
use itertools::Itertools;
use tinytrace_core::{Action, AnalysisResult, Step, VariableHistoryExport};

const GREEN: &str = "\x1b[92m";
const MAGENTA: &str = "\x1b[95m";
const BLUE: &str = "\x1b[94m";
const RESET: &str = "\x1b[0m";

/// Rendering options for [`ConsoleReport`].
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// Wrap headings and step lines in ANSI colour codes
    pub color: bool,
    /// Decimal places for times, in seconds
    pub precision: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            color: true,
            precision: 5,
        }
    }
}

/// Generates the console report for a finished trace.
pub struct ConsoleReport<'a> {
    result: &'a AnalysisResult,
    options: ReportOptions,
}

impl<'a> ConsoleReport<'a> {
    pub fn new(result: &'a AnalysisResult) -> Self {
        Self::with_options(result, ReportOptions::default())
    }

    pub fn with_options(result: &'a AnalysisResult, options: ReportOptions) -> Self {
        Self { result, options }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.header(&mut out);
        let _ = writeln!(out, "{}", self.paint(MAGENTA, "Execution log:"));
        for step in &self.result.execution_log {
            self.step(step, &mut out);
        }
        let _ = writeln!(out, "{}", self.paint(GREEN, &format!("Returned value: {}", self.result.returned_value)));
        let _ = writeln!(out);

        let _ = writeln!(out, "{}", self.paint(MAGENTA, "Variable change analysis:"));
        for variable in &self.result.variable_history {
            self.variable(variable, &mut out);
        }

        let _ = writeln!(out, "{}", self.paint(MAGENTA, "Line runtime analysis:"));
        for line in &self.result.line_history {
            let _ = writeln!(
                out,
                "Line {}: executed {} times, total runtime {:.p$}s, average runtime {:.p$}s",
                line.line_num,
                line.times_executed,
                line.total_time,
                line.average(),
                p = self.options.precision,
            );
        }
        out
    }

    pub fn write_to<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.render().as_bytes())?;
        writer.flush()
    }

    fn header(&self, out: &mut String) {
        let info = &self.result.code_info;
        let args = info.args.iter().map(|arg| arg.repr()).join(", ");
        let location = match &info.source {
            Some(source) => format!("file {}, running function", source),
            None => "function".to_string(),
        };
        let title = format!("Displaying results for {} {}({}).", location, info.name, args);
        let _ = writeln!(out, "{}", self.paint(MAGENTA, &title));
        let _ = writeln!(out, "Command line arguments: {}", info.cmd_args.join(" "));
        let _ = writeln!(out);
    }

    fn step(&self, step: &Step, out: &mut String) {
        let stats = &step.line_runtime;
        let line = format!(
            "{} - Step {}, line {} - executed {} times so far, total time so far {:.p$}s, average time so far {:.p$}s",
            format_timestamp(step.timestamp),
            step.step,
            step.line_num,
            stats.times_executed,
            stats.total_time,
            stats.average(),
            p = self.options.precision,
        );
        let _ = writeln!(out, "{}", self.paint(BLUE, &line));
        if !step.actions.is_empty() {
            let _ = writeln!(out, "{}.", step.actions.iter().map(describe).join(", "));
        }
    }

    fn variable(&self, variable: &VariableHistoryExport, out: &mut String) {
        let (step, line) = variable.first().map(|entry| (entry.step, entry.line)).unwrap_or_default();
        let _ = writeln!(
            out,
            "Variable '{}' (type {}), initiated in step {}, line {}.",
            variable.var, variable.type_tag, step, line
        );
        if let Some((min, max)) = &variable.range {
            let _ = write!(out, "Value range: {} - {}. ", min, max);
        }
        let history = variable
            .val_history
            .iter()
            .map(|entry| format!("step {} line {}: {}", entry.step, entry.line, entry.value))
            .join(", ");
        let _ = writeln!(out, "Value history: {}", history);
        let _ = writeln!(out);
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.options.color {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }
}

/// One action in prose, as it appears after a step line.
pub fn describe(action: &Action) -> String {
    match action {
        Action::InitVar { var, val } => format!("variable '{}' created and initiated with {}", var, val),
        Action::ChangeVar { var, prev_val, new_val } => {
            format!("variable '{}' changed from {} to {}", var, prev_val, new_val)
        }
        Action::ListAdd { var, index, val } => format!("{}[{}] appended with value {}", var, index, val),
        Action::ListChange {
            var,
            index,
            prev_val,
            new_val,
        } => format!("{}[{}] changed from {} to {}", var, index, prev_val, new_val),
        Action::ListRemove { var, index } => format!("{}[{}] removed", var, index),
        Action::DictAdd { var, key, val } => format!("key {} added to {} with value {}", key, var, val),
        Action::DictChange {
            var,
            key,
            prev_val,
            new_val,
        } => format!("value of key {} in {} changed from {} to {}", key, var, prev_val, new_val),
        Action::DictRemove { var, key } => format!("key {} removed from {}", key, var),
    }
}

fn format_timestamp(timestamp: f64) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    match DateTime::from_timestamp(secs as i64, nanos) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{:.3}", timestamp),
    }
}
