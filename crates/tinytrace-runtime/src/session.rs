//! Running a program under instrumentation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tinytrace_analysis::{Analyzer, AnalyzerConfig, Timing};
use tinytrace_core::{AnalysisResult, CodeInfo, Error, Result, StepVisitor, Value};
use tracing::{info, warn};

use crate::frame::Frame;
use crate::recording::ObservationLog;
use crate::registry::{lookup_program, ProgramRegistration};

/// Settings for one traced run.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub analyzer: AnalyzerConfig,
    /// Attach the steps recorded before a target failure to the error.
    pub keep_partial: bool,
    /// Command-line arguments recorded in the result's code info.
    pub cmd_args: Vec<String>,
    /// Overrides the program's source location in the code info.
    pub source: Option<String>,
}

/// Runs traced programs. One analysis engine per run; nothing is shared
/// between runs.
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run a registered program by name.
    pub fn run(&self, name: &str, args: Vec<Value>) -> Result<AnalysisResult> {
        self.run_program(lookup_program(name)?, args)
    }

    /// Run a registered program. Arity is checked before any step is
    /// recorded.
    pub fn run_program(&self, program: &ProgramRegistration, args: Vec<Value>) -> Result<AnalysisResult> {
        program.check_arity(args.len())?;
        let code_info = self.code_info(program.name(), args, Some(program.metadata.source));
        self.analyze(code_info, |frame, args| program.execute(frame, args))
    }

    /// Run an unregistered target under the given name.
    pub fn run_with<F>(&self, name: &str, args: Vec<Value>, target: F) -> Result<AnalysisResult>
    where
        F: FnOnce(&mut Frame<'_>, &[Value]) -> Result<Value>,
    {
        let code_info = self.code_info(name, args, None);
        self.analyze(code_info, target)
    }

    /// Run a registered program and keep the raw observations instead of
    /// analyzing them.
    pub fn record(&self, name: &str, args: Vec<Value>) -> Result<ObservationLog> {
        let program = lookup_program(name)?;
        program.check_arity(args.len())?;
        let code_info = self.code_info(program.name(), args, Some(program.metadata.source));

        let mut log = ObservationLog::new(code_info.clone());
        match execute(&code_info, &mut log, |frame, args| program.execute(frame, args)) {
            Ok(returned) => {
                info!(program = %code_info.name, observations = log.len(), "recorded run");
                log.set_returned_value(returned);
                Ok(log)
            }
            Err(err) if err.is_instrumentation() => Err(err),
            Err(err) => {
                let partial = self.config.keep_partial.then(|| {
                    let config = self.config.analyzer.with_timing(Timing::Timestamps);
                    let mut analyzer = Analyzer::with_config(code_info.clone(), config);
                    for observation in log.observations() {
                        analyzer.observe(observation.clone());
                    }
                    analyzer.finish(Value::None)
                });
                Err(target_failure(&code_info.name, err, partial))
            }
        }
    }

    fn analyze<F>(&self, code_info: CodeInfo, target: F) -> Result<AnalysisResult>
    where
        F: FnOnce(&mut Frame<'_>, &[Value]) -> Result<Value>,
    {
        info!(program = %code_info.name, args = code_info.args.len(), "starting traced run");
        let mut analyzer = Analyzer::with_config(code_info.clone(), self.config.analyzer);
        analyzer.start_clock();

        match execute(&code_info, &mut analyzer, target) {
            Ok(returned) => {
                let result = analyzer.finish(returned);
                info!(
                    program = %code_info.name,
                    steps = result.step_count(),
                    variables = result.variable_history.len(),
                    "finished traced run"
                );
                Ok(result)
            }
            Err(err) if err.is_instrumentation() => Err(err),
            Err(err) => {
                let partial = self.config.keep_partial.then(|| analyzer.finish(Value::None));
                Err(target_failure(&code_info.name, err, partial))
            }
        }
    }

    fn code_info(&self, name: &str, args: Vec<Value>, source: Option<&str>) -> CodeInfo {
        let mut code_info = CodeInfo::new(name, args).with_cmd_args(self.config.cmd_args.clone());
        if let Some(source) = self.config.source.as_deref().or(source) {
            code_info = code_info.with_source(source);
        }
        code_info
    }
}

/// Call `target` with a frame reporting into `visitor`, turning a panic in
/// the target into an error.
fn execute<F>(code_info: &CodeInfo, visitor: &mut dyn StepVisitor, target: F) -> Result<Value>
where
    F: FnOnce(&mut Frame<'_>, &[Value]) -> Result<Value>,
{
    let mut frame = Frame::new(visitor);
    let args = code_info.args.as_slice();
    panic::catch_unwind(AssertUnwindSafe(|| target(&mut frame, args))).unwrap_or_else(|payload| {
        Err(Error::TargetRuntime {
            program: code_info.name.clone(),
            message: panic_message(payload.as_ref()),
            partial: None,
        })
    })
}

fn target_failure(program: &str, err: Error, partial: Option<AnalysisResult>) -> Error {
    let message = match err {
        Error::TargetRuntime { message, .. } => message,
        other => other.to_string(),
    };
    warn!(program, error = %message, partial = partial.is_some(), "traced program failed");
    Error::TargetRuntime {
        program: program.to_string(),
        message,
        partial: partial.map(Box::new),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}
