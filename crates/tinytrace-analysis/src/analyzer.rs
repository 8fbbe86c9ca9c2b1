use tinytrace_core::{AnalysisResult, CodeInfo, Observation, ObservationSource, Result, Step, StepVisitor, Value};
use tracing::{debug, info};

use crate::recorder::{StepRecorder, Timing};

/// Settings for one analysis run.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerConfig {
    pub timing: Timing,
}

impl AnalyzerConfig {
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }
}

/// Assembles an [`AnalysisResult`] from a stream of observations.
///
/// Observations arrive either pushed through [`StepVisitor`] by a live
/// instrumentation layer or pulled from an [`ObservationSource`] by
/// [`Analyzer::drain`]. [`Analyzer::finish`] consumes the analyzer, so a
/// result can never change after it is assembled.
#[derive(Debug)]
pub struct Analyzer {
    code_info: CodeInfo,
    recorder: StepRecorder,
    execution_log: Vec<Step>,
}

impl Analyzer {
    pub fn new(code_info: CodeInfo) -> Self {
        Self::with_config(code_info, AnalyzerConfig::default())
    }

    pub fn with_config(code_info: CodeInfo, config: AnalyzerConfig) -> Self {
        Self::from_recorder(code_info, StepRecorder::new(config.timing))
    }

    fn from_recorder(code_info: CodeInfo, recorder: StepRecorder) -> Self {
        Self {
            code_info,
            recorder,
            execution_log: Vec::new(),
        }
    }

    /// Pull every observation from `source` and assemble the result.
    ///
    /// A failing source aborts the run; no partial result is produced.
    pub fn drain<S: ObservationSource + ?Sized>(source: &mut S, config: AnalyzerConfig) -> Result<AnalysisResult> {
        let recorder = StepRecorder::with_start(config.timing, source.start_timestamp());
        let mut analyzer = Self::from_recorder(source.code_info(), recorder);
        info!(program = %analyzer.code_info.name, "analyzing observation stream");

        analyzer.recorder.restart_clock();
        while let Some(observation) = source.next_observation()? {
            analyzer.observe(observation);
        }
        let returned_value = source.return_value()?;
        Ok(analyzer.finish(returned_value))
    }

    /// Restart wall-clock timing; call right before the target starts.
    pub fn start_clock(&mut self) {
        self.recorder.restart_clock();
    }

    /// Record one observation and return the resulting step.
    pub fn observe(&mut self, observation: Observation) -> &Step {
        let step = self.recorder.advance(observation);
        self.execution_log.push(step);
        &self.execution_log[self.execution_log.len() - 1]
    }

    pub fn code_info(&self) -> &CodeInfo {
        &self.code_info
    }

    /// Steps recorded so far.
    pub fn steps(&self) -> &[Step] {
        &self.execution_log
    }

    pub fn recorder(&self) -> &StepRecorder {
        &self.recorder
    }

    /// Export everything recorded so far together with the target's return
    /// value.
    pub fn finish(self, returned_value: Value) -> AnalysisResult {
        let variable_history = self.recorder.variables().export();
        let line_history = self.recorder.lines().export();
        debug!(
            steps = self.execution_log.len(),
            variables = variable_history.len(),
            lines = line_history.len(),
            "assembled analysis result"
        );

        AnalysisResult {
            code_info: self.code_info,
            execution_log: self.execution_log,
            returned_value,
            variable_history,
            line_history,
        }
    }
}

impl StepVisitor for Analyzer {
    fn visit(&mut self, observation: Observation) {
        self.observe(observation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tinytrace_core::{Action, Environment, Error, TypeTag};

    /// In-memory source replaying a fixed list of observations.
    struct FixedSource {
        observations: std::vec::IntoIter<Observation>,
        returned: Value,
        fail_at_end: bool,
    }

    impl FixedSource {
        fn new(observations: Vec<Observation>, returned: Value) -> Self {
            Self {
                observations: observations.into_iter(),
                returned,
                fail_at_end: false,
            }
        }
    }

    impl ObservationSource for FixedSource {
        fn code_info(&self) -> CodeInfo {
            CodeInfo::new("fixed", vec![])
        }

        fn next_observation(&mut self) -> Result<Option<Observation>> {
            match self.observations.next() {
                None if self.fail_at_end => Err(Error::Other("target crashed".into())),
                next => Ok(next),
            }
        }

        fn return_value(&mut self) -> Result<Value> {
            Ok(self.returned.clone())
        }
    }

    fn obs(line: u32, vars: &[(&str, Value)]) -> Observation {
        let env: Environment = vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Observation::with_timestamp(0.0, line, env)
    }

    #[test]
    fn test_counter_loop_end_to_end() {
        // counter = 0; for _ in range(3): counter += 1
        let mut observations = vec![obs(1, &[("counter", Value::Int(0))])];
        for i in 1..=3 {
            observations.push(obs(2, &[("counter", Value::Int(i - 1))]));
            observations.push(obs(3, &[("counter", Value::Int(i))]));
        }
        let mut source = FixedSource::new(observations, Value::Int(3));
        let result = Analyzer::drain(&mut source, AnalyzerConfig::default().with_timing(Timing::Timestamps)).unwrap();

        assert_eq!(result.step_count(), 7);
        assert_eq!(result.returned_value, Value::Int(3));
        let changes = result
            .actions_for("counter")
            .filter(|(_, action)| matches!(action, Action::ChangeVar { .. }))
            .count();
        assert_eq!(changes, 3);

        let counter = result.variable("counter").unwrap();
        assert_eq!(counter.val_history.len(), 4);
        assert_eq!(counter.type_tag, TypeTag::Int);
        assert_eq!(counter.range, Some((Value::Int(0), Value::Int(3))));

        let lines: Vec<(u32, u64)> = result.line_history.iter().map(|l| (l.line_num, l.times_executed)).collect();
        assert_eq!(lines, vec![(1, 1), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_first_observation_inits_once() {
        let mut analyzer = Analyzer::new(CodeInfo::new("f", vec![Value::Int(1)]));
        analyzer.visit(obs(4, &[("a", Value::Int(1))]));
        analyzer.visit(obs(5, &[("a", Value::Int(1)), ("b", Value::Str("x".into()))]));
        let result = analyzer.finish(Value::None);

        let inits: Vec<(u64, &str)> = result
            .execution_log
            .iter()
            .flat_map(|step| step.actions.iter().map(move |a| (step.step, a)))
            .filter(|(_, a)| matches!(a, Action::InitVar { .. }))
            .map(|(step, a)| (step, a.var()))
            .collect();
        assert_eq!(inits, vec![(1, "a"), (2, "b")]);

        let b = result.variable("b").unwrap();
        assert_eq!(b.val_history[0].step, 2);
        assert_eq!(b.val_history[0].line, 5);
        assert_eq!(b.val_history[0].value, Value::Str("x".into()));
    }

    #[test]
    fn test_failing_source_propagates() {
        let mut source = FixedSource::new(vec![obs(1, &[])], Value::None);
        source.fail_at_end = true;
        assert!(Analyzer::drain(&mut source, AnalyzerConfig::default()).is_err());
    }

    proptest! {
        #[test]
        fn step_ids_match_observation_count(values in proptest::collection::vec(-3i64..3, 0..40)) {
            let mut analyzer = Analyzer::new(CodeInfo::new("p", vec![]));
            for (i, v) in values.iter().enumerate() {
                analyzer.visit(obs(i as u32 % 4, &[("v", Value::Int(*v))]));
            }
            let result = analyzer.finish(Value::None);

            let ids: Vec<u64> = result.execution_log.iter().map(|s| s.step).collect();
            let expected: Vec<u64> = (1..=values.len() as u64).collect();
            prop_assert_eq!(ids, expected);

            // One history entry for the init plus one per change.
            if let Some(first) = values.first() {
                let changes = values.windows(2).filter(|w| w[0] != w[1]).count();
                let history = &result.variable("v").unwrap().val_history;
                prop_assert_eq!(history.len(), changes + 1);
                prop_assert_eq!(&history[0].value, &Value::Int(*first));
            }
        }
    }
}
