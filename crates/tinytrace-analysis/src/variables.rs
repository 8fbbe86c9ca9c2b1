//! Per-variable histories and the environment diff engine.

use indexmap::IndexMap;
use itertools::{Itertools, MinMaxResult};
use tinytrace_core::trace::{HistoryEntry, VariableHistoryExport};
use tinytrace_core::value::ComparisonError;
use tinytrace_core::{Action, Environment, TypeTag, Value};
use tracing::warn;

use crate::diff::{dict_diff, list_diff};

/// The full chronological value record of one variable.
#[derive(Debug, Clone)]
pub struct VariableHistory {
    name: String,
    entries: Vec<HistoryEntry>,
    /// Set once a value of this variable failed deep comparison or copy.
    incomparable: bool,
}

impl VariableHistory {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
            incomparable: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_incomparable(&self) -> bool {
        self.incomparable
    }

    fn push(&mut self, step: u64, line: u32, value: Value) {
        self.entries.push(HistoryEntry { step, line, value });
    }

    fn mark_incomparable(&mut self, err: &ComparisonError) {
        if !self.incomparable {
            warn!(var = %self.name, error = %err, "falling back to identity comparison");
            self.incomparable = true;
        }
    }

    /// The exact type shared by every recorded value, or `Undefined`.
    ///
    /// Types must match exactly: a variable holding both ints and floats is
    /// `Undefined`.
    pub fn type_tag(&self) -> TypeTag {
        if self.incomparable {
            return TypeTag::Undefined;
        }
        self.entries
            .iter()
            .map(|entry| entry.value.type_tag())
            .all_equal_value()
            .unwrap_or(TypeTag::Undefined)
    }

    /// `(min, max)` over the recorded values, for int and float variables.
    pub fn range(&self) -> Option<(Value, Value)> {
        let values = self.entries.iter().map(|entry| &entry.value);
        match self.type_tag() {
            TypeTag::Int => values
                .filter_map(|value| match value {
                    Value::Int(v) => Some(*v),
                    _ => None,
                })
                .minmax()
                .into_option()
                .map(|(min, max)| (Value::Int(min), Value::Int(max))),
            TypeTag::Float => match values.filter_map(Value::as_f64).minmax_by(|a, b| a.total_cmp(b)) {
                MinMaxResult::NoElements => None,
                MinMaxResult::OneElement(v) => Some((Value::Float(v), Value::Float(v))),
                MinMaxResult::MinMax(min, max) => Some((Value::Float(min), Value::Float(max))),
            },
            _ => None,
        }
    }

    pub fn export(&self) -> VariableHistoryExport {
        VariableHistoryExport {
            var: self.name.clone(),
            type_tag: self.type_tag(),
            range: self.range(),
            val_history: self.entries.clone(),
        }
    }
}

/// The core diff engine.
///
/// Keeps the previous environment snapshot and every variable's history,
/// and turns each new snapshot into the ordered list of actions that
/// describe what changed.
#[derive(Debug, Default)]
pub struct VariableTracker {
    previous: Environment,
    histories: IndexMap<String, VariableHistory>,
}

impl VariableTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `current` against the previous snapshot, record new values, and
    /// make `current` the new previous snapshot.
    ///
    /// Actions follow `current`'s declaration order. Variables missing from
    /// `current` are not reported: deletions are invisible.
    pub fn diff(&mut self, step: u64, line: u32, current: &Environment) -> Vec<Action> {
        let mut actions = Vec::new();

        for (name, value) in current {
            let Some(prev) = self.previous.get(name) else {
                actions.push(Action::InitVar {
                    var: name.clone(),
                    val: value.clone(),
                });
                // A reappearing variable starts over but keeps its export position.
                let mut history = VariableHistory::new(name);
                let copy = snapshot(&mut history, value);
                history.push(step, line, copy);
                self.histories.insert(name.clone(), history);
                continue;
            };
            let history = self
                .histories
                .entry(name.clone())
                .or_insert_with(|| VariableHistory::new(name));

            let equal = match value.deep_eq(prev) {
                Ok(equal) => equal,
                Err(err) => {
                    history.mark_incomparable(&err);
                    value.same(prev)
                }
            };
            if equal {
                continue;
            }

            match (prev, value) {
                (Value::List(before), Value::List(after)) => list_diff(name, before, after, &mut actions),
                (Value::Dict(before), Value::Dict(after)) => dict_diff(name, before, after, &mut actions),
                _ => actions.push(Action::ChangeVar {
                    var: name.clone(),
                    prev_val: prev.clone(),
                    new_val: value.clone(),
                }),
            }
            let copy = snapshot(history, value);
            history.push(step, line, copy);
        }

        self.previous = current
            .iter()
            .map(|(name, value)| {
                let copy = match (value.deep_copy(), self.histories.get_mut(name)) {
                    (Ok(copy), _) => copy,
                    (Err(err), Some(history)) => {
                        history.mark_incomparable(&err);
                        value.clone()
                    }
                    (Err(_), None) => value.clone(),
                };
                (name.clone(), copy)
            })
            .collect();

        actions
    }

    pub fn history(&self, name: &str) -> Option<&VariableHistory> {
        self.histories.get(name)
    }

    /// Histories in first-appearance order.
    pub fn histories(&self) -> impl Iterator<Item = &VariableHistory> {
        self.histories.values()
    }

    pub fn export(&self) -> Vec<VariableHistoryExport> {
        self.histories.values().map(VariableHistory::export).collect()
    }
}

/// Deep copy of `value` for the history, falling back to a shared clone.
fn snapshot(history: &mut VariableHistory, value: &Value) -> Value {
    value.deep_copy().unwrap_or_else(|err| {
        history.mark_incomparable(&err);
        value.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use tinytrace_core::value::{Opaque, TraceObject};

    fn env(entries: &[(&str, Value)]) -> Environment {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[derive(Debug)]
    struct Socket;

    impl TraceObject for Socket {
        fn type_name(&self) -> &str {
            "Socket"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_first_appearance_inits_and_seeds_history() {
        let mut tracker = VariableTracker::new();
        let actions = tracker.diff(1, 10, &env(&[("x", Value::Int(5))]));
        assert_eq!(
            actions,
            vec![Action::InitVar {
                var: "x".into(),
                val: Value::Int(5)
            }]
        );
        let history = tracker.history("x").unwrap();
        assert_eq!(
            history.entries(),
            &[HistoryEntry {
                step: 1,
                line: 10,
                value: Value::Int(5)
            }]
        );
    }

    #[test]
    fn test_identical_environment_yields_nothing() {
        let mut tracker = VariableTracker::new();
        let snapshot = env(&[("x", Value::Int(1)), ("s", Value::Str("a".into()))]);
        tracker.diff(1, 1, &snapshot);
        assert!(tracker.diff(2, 2, &snapshot).is_empty());
        assert_eq!(tracker.history("x").unwrap().len(), 1);
        assert_eq!(tracker.history("s").unwrap().len(), 1);
    }

    #[test]
    fn test_actions_follow_declaration_order() {
        let mut tracker = VariableTracker::new();
        tracker.diff(1, 1, &env(&[("b", Value::Int(1)), ("a", Value::Int(1))]));
        let actions = tracker.diff(2, 2, &env(&[("b", Value::Int(2)), ("a", Value::Int(2)), ("c", Value::None)]));
        let vars: Vec<&str> = actions.iter().map(Action::var).collect();
        assert_eq!(vars, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_list_change_appends_single_history_entry() {
        let mut tracker = VariableTracker::new();
        let before = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let after = Value::List(vec![Value::Int(1), Value::Int(9), Value::Int(3), Value::Int(4)]);
        tracker.diff(1, 1, &env(&[("arr", before)]));
        let actions = tracker.diff(2, 2, &env(&[("arr", after.clone())]));
        assert_eq!(actions.len(), 2);
        let history = tracker.history("arr").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries()[1].value, after);
    }

    #[test]
    fn test_deletion_is_invisible() {
        let mut tracker = VariableTracker::new();
        tracker.diff(1, 1, &env(&[("x", Value::Int(1)), ("y", Value::Int(2))]));
        let actions = tracker.diff(2, 2, &env(&[("x", Value::Int(1))]));
        assert!(actions.is_empty());
        assert_eq!(tracker.export().len(), 2);
    }

    #[test]
    fn test_reappearing_variable_starts_fresh_history() {
        let mut tracker = VariableTracker::new();
        tracker.diff(1, 1, &env(&[("x", Value::Str("old".into())), ("y", Value::Int(0))]));
        tracker.diff(2, 2, &env(&[("y", Value::Int(0))]));
        let actions = tracker.diff(3, 3, &env(&[("y", Value::Int(0)), ("x", Value::Int(4))]));
        assert!(matches!(actions.as_slice(), [Action::InitVar { var, .. }] if var == "x"));

        let x = tracker.history("x").unwrap();
        assert_eq!(x.len(), 1);
        assert_eq!((x.entries()[0].step, x.entries()[0].line), (3, 3));
        assert_eq!(x.type_tag(), TypeTag::Int);
        assert_eq!(x.range(), Some((Value::Int(4), Value::Int(4))));

        let order: Vec<&str> = tracker.histories().map(VariableHistory::name).collect();
        assert_eq!(order, vec!["x", "y"]);
    }

    #[test]
    fn test_type_and_range_inference() {
        let mut tracker = VariableTracker::new();
        for (step, v) in [3, 7, -2].into_iter().enumerate() {
            tracker.diff(step as u64 + 1, 1, &env(&[("n", Value::Int(v)), ("f", Value::Float(v as f64 / 2.0))]));
        }
        let n = tracker.history("n").unwrap();
        assert_eq!(n.type_tag(), TypeTag::Int);
        assert_eq!(n.range(), Some((Value::Int(-2), Value::Int(7))));
        let f = tracker.history("f").unwrap();
        assert_eq!(f.type_tag(), TypeTag::Float);
        assert_eq!(f.range(), Some((Value::Float(-1.0), Value::Float(3.5))));

        let mut mixed = VariableTracker::new();
        mixed.diff(1, 1, &env(&[("v", Value::Int(3))]));
        mixed.diff(2, 1, &env(&[("v", Value::Str("x".into()))]));
        let v = mixed.history("v").unwrap();
        assert_eq!(v.type_tag(), TypeTag::Undefined);
        assert_eq!(v.range(), None);
    }

    #[test]
    fn test_int_float_mix_is_undefined() {
        let mut tracker = VariableTracker::new();
        tracker.diff(1, 1, &env(&[("v", Value::Int(1))]));
        tracker.diff(2, 1, &env(&[("v", Value::Float(1.5))]));
        assert_eq!(tracker.history("v").unwrap().type_tag(), TypeTag::Undefined);
        assert_eq!(tracker.history("v").unwrap().range(), None);
    }

    #[test]
    fn test_incomparable_value_falls_back_to_identity() {
        let mut tracker = VariableTracker::new();
        let socket = Value::Opaque(Opaque::new(Socket));
        tracker.diff(1, 1, &env(&[("sock", socket.clone())]));
        // Same object: identity says unchanged.
        assert!(tracker.diff(2, 1, &env(&[("sock", socket)])).is_empty());
        // A different object is a change.
        let actions = tracker.diff(3, 1, &env(&[("sock", Value::Opaque(Opaque::new(Socket)))]));
        assert!(matches!(actions.as_slice(), [Action::ChangeVar { .. }]));

        let history = tracker.history("sock").unwrap();
        assert!(history.is_incomparable());
        assert_eq!(history.type_tag(), TypeTag::Undefined);
        assert_eq!(history.len(), 2);
    }
}
