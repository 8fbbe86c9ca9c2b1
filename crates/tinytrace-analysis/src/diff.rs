//! Positional list diff and keyed dict diff.
//!
//! The list diff compares index by index; it does not search for a minimal
//! edit script. Inserting one element at the front of a list therefore shows
//! up as a change at every following index plus one trailing add.

use tinytrace_core::value::Dict;
use tinytrace_core::{Action, Value};

/// Appends the actions turning `prev` into `curr` for list variable `var`.
///
/// Changes at shared indices come first, then trailing additions or trailing
/// removals.
pub fn list_diff(var: &str, prev: &[Value], curr: &[Value], actions: &mut Vec<Action>) {
    let common = prev.len().min(curr.len());

    for (index, (before, after)) in prev.iter().zip(curr).enumerate() {
        if after != before {
            actions.push(Action::ListChange {
                var: var.to_string(),
                index,
                prev_val: before.clone(),
                new_val: after.clone(),
            });
        }
    }

    for (index, val) in curr.iter().enumerate().skip(common) {
        actions.push(Action::ListAdd {
            var: var.to_string(),
            index,
            val: val.clone(),
        });
    }

    for index in common..prev.len() {
        actions.push(Action::ListRemove {
            var: var.to_string(),
            index,
        });
    }
}

/// Appends the actions turning `prev` into `curr` for dict variable `var`.
///
/// Additions and changes follow `curr`'s order; removals follow, in
/// `prev`'s order.
pub fn dict_diff(var: &str, prev: &Dict, curr: &Dict, actions: &mut Vec<Action>) {
    for (key, val) in curr {
        match prev.get(key) {
            None => actions.push(Action::DictAdd {
                var: var.to_string(),
                key: key.clone(),
                val: val.clone(),
            }),
            Some(before) if before != val => actions.push(Action::DictChange {
                var: var.to_string(),
                key: key.clone(),
                prev_val: before.clone(),
                new_val: val.clone(),
            }),
            Some(_) => {}
        }
    }

    for key in prev.keys().filter(|key| !curr.contains_key(key)) {
        actions.push(Action::DictRemove {
            var: var.to_string(),
            key: key.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tinytrace_core::Key;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    fn dict(entries: &[(&str, i64)]) -> Dict {
        entries
            .iter()
            .map(|(k, v)| (Key::Str(k.to_string()), Value::Int(*v)))
            .collect()
    }

    #[test]
    fn test_list_change_then_add() {
        let mut actions = Vec::new();
        list_diff("arr", &ints(&[1, 2, 3]), &ints(&[1, 9, 3, 4]), &mut actions);
        assert_eq!(
            actions,
            vec![
                Action::ListChange {
                    var: "arr".into(),
                    index: 1,
                    prev_val: Value::Int(2),
                    new_val: Value::Int(9),
                },
                Action::ListAdd {
                    var: "arr".into(),
                    index: 3,
                    val: Value::Int(4),
                },
            ]
        );
    }

    #[test]
    fn test_list_shrink_reports_trailing_removals() {
        let mut actions = Vec::new();
        list_diff("arr", &ints(&[1, 2, 3]), &ints(&[1]), &mut actions);
        assert_eq!(
            actions,
            vec![
                Action::ListRemove { var: "arr".into(), index: 1 },
                Action::ListRemove { var: "arr".into(), index: 2 },
            ]
        );
    }

    #[test]
    fn test_leading_insert_is_positional() {
        let mut actions = Vec::new();
        list_diff("q", &ints(&[1, 2]), &ints(&[0, 1, 2]), &mut actions);
        let tags: Vec<&str> = actions.iter().map(Action::tag).collect();
        assert_eq!(tags, vec!["list_change", "list_change", "list_add"]);
    }

    #[test]
    fn test_dict_change_add_then_remove() {
        let mut actions = Vec::new();
        dict_diff("d", &dict(&[("a", 1), ("b", 2)]), &dict(&[("b", 3), ("c", 4)]), &mut actions);
        assert_eq!(
            actions,
            vec![
                Action::DictChange {
                    var: "d".into(),
                    key: Key::Str("b".into()),
                    prev_val: Value::Int(2),
                    new_val: Value::Int(3),
                },
                Action::DictAdd {
                    var: "d".into(),
                    key: Key::Str("c".into()),
                    val: Value::Int(4),
                },
                Action::DictRemove {
                    var: "d".into(),
                    key: Key::Str("a".into()),
                },
            ]
        );
    }

    #[test]
    fn test_dict_removals_follow_previous_order() {
        let mut actions = Vec::new();
        dict_diff("d", &dict(&[("z", 1), ("a", 2), ("m", 3)]), &dict(&[]), &mut actions);
        let keys: Vec<String> = actions
            .iter()
            .map(|action| match action {
                Action::DictRemove { key, .. } => key.to_string(),
                other => panic!("unexpected action {:?}", other),
            })
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    proptest! {
        #[test]
        fn list_diff_applied_positionally_rebuilds_current(
            prev in proptest::collection::vec(0i64..5, 0..8),
            curr in proptest::collection::vec(0i64..5, 0..8),
        ) {
            let mut actions = Vec::new();
            list_diff("v", &ints(&prev), &ints(&curr), &mut actions);

            let mut rebuilt = ints(&prev);
            for action in &actions {
                match action {
                    Action::ListChange { index, new_val, .. } => rebuilt[*index] = new_val.clone(),
                    Action::ListAdd { val, .. } => rebuilt.push(val.clone()),
                    Action::ListRemove { .. } => {}
                    other => panic!("unexpected action {:?}", other),
                }
            }
            rebuilt.truncate(curr.len());
            prop_assert_eq!(rebuilt, ints(&curr));
            prop_assert_eq!(actions.is_empty(), prev == curr);
        }
    }
}
