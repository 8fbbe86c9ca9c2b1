//! Built-in traced programs.
//!
//! Each program is registered with `#[program]` and can be run by name
//! through a [`Session`](tinytrace::runtime::Session). [`suite`] lists the
//! inputs the `tinytrace test` command runs them with.

pub mod binary_search;
pub mod graph;
pub mod knapsack;

use tinytrace::core::{ToValue, Value};

/// One program invocation of the built-in suite.
#[derive(Debug, Clone)]
pub struct SuiteCase {
    pub program: &'static str,
    pub args: Vec<Value>,
}

impl SuiteCase {
    fn new(program: &'static str, args: Vec<Value>) -> Self {
        Self { program, args }
    }
}

/// The built-in suite, in run order.
pub fn suite() -> Vec<SuiteCase> {
    let graph: graph::Graph = [(1, vec![2, 3]), (2, vec![4]), (3, vec![4]), (4, vec![])].into_iter().collect();

    vec![
        SuiteCase::new(
            "binary_search",
            vec![ints(&[2, 3, 4, 10, 40]), Value::Int(0), Value::Int(4), Value::Int(10)],
        ),
        SuiteCase::new(
            "knapsack",
            vec![Value::Int(50), ints(&[10, 20, 30]), ints(&[60, 100, 120]), Value::Int(3)],
        ),
        SuiteCase::new("dfs", vec![graph.to_value(), Value::Int(1)]),
        SuiteCase::new("bfs", vec![graph.to_value(), Value::Int(1)]),
    ]
}

fn ints(values: &[i64]) -> Value {
    values.to_value()
}
