//! Graph traversals over an adjacency list keyed by vertex.

use std::collections::VecDeque;

use indexmap::IndexMap;
use tinytrace::prelude::*;

pub type Graph = IndexMap<i64, Vec<i64>>;

#[program(description = "Depth-first traversal with an explicit stack")]
pub fn dfs(frame: &mut Frame<'_>, graph: Graph, start: i64) -> Vec<i64> {
    let mut visited: Vec<i64> = Vec::new();
    let mut stack = VecDeque::from([start]);
    observe!(frame; graph, start, visited, stack);
    while let Some(vertex) = stack.pop_back() {
        observe!(frame; stack, vertex);
        if !visited.contains(&vertex) {
            visited.push(vertex);
            observe!(frame; visited);
            stack.extend(unvisited(&graph, vertex, &visited));
            observe!(frame; stack);
        }
    }
    visited
}

#[program(description = "Breadth-first traversal with a queue")]
pub fn bfs(frame: &mut Frame<'_>, graph: Graph, start: i64) -> Vec<i64> {
    let mut visited: Vec<i64> = Vec::new();
    let mut queue = VecDeque::from([start]);
    observe!(frame; graph, start, visited, queue);
    while let Some(vertex) = queue.pop_front() {
        observe!(frame; queue, vertex);
        if !visited.contains(&vertex) {
            visited.push(vertex);
            observe!(frame; visited);
            queue.extend(unvisited(&graph, vertex, &visited));
            observe!(frame; queue);
        }
    }
    visited
}

/// Neighbours of `vertex` not yet visited, in adjacency order.
fn unvisited(graph: &Graph, vertex: i64, visited: &[i64]) -> Vec<i64> {
    graph
        .get(&vertex)
        .into_iter()
        .flatten()
        .copied()
        .filter(|next| !visited.contains(next))
        .collect()
}
