//! Reachability over a possibly cyclic graph.

use super::memory_graph::{MemoryGraph, NodeIndex};
use crate::utils::error::Cancelled;
use crate::work::CancellationToken;

/// Nodes and bytes reachable from a start node (start included)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reachability {
    pub node_count: usize,
    pub total_size: u64,
}

/// Depth-first walk with an explicit stack and visited set.
///
/// An out-of-range `start` reaches nothing.
pub fn reachable(
    graph: &MemoryGraph,
    start: NodeIndex,
    cancel: &CancellationToken,
) -> Result<Reachability, Cancelled> {
    let limit = graph.node_index_limit();
    let mut result = Reachability::default();
    if start.index() >= limit {
        return Ok(result);
    }

    let mut visited = vec![false; limit];
    let mut stack = vec![start];
    visited[start.index()] = true;

    while let Some(current) = stack.pop() {
        cancel.check()?;
        result.node_count += 1;
        result.total_size = result
            .total_size
            .saturating_add(graph.node_size(current.index()));

        for &next in graph.references_of(current.index()) {
            if !visited[next.index()] {
                visited[next.index()] = true;
                stack.push(next);
            }
        }
    }

    Ok(result)
}

/// Reachability from the graph root, or `None` when the graph has no root
pub fn reachable_from_root(
    graph: &MemoryGraph,
    cancel: &CancellationToken,
) -> Result<Option<Reachability>, Cancelled> {
    graph
        .root()
        .map(|root| reachable(graph, root, cancel))
        .transpose()
}
