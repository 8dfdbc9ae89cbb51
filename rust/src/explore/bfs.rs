//! Breadth-first saturation of the expansion caches.

use std::collections::{HashSet, VecDeque};

use crate::engine::RuleEngine;
use crate::error::{MechError, Result};
use crate::space::{NodeId, StateSpace};

/// Expand `rounds` BFS levels from `source`, never expanding `stop_at`.
///
/// Returns the number of nodes expanded (served from cache or fresh).
fn bfs_rounds<E: RuleEngine>(
    space: &mut StateSpace<E>,
    source: NodeId,
    stop_at: NodeId,
    inverse: bool,
    rounds: usize,
) -> Result<usize> {
    let mut frontier = vec![source];
    let mut seen = HashSet::from([source]);
    let mut expanded = 0;

    for round in 1..=rounds {
        tracing::info!(round, inverse, frontier = frontier.len(), "bfs round");
        let mut next = Vec::new();
        for id in frontier.drain(..) {
            if id == stop_at {
                continue;
            }
            let node = space.node(id).cloned().ok_or(MechError::UnknownNode(id))?;
            for edge in space.expand(&node, inverse) {
                let edge = edge?;
                let other = if inverse {
                    edge.source().id()
                } else {
                    edge.target().id()
                };
                if seen.insert(other) {
                    next.push(other);
                }
            }
            expanded += 1;
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    Ok(expanded)
}

/// Pre-populate both expansion caches around the query.
///
/// Runs `⌈max_length / 2⌉` forward rounds from the initial node and
/// `⌊max_length / 2⌋` inverse rounds from the target node. Once the expansion
/// budget is spent the frontiers simply stop growing.
pub fn bidirectional_bfs<E: RuleEngine>(space: &mut StateSpace<E>, max_length: usize) -> Result<()> {
    let initial = space.initial_node().id();
    let target = space.target_node().id();
    let forward_rounds = max_length / 2 + max_length % 2;
    let backward_rounds = max_length / 2;

    bfs_rounds(space, initial, target, false, forward_rounds)?;
    bfs_rounds(space, target, initial, true, backward_rounds)?;
    tracing::info!(%space, "bidirectional bfs finished");
    Ok(())
}

/// Forward-expand everything reachable from the initial node until the graph
/// or the expansion budget is exhausted.
///
/// Returns the number of nodes visited.
pub fn compute_state_space<E: RuleEngine>(space: &mut StateSpace<E>) -> Result<usize> {
    let initial = space.initial_node().clone();
    let mut queue = VecDeque::from([initial.clone()]);
    let mut seen = HashSet::from([initial.id()]);

    while let Some(node) = queue.pop_front() {
        for edge in space.expand(&node, false) {
            let edge = edge?;
            if seen.insert(edge.target().id()) {
                queue.push_back(edge.target().clone());
            }
        }
    }
    tracing::info!(%space, visited = seen.len(), "state space computed");
    Ok(seen.len())
}
