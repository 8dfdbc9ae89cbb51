//! Relevance pruning.
//!
//! Keeps only the nodes that are both reachable from the initial node and
//! able to reach the target node, i.e. the nodes that lie on some
//! initial-to-target walk of the explored graph. Pruning never expands.

use std::collections::{BTreeSet, HashSet};

use crate::engine::RuleEngine;
use crate::space::{NodeId, StateSpace};

/// Result of [`prune`].
pub struct Pruned<E: RuleEngine> {
    /// Induced sub-space on the relevant nodes.
    pub space: StateSpace<E>,
    /// `false` if the target has no incident edge left, so no mechanism
    /// exists in the explored graph.
    pub connected: bool,
}

/// Nodes reachable from `start` following successors (or predecessors when
/// `backward`), `start` included.
fn reachable<E: RuleEngine>(space: &StateSpace<E>, start: NodeId, backward: bool) -> HashSet<NodeId> {
    let mut marked = HashSet::from([start]);
    let mut stack = vec![start];
    while let Some(v) = stack.pop() {
        let neighbours: Vec<NodeId> = if backward {
            space.predecessors(v).collect()
        } else {
            space.successors(v).collect()
        };
        for w in neighbours {
            if marked.insert(w) {
                stack.push(w);
            }
        }
    }
    marked
}

/// Ids of the nodes on some initial-to-target walk.
pub fn relevant_nodes<E: RuleEngine>(space: &StateSpace<E>) -> BTreeSet<NodeId> {
    let forward = reachable(space, space.initial_node().id(), false);
    let backward = reachable(space, space.target_node().id(), true);
    forward.intersection(&backward).copied().collect()
}

/// Restrict `space` to its relevant nodes.
///
/// The initial and target nodes are always kept, so when no walk exists the
/// result is those two nodes without edges and `connected` is `false`.
pub fn prune<E: RuleEngine>(space: &StateSpace<E>) -> Pruned<E> {
    let keep = relevant_nodes(space);
    let pruned = space.sub_space(&keep);
    let connected = pruned.degree(pruned.target_node().id()) > 0;
    if connected {
        tracing::info!(before = %space, after = %pruned, "pruned state space");
    } else {
        tracing::info!(before = %space, "no initial-to-target walk; pruned space is empty");
    }
    Pruned {
        space: pruned,
        connected,
    }
}
