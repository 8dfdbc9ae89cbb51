//! Single-source and bidirectional Dijkstra over a lazily expanded space.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::weight::EdgeWeight;
use crate::engine::RuleEngine;
use crate::error::{MechError, Result};
use crate::space::{NodeId, StateSpace};

/// Restrictions applied to one search.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    /// Nodes that may not be entered.
    pub ignore_nodes: HashSet<NodeId>,
    /// `(source, target)` edges that may not be used.
    pub ignore_edges: HashSet<(NodeId, NodeId)>,
    /// Give up (no path) after settling this many nodes.
    pub expansion_limit: Option<usize>,
    /// Cost already accumulated at the source.
    pub start_cost: f64,
}

/// A shortest path as a node sequence with its cost.
pub type NodePath = (f64, Vec<NodeId>);

/// Min-heap entry ordered by `(cost, insertion order)`.
#[derive(Debug)]
struct Frontier {
    cost: f64,
    seq: u64,
    node: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn ensure_node<E: RuleEngine>(space: &StateSpace<E>, id: NodeId) -> Result<()> {
    if space.contains_node(id) {
        Ok(())
    } else {
        Err(MechError::UnknownNode(id))
    }
}

fn walk_back(prev: &HashMap<NodeId, NodeId>, end: NodeId) -> Vec<NodeId> {
    let mut nodes = vec![end];
    let mut current = end;
    while let Some(&before) = prev.get(&current) {
        nodes.push(before);
        current = before;
    }
    nodes.reverse();
    nodes
}

/// Cheapest walk from `source` to `target`, expanding forward on demand.
///
/// # Returns
/// `Ok(None)` if the target is unreachable within the explored space, the
/// exclusions or the expansion cutoff.
///
/// # Errors
/// [`MechError::NegativeRelaxation`] if an edge would lower the distance of
/// an already settled node.
pub fn dijkstra<E, W>(
    space: &mut StateSpace<E>,
    source: NodeId,
    target: NodeId,
    weight: &W,
    options: &SearchOptions,
) -> Result<Option<NodePath>>
where
    E: RuleEngine,
    W: EdgeWeight + ?Sized,
{
    ensure_node(space, source)?;
    ensure_node(space, target)?;
    if source == target {
        return Ok(Some((options.start_cost, vec![source])));
    }

    let mut settled: HashMap<NodeId, f64> = HashMap::new();
    let mut tentative: HashMap<NodeId, f64> = HashMap::from([(source, options.start_cost)]);
    let mut prev: HashMap<NodeId, NodeId> = HashMap::new();
    let mut fringe = BinaryHeap::from([Frontier {
        cost: options.start_cost,
        seq: 0,
        node: source,
    }]);
    let mut seq = 1;

    while let Some(Frontier { cost, node: v, .. }) = fringe.pop() {
        if settled.contains_key(&v) {
            continue;
        }
        if v == target {
            return Ok(Some((cost, walk_back(&prev, target))));
        }
        settled.insert(v, cost);

        let node = space.node(v).cloned().ok_or(MechError::UnknownNode(v))?;
        for edge in space.expand(&node, false) {
            let edge = edge?;
            let w = edge.target().id();
            if options.ignore_nodes.contains(&w) || options.ignore_edges.contains(&edge.key()) {
                continue;
            }
            let alt = weight.weight(cost, &edge);
            if let Some(&done) = settled.get(&w) {
                if alt < done {
                    return Err(MechError::NegativeRelaxation {
                        node: w,
                        found: alt,
                        finalized: done,
                    });
                }
                continue;
            }
            if tentative.get(&w).map_or(true, |&known| alt < known) {
                tentative.insert(w, alt);
                prev.insert(w, v);
                fringe.push(Frontier {
                    cost: alt,
                    seq,
                    node: w,
                });
                seq += 1;
            }
        }

        if options.expansion_limit.is_some_and(|limit| settled.len() >= limit) {
            tracing::debug!(settled = settled.len(), "search expansion limit reached");
            return Ok(None);
        }
    }
    Ok(None)
}

/// Bidirectional Dijkstra alternating a forward search from `source` with an
/// inverse search from `target`.
///
/// Stops when a node has been settled in both directions and returns the
/// cheapest meeting seen so far, combining costs as
/// `forward + backward`. The weight is applied in both directions with the
/// cost accumulated on that side, so it must be additive and symmetric.
pub fn bidirectional_dijkstra<E, W>(
    space: &mut StateSpace<E>,
    source: NodeId,
    target: NodeId,
    weight: &W,
    options: &SearchOptions,
) -> Result<Option<NodePath>>
where
    E: RuleEngine,
    W: EdgeWeight + ?Sized,
{
    ensure_node(space, source)?;
    ensure_node(space, target)?;
    if source == target {
        return Ok(Some((options.start_cost, vec![source])));
    }

    let mut settled: [HashMap<NodeId, f64>; 2] = [HashMap::new(), HashMap::new()];
    let mut tentative: [HashMap<NodeId, f64>; 2] = [
        HashMap::from([(source, options.start_cost)]),
        HashMap::from([(target, 0.0)]),
    ];
    let mut prev: [HashMap<NodeId, NodeId>; 2] = [HashMap::new(), HashMap::new()];
    let mut fringe = [
        BinaryHeap::from([Frontier {
            cost: options.start_cost,
            seq: 0,
            node: source,
        }]),
        BinaryHeap::from([Frontier {
            cost: 0.0,
            seq: 1,
            node: target,
        }]),
    ];
    let mut seq = 2;
    let mut best: Option<NodePath> = None;
    let mut dir = 1;

    while !fringe[0].is_empty() && !fringe[1].is_empty() {
        dir = 1 - dir;
        let Some(Frontier { cost, node: v, .. }) = fringe[dir].pop() else {
            break;
        };
        if settled[dir].contains_key(&v) {
            continue;
        }
        settled[dir].insert(v, cost);
        if settled[1 - dir].contains_key(&v) {
            return Ok(best);
        }

        let inverse = dir == 1;
        let node = space.node(v).cloned().ok_or(MechError::UnknownNode(v))?;
        for edge in space.expand(&node, inverse) {
            let edge = edge?;
            let w = if inverse {
                edge.source().id()
            } else {
                edge.target().id()
            };
            if options.ignore_nodes.contains(&w) || options.ignore_edges.contains(&edge.key()) {
                continue;
            }
            let alt = weight.weight(cost, &edge);
            if let Some(&done) = settled[dir].get(&w) {
                if alt < done {
                    return Err(MechError::NegativeRelaxation {
                        node: w,
                        found: alt,
                        finalized: done,
                    });
                }
                continue;
            }
            if tentative[dir].get(&w).map_or(true, |&known| alt < known) {
                tentative[dir].insert(w, alt);
                prev[dir].insert(w, v);
                fringe[dir].push(Frontier {
                    cost: alt,
                    seq,
                    node: w,
                });
                seq += 1;

                if let (Some(&forward), Some(&backward)) = (tentative[0].get(&w), tentative[1].get(&w)) {
                    let total = forward + backward;
                    if best.as_ref().map_or(true, |(known, _)| total < *known) {
                        let mut nodes = walk_back(&prev[0], w);
                        let mut tail = walk_back(&prev[1], w);
                        tail.reverse();
                        nodes.extend(tail.into_iter().skip(1));
                        best = Some((total, nodes));
                    }
                }
            }
        }

        let settled_total = settled[0].len() + settled[1].len();
        if options.expansion_limit.is_some_and(|limit| settled_total >= limit) {
            tracing::debug!(settled = settled_total, "search expansion limit reached");
            return Ok(None);
        }
    }
    Ok(best)
}
