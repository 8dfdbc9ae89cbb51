//! Depth-first sampling of initial-to-target walks.

use std::collections::{HashSet, VecDeque};

use super::weight::EdgeWeight;
use crate::engine::RuleEngine;
use crate::error::{MechError, Result};
use crate::space::{NodeId, Path, StateSpace};

/// Lazy depth-first enumeration of paths from the initial to the target node.
///
/// Out-edges are pushed in descending `weight(0, edge)` order, so the cheapest
/// edge is explored first. A node is pushed at most once over the whole run,
/// which keeps the search linear in the space but means not every simple path
/// is produced. Paths never have more than `max_len` edges.
pub struct DepthFirstPaths<'a, E: RuleEngine, W: EdgeWeight + ?Sized> {
    space: &'a mut StateSpace<E>,
    weight: &'a W,
    target: NodeId,
    max_len: Option<usize>,
    stack: Vec<NodeId>,
    path: Vec<NodeId>,
    seen: HashSet<NodeId>,
    pushed: HashSet<NodeId>,
    pending: VecDeque<Vec<NodeId>>,
    finished: bool,
}

impl<'a, E: RuleEngine, W: EdgeWeight + ?Sized> DepthFirstPaths<'a, E, W> {
    pub fn new(space: &'a mut StateSpace<E>, weight: &'a W, max_len: Option<usize>) -> Self {
        let source = space.initial_node().id();
        let target = space.target_node().id();
        Self {
            space,
            weight,
            target,
            max_len,
            stack: vec![source],
            path: Vec::new(),
            seen: HashSet::new(),
            pushed: HashSet::from([source]),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Process one stack entry. Returns `false` once the search is over.
    fn step(&mut self) -> Result<bool> {
        let Some(v) = self.stack.pop() else {
            return Ok(false);
        };
        if self.seen.contains(&v) {
            // second visit: v's subtree is done
            return Ok(self.path.pop().is_some());
        }
        self.seen.insert(v);
        self.stack.push(v);
        self.path.push(v);
        if self.max_len.is_some_and(|max| self.path.len() > max) {
            return Ok(true);
        }

        let node = self.space.node(v).cloned().ok_or(MechError::UnknownNode(v))?;
        let mut keys = Vec::new();
        for edge in self.space.expand_all(&node, false)? {
            if !keys.contains(&edge.key()) {
                keys.push(edge.key());
            }
        }
        let mut edges: Vec<_> = keys
            .into_iter()
            .filter_map(|(s, t)| self.space.edge(s, t).cloned())
            .collect();
        edges.sort_by(|a, b| {
            self.weight
                .weight(0.0, b)
                .total_cmp(&self.weight.weight(0.0, a))
        });

        for edge in edges {
            let next = edge.target().id();
            if next == self.target {
                let mut found = self.path.clone();
                found.push(next);
                self.pending.push_back(found);
            } else if self.pushed.insert(next) {
                self.stack.push(next);
            }
        }
        Ok(true)
    }
}

impl<'a, E: RuleEngine, W: EdgeWeight + ?Sized> Iterator for DepthFirstPaths<'a, E, W> {
    type Item = Result<Path>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(nodes) = self.pending.pop_front() {
                return Some(self.space.get_path(&nodes));
            }
            if self.finished {
                return None;
            }
            match self.step() {
                Ok(true) => {}
                Ok(false) => self.finished = true,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::test_support::{chain_space, synthetic_space, table_weight};

    #[test]
    fn test_chain() {
        let (mut space, _) = chain_space();
        let unit = |accumulated: f64, _: &crate::space::StateSpaceEdge| accumulated + 1.0;
        let paths: Vec<Path> = DepthFirstPaths::new(&mut space, &unit, None)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 2);
    }

    #[test]
    fn test_cheapest_branch_first() {
        // 0 -> 1 -> 3 is cheap, 0 -> 2 -> 3 is expensive, plus 0 -> 3
        let costs = HashMap::from([
            ((0, 1), 1.0),
            ((1, 3), 1.0),
            ((0, 2), 5.0),
            ((2, 3), 5.0),
            ((0, 3), 9.0),
        ]);
        let edges: Vec<_> = costs.keys().copied().collect();
        let (mut space, _) = synthetic_space(4, &edges, 0, 3);
        let weight = table_weight(costs);
        let paths: Vec<Path> = DepthFirstPaths::new(&mut space, &weight, None)
            .collect::<Result<_>>()
            .unwrap();
        let lengths: Vec<usize> = paths.iter().map(Path::len).collect();
        // the direct edge is found while expanding the source, then the cheap
        // branch is explored before the expensive one
        assert_eq!(lengths, vec![1, 2, 2]);
        assert_eq!(paths[1].cost(&weight), 2.0);
        assert_eq!(paths[2].cost(&weight), 10.0);
    }

    #[test]
    fn test_max_len() {
        let (mut space, _) = synthetic_space(4, &[(0, 1), (1, 3), (0, 3)], 0, 3);
        let unit = |accumulated: f64, _: &crate::space::StateSpaceEdge| accumulated + 1.0;
        let paths: Vec<Path> = DepthFirstPaths::new(&mut space, &unit, Some(1))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 1);
    }

    #[test]
    fn test_unreachable() {
        let (mut space, _) = synthetic_space(3, &[(0, 1)], 0, 2);
        let unit = |accumulated: f64, _: &crate::space::StateSpaceEdge| accumulated + 1.0;
        assert_eq!(DepthFirstPaths::new(&mut space, &unit, None).count(), 0);
    }
}
