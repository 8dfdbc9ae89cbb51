//! Loopless k-shortest paths (Yen), produced lazily.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use super::dijkstra::SearchOptions;
use super::search_nodes;
use super::weight::EdgeWeight;
use crate::config::SearchAlgorithm;
use crate::engine::RuleEngine;
use crate::error::Result;
use crate::space::{NodeId, Path, StateSpace};

/// Buffered candidate, min-ordered by `(cost, insertion order)`.
#[derive(Debug)]
struct Candidate {
    cost: f64,
    seq: u64,
    nodes: Vec<NodeId>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Iterator over simple paths in non-decreasing cost order.
///
/// Every spur search uses the configured algorithm and settles at most
/// `expansion_limit` nodes. Candidates are deduplicated by node sequence for
/// the lifetime of the iterator. After an error the iterator is fused.
pub struct SimplePaths<'a, E: RuleEngine, W: EdgeWeight + ?Sized> {
    space: &'a mut StateSpace<E>,
    weight: &'a W,
    algorithm: SearchAlgorithm,
    expansion_limit: Option<usize>,
    source: NodeId,
    target: NodeId,
    emitted: Vec<Vec<NodeId>>,
    buffer: BinaryHeap<Candidate>,
    queued: HashSet<Vec<NodeId>>,
    seq: u64,
    started: bool,
    finished: bool,
}

impl<'a, E: RuleEngine, W: EdgeWeight + ?Sized> SimplePaths<'a, E, W> {
    pub fn new(
        space: &'a mut StateSpace<E>,
        source: NodeId,
        target: NodeId,
        weight: &'a W,
        algorithm: SearchAlgorithm,
        expansion_limit: Option<usize>,
    ) -> Self {
        Self {
            space,
            weight,
            algorithm,
            expansion_limit,
            source,
            target,
            emitted: Vec::new(),
            buffer: BinaryHeap::new(),
            queued: HashSet::new(),
            seq: 0,
            started: false,
            finished: false,
        }
    }

    /// Paths emitted so far, as node sequences.
    pub fn emitted(&self) -> &[Vec<NodeId>] {
        &self.emitted
    }

    fn enqueue(&mut self, nodes: Vec<NodeId>) -> Result<()> {
        if self.queued.contains(&nodes) {
            return Ok(());
        }
        let cost = self.space.get_path(&nodes)?.cost(self.weight);
        self.queued.insert(nodes.clone());
        self.buffer.push(Candidate {
            cost,
            seq: self.seq,
            nodes,
        });
        self.seq += 1;
        Ok(())
    }

    /// Spur searches deviating from the most recently emitted path.
    fn branch(&mut self) -> Result<()> {
        let Some(previous) = self.emitted.last().cloned() else {
            return Ok(());
        };

        let mut ignore_nodes = HashSet::new();
        for i in 1..previous.len() {
            let root = &previous[..i];
            let spur = previous[i - 1];
            let ignore_edges = self
                .emitted
                .iter()
                .filter(|path| path.len() > i && path[..i] == *root)
                .map(|path| (path[i - 1], path[i]))
                .collect();
            let options = SearchOptions {
                ignore_nodes: ignore_nodes.clone(),
                ignore_edges,
                expansion_limit: self.expansion_limit,
                start_cost: self.space.get_path(root)?.cost(self.weight),
            };

            let found = search_nodes(self.space, spur, self.target, self.weight, self.algorithm, &options)?;
            if let Some((_, spur_path)) = found {
                let mut candidate = root[..i - 1].to_vec();
                candidate.extend(spur_path);
                self.enqueue(candidate)?;
            }
            ignore_nodes.insert(spur);
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<(f64, Path)>> {
        if self.started {
            self.branch()?;
        } else {
            self.started = true;
            let options = SearchOptions {
                expansion_limit: self.expansion_limit,
                ..SearchOptions::default()
            };
            if let Some((_, nodes)) =
                search_nodes(self.space, self.source, self.target, self.weight, self.algorithm, &options)?
            {
                self.enqueue(nodes)?;
            }
        }

        let Some(Candidate { cost, nodes, .. }) = self.buffer.pop() else {
            return Ok(None);
        };
        let path = self.space.get_path(&nodes)?;
        tracing::debug!(cost, length = path.len(), rank = self.emitted.len() + 1, "simple path");
        self.emitted.push(nodes);
        Ok(Some((cost, path)))
    }
}

impl<'a, E: RuleEngine, W: EdgeWeight + ?Sized> Iterator for SimplePaths<'a, E, W> {
    type Item = Result<(f64, Path)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(found)) => Some(Ok(found)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<'a, E: RuleEngine, W: EdgeWeight + ?Sized> std::iter::FusedIterator for SimplePaths<'a, E, W> {}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::test_support::{synthetic_space, table_weight};

    /// Costs of every simple path from `source` to `target`, ascending.
    fn all_simple_costs(
        nodes: usize,
        costs: &HashMap<(usize, usize), f64>,
        source: usize,
        target: usize,
    ) -> Vec<f64> {
        fn visit(
            at: usize,
            target: usize,
            cost: f64,
            on_path: &mut Vec<bool>,
            costs: &HashMap<(usize, usize), f64>,
            found: &mut Vec<f64>,
        ) {
            if at == target {
                found.push(cost);
                return;
            }
            for (&(from, to), &w) in costs {
                if from == at && !on_path[to] {
                    on_path[to] = true;
                    visit(to, target, cost + w, on_path, costs, found);
                    on_path[to] = false;
                }
            }
        }
        let mut on_path = vec![false; nodes];
        on_path[source] = true;
        let mut found = Vec::new();
        visit(source, target, 0.0, &mut on_path, costs, &mut found);
        found.sort_by(f64::total_cmp);
        found
    }

    #[test]
    fn test_enumerates_all_simple_paths_in_order() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..30 {
            let nodes = rng.gen_range(2..=7);
            let mut costs = HashMap::new();
            for from in 0..nodes {
                for to in 0..nodes {
                    if from != to && rng.gen_bool(0.4) {
                        costs.insert((from, to), f64::from(rng.gen_range(1..6u32)));
                    }
                }
            }
            let expected = all_simple_costs(nodes, &costs, 0, nodes - 1);

            for algorithm in [SearchAlgorithm::Dijkstra, SearchAlgorithm::BidirectionalDijkstra] {
                let edges: Vec<_> = costs.keys().copied().collect();
                let (mut space, _) = synthetic_space(nodes, &edges, 0, nodes - 1);
                let weight = table_weight(costs.clone());
                let (source, target) = (space.initial_node().id(), space.target_node().id());
                let found: Vec<(f64, Path)> =
                    SimplePaths::new(&mut space, source, target, &weight, algorithm, None)
                        .collect::<Result<_>>()
                        .unwrap();

                let found_costs: Vec<f64> = found.iter().map(|(cost, _)| *cost).collect();
                assert_eq!(found_costs, expected, "{algorithm}");
                let unique: HashSet<Vec<NodeId>> = found.iter().map(|(_, path)| path.nodes()).collect();
                assert_eq!(unique.len(), found.len());
                for (cost, path) in &found {
                    assert!(path.is_simple());
                    assert_eq!(path.cost(&weight), *cost);
                    assert_eq!(path.start().map(|n| n.id()), Some(source));
                    assert_eq!(path.end().map(|n| n.id()), Some(target));
                }
            }
        }
    }

    #[test]
    fn test_diamond_order() {
        // 0 -> 1 -> 3 (cost 2), 0 -> 2 -> 3 (cost 4), 0 -> 3 (cost 3)
        let costs = HashMap::from([
            ((0, 1), 1.0),
            ((1, 3), 1.0),
            ((0, 2), 2.0),
            ((2, 3), 2.0),
            ((0, 3), 3.0),
        ]);
        let edges: Vec<_> = costs.keys().copied().collect();
        let (mut space, _) = synthetic_space(4, &edges, 0, 3);
        let weight = table_weight(costs);
        let (source, target) = (space.initial_node().id(), space.target_node().id());
        let mut paths = SimplePaths::new(&mut space, source, target, &weight, SearchAlgorithm::Dijkstra, None);

        let lengths: Vec<(f64, usize)> = paths
            .by_ref()
            .map(|found| found.map(|(cost, path)| (cost, path.len())))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lengths, vec![(2.0, 2), (3.0, 1), (4.0, 2)]);
        assert_eq!(paths.emitted().len(), 3);
        assert!(paths.next().is_none());
    }

    #[test]
    fn test_source_is_target() {
        let (mut space, _) = synthetic_space(2, &[(0, 1)], 0, 1);
        let weight = table_weight(HashMap::new());
        let source = space.initial_node().id();
        let mut paths = SimplePaths::new(&mut space, source, source, &weight, SearchAlgorithm::Dijkstra, None);
        let (cost, path) = paths.next().unwrap().unwrap();
        assert_eq!(cost, 0.0);
        assert!(path.is_empty());
        assert!(paths.next().is_none());
    }
}
