//! Search algorithms over a [`StateSpace`].
//!
//! Every search expands nodes lazily through [`StateSpace::expand`], so on an
//! unfrozen space a search may grow the graph. Freeze the space first to
//! search only what has already been explored.

pub mod bfs;
pub mod dfs;
pub mod dijkstra;
pub mod weight;
pub mod yen;

pub use bfs::{bidirectional_bfs, compute_state_space};
pub use dfs::DepthFirstPaths;
pub use dijkstra::{bidirectional_dijkstra, dijkstra, NodePath, SearchOptions};
pub use weight::{ConstantWeight, EdgeWeight, EnergyBarrier, EnergyDifference, EnergyModel, TableEnergy};
pub use yen::SimplePaths;

pub use crate::config::SearchAlgorithm;

use crate::engine::RuleEngine;
use crate::error::Result;
use crate::space::{NodeId, Path, StateSpace};

pub(crate) fn search_nodes<E, W>(
    space: &mut StateSpace<E>,
    source: NodeId,
    target: NodeId,
    weight: &W,
    algorithm: SearchAlgorithm,
    options: &SearchOptions,
) -> Result<Option<NodePath>>
where
    E: RuleEngine,
    W: EdgeWeight + ?Sized,
{
    match algorithm {
        SearchAlgorithm::Dijkstra => dijkstra(space, source, target, weight, options),
        SearchAlgorithm::BidirectionalDijkstra => bidirectional_dijkstra(space, source, target, weight, options),
    }
}

/// Cheapest path between two nodes of `space`.
///
/// # Returns
/// `Ok(None)` when no path exists within the exclusions and cutoff of
/// `options`. A path from a node to itself is empty.
///
/// # Errors
/// [`MechError::UnknownNode`](crate::error::MechError::UnknownNode) for ids
/// outside the space,
/// [`MechError::NegativeRelaxation`](crate::error::MechError::NegativeRelaxation)
/// for weights that decrease.
pub fn shortest_path_between<E, W>(
    space: &mut StateSpace<E>,
    source: NodeId,
    target: NodeId,
    weight: &W,
    algorithm: SearchAlgorithm,
    options: &SearchOptions,
) -> Result<Option<(f64, Path)>>
where
    E: RuleEngine,
    W: EdgeWeight + ?Sized,
{
    match search_nodes(space, source, target, weight, algorithm, options)? {
        Some((cost, nodes)) => Ok(Some((cost, space.get_path(&nodes)?))),
        None => Ok(None),
    }
}

/// Cheapest mechanism from the initial to the target node.
pub fn shortest_path<E, W>(
    space: &mut StateSpace<E>,
    weight: &W,
    algorithm: SearchAlgorithm,
) -> Result<Option<(f64, Path)>>
where
    E: RuleEngine,
    W: EdgeWeight + ?Sized,
{
    let source = space.initial_node().id();
    let target = space.target_node().id();
    shortest_path_between(space, source, target, weight, algorithm, &SearchOptions::default())
}

/// Simple initial-to-target paths in non-decreasing cost order.
///
/// # Arguments
/// * `expansion_limit` - Nodes each underlying search may settle before
///   giving up
pub fn shortest_simple_paths<'a, E, W>(
    space: &'a mut StateSpace<E>,
    weight: &'a W,
    algorithm: SearchAlgorithm,
    expansion_limit: Option<usize>,
) -> SimplePaths<'a, E, W>
where
    E: RuleEngine,
    W: EdgeWeight + ?Sized,
{
    let source = space.initial_node().id();
    let target = space.target_node().id();
    SimplePaths::new(space, source, target, weight, algorithm, expansion_limit)
}

/// Depth-first initial-to-target paths of at most `max_len` edges.
pub fn dfs<'a, E, W>(space: &'a mut StateSpace<E>, weight: &'a W, max_len: Option<usize>) -> DepthFirstPaths<'a, E, W>
where
    E: RuleEngine,
    W: EdgeWeight + ?Sized,
{
    DepthFirstPaths::new(space, weight, max_len)
}
