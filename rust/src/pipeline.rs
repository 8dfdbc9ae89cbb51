//! End-to-end exploration of a [`ReactionNetwork`] query.
//!
//! Wires the pieces together the way the command-line tool and the Python
//! bindings use them: build the derivation cache, saturate it with a
//! bidirectional BFS, freeze, optionally prune, then rank mechanisms.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::chem::{SpeciesId, TransitionGuard};
use crate::config::{ExplorationConfig, WeightKind};
use crate::distance::DistanceGuard;
use crate::error::Result;
use crate::explore::{
    bidirectional_bfs, shortest_simple_paths, ConstantWeight, EdgeWeight, EnergyBarrier, EnergyDifference,
    TableEnergy,
};
use crate::network::ReactionNetwork;
use crate::pruning::prune;
use crate::space::{DerivationExpander, Path, StateSpace};

/// One ranked mechanism.
#[derive(Clone, Debug)]
pub struct Mechanism {
    /// 1-based rank in cost order.
    pub rank: usize,
    pub cost: f64,
    pub path: Path,
}

impl Mechanism {
    pub fn to_json(&self) -> Value {
        json!({
            "rank": self.rank,
            "cost": self.cost,
            "states": self.path.iter().map(|edge| edge.source().state().to_string())
                .chain(self.path.end().map(|node| node.state().to_string()))
                .collect::<Vec<_>>(),
            "path": self.path.to_json(),
        })
    }
}

/// Explored (and possibly pruned) space together with its best mechanisms.
pub struct Exploration {
    pub space: StateSpace<ReactionNetwork>,
    /// `false` when pruning found no initial-to-target walk.
    pub connected: bool,
    pub mechanisms: Vec<Mechanism>,
}

/// Instantiate the weight named by `kind`.
///
/// Species without an energy in `energies` count as zero.
pub fn make_weight(kind: WeightKind, energies: &HashMap<SpeciesId, f64>) -> Box<dyn EdgeWeight> {
    let table = || TableEnergy::new(energies.clone(), 0.0);
    match kind {
        WeightKind::Constant => Box::new(ConstantWeight::default()),
        WeightKind::EnergyDifference => Box::new(EnergyDifference::new(table())),
        WeightKind::EnergyBarrier => Box::new(EnergyBarrier::new(table())),
    }
}

/// Run the full pipeline on the query stored in `network`.
///
/// A displacement guard over the network's atom bonds is installed when
/// `config.displacement_threshold` is set.
///
/// # Errors
/// Fatal expansion and search errors, e.g.
/// [`MechError::NegativeRelaxation`](crate::error::MechError::NegativeRelaxation)
/// when a decreasing weight is combined with Dijkstra.
pub fn explore_network(network: ReactionNetwork, config: &ExplorationConfig) -> Result<Exploration> {
    let guard = config.displacement_threshold.map(|threshold| {
        Rc::new(DistanceGuard::from_bonds(
            network.atom_count(),
            network.atom_bonds(),
            threshold,
        )) as Rc<dyn TransitionGuard>
    });
    explore_network_guarded(network, config, guard)
}

/// [`explore_network`] with an explicit transition guard.
pub fn explore_network_guarded(
    network: ReactionNetwork,
    config: &ExplorationConfig,
    guard: Option<Rc<dyn TransitionGuard>>,
) -> Result<Exploration> {
    let weight = make_weight(config.weight, network.energies());
    let initial = network.initial_state();
    let target = network.target_state();

    let expander = DerivationExpander::with_max_sub_multiset_size(network, config.max_sub_multiset_size);
    let mut space = StateSpace::new(Rc::new(RefCell::new(expander)), initial, target);
    if let Some(guard) = guard {
        space.set_transition_guard(guard);
    }
    space.set_expansion_limit(config.expansion_limit);

    bidirectional_bfs(&mut space, config.max_length)?;
    space.freeze();

    let mut connected = true;
    if config.prune {
        let pruned = prune(&space);
        connected = pruned.connected;
        space = pruned.space;
    }

    let mut mechanisms = Vec::new();
    if connected {
        let paths = shortest_simple_paths(
            &mut space,
            weight.as_ref(),
            config.algorithm,
            config.search_expansion_limit,
        );
        for (index, found) in paths.take(config.num_paths).enumerate() {
            let (cost, path) = found?;
            mechanisms.push(Mechanism {
                rank: index + 1,
                cost,
                path,
            });
        }
    }
    tracing::info!(found = mechanisms.len(), requested = config.num_paths, "mechanism search finished");

    Ok(Exploration {
        space,
        connected,
        mechanisms,
    })
}
