//! Lazy state-space exploration and mechanism search.
//!
//! A *state* is a multiset of chemical species. A pluggable [`RuleEngine`]
//! derives the elementary events applicable to (sub-multisets of) a state;
//! the [`DerivationExpander`] caches those derivations per sub-multiset so
//! that many states, and many state spaces, share the work. A [`StateSpace`]
//! materializes the graph of states reachable from an initial state (and
//! backward from a target state) on demand, and the [`explore`] module
//! searches it for mechanisms: initial-to-target paths ranked by a
//! configurable [`EdgeWeight`].
//!
//! ```no_run
//! use mechsearch::{explore_network, ExplorationConfig, ReactionNetwork};
//!
//! let network = ReactionNetwork::from_json_str(&std::fs::read_to_string("network.json")?)?;
//! let result = explore_network(network, &ExplorationConfig::default())?;
//! for mechanism in &result.mechanisms {
//!     println!("{}: {}", mechanism.cost, mechanism.path);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Everything is single-threaded: spaces share their derivation cache
//! through [`SharedExpander`], an `Rc<RefCell<_>>`.

pub mod chem;
pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod explore;
pub mod network;
pub mod pipeline;
pub mod planner;
pub mod pruning;
pub mod space;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod test_support;

pub use chem::{Species, SpeciesId, SpeciesResolver, State, StateMultiset, TransitionGuard};
pub use config::{ExplorationConfig, SearchAlgorithm, WeightKind};
pub use distance::DistanceGuard;
pub use engine::{Event, EventId, Rule, RuleEngine, RuleId};
pub use error::{EngineError, MechError, Result};
pub use explore::{
    bidirectional_bfs, compute_state_space, dfs, shortest_path, shortest_path_between, shortest_simple_paths,
    EdgeWeight,
};
pub use network::ReactionNetwork;
pub use pipeline::{explore_network, Exploration, Mechanism};
pub use planner::{plan_with_catalysts, CatalystPlan};
pub use pruning::prune;
pub use space::{DerivationExpander, NodeId, Path, SharedExpander, StateSpace, StateSpaceEdge, StateSpaceNode};
