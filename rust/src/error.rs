//! Error types.
//!
//! `EngineError` is raised by a rule engine for a single malformed rule
//! application and is always recovered locally. `MechError` covers contract
//! violations that abort the surrounding operation.

use thiserror::Error;

use crate::engine::{EventId, RuleId};
use crate::space::NodeId;

/// Semantic error reported by a [`RuleEngine`](crate::engine::RuleEngine).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("rule {rule} is malformed: {reason}")]
    MalformedRule { rule: RuleId, reason: String },
    #[error("rule {rule} cannot be applied to the given species: {reason}")]
    MalformedInput { rule: RuleId, reason: String },
    #[error("unknown rule {0}")]
    UnknownRule(RuleId),
}

/// Fatal error of the exploration engine.
#[derive(Debug, Error)]
pub enum MechError {
    #[error("multiset subtraction would make the count of `{species}` negative ({have} - {take})")]
    NegativeMultiplicity {
        species: String,
        have: u32,
        take: u32,
    },

    #[error(
        "contradictory paths to node {node}: {found} < finalized {finalized} (negative or non-monotone weight?)"
    )]
    NegativeRelaxation {
        node: NodeId,
        found: f64,
        finalized: f64,
    },

    #[error("species `{0}` cannot be resolved")]
    UnknownSpecies(String),

    #[error("event {0} is unknown to the derivation graph")]
    UnknownEvent(EventId),

    #[error("node {0} is not part of the state space")]
    UnknownNode(NodeId),

    #[error("edge {0} -> {1} occurs more than once")]
    DuplicateEdge(NodeId, NodeId),

    #[error("there is no edge {0} -> {1}")]
    MissingEdge(NodeId, NodeId),

    #[error("malformed state-space document: {0}")]
    Document(String),

    #[error("state spaces built on different derivation expanders cannot be merged")]
    ForeignExpander,

    #[error("invalid reaction network: {0}")]
    Network(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = MechError> = std::result::Result<T, E>;
