//! JSON persistence of state spaces.
//!
//! Document layout:
//!
//! ```json
//! {
//!   "nodes": [{"id": 0, "state": {"A": 2}}],
//!   "edges": [{"src": 0, "tar": 1, "edges": [17]}],
//!   "expanded": [0],
//!   "inverse_expanded": [1]
//! }
//! ```
//!
//! Species are stored by name and events by engine identity. Reloading
//! resolves both, and fails instead of returning a partial graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::graph::{NodeId, SharedExpander, StateSpace, StateSpaceNode};
use super::path::Path;
use crate::chem::{SpeciesResolver, State, StateMultiset};
use crate::engine::{EventId, RuleEngine};
use crate::error::{MechError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    pub state: BTreeMap<String, u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub src: NodeId,
    pub tar: NodeId,
    pub edges: Vec<EventId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSpaceDocument {
    pub nodes: Vec<NodeDocument>,
    pub edges: Vec<EdgeDocument>,
    pub expanded: Vec<NodeId>,
    pub inverse_expanded: Vec<NodeId>,
}

/// Resolve a `{name: count}` map into a state.
pub fn resolve_state(names: &BTreeMap<String, u32>, resolver: &SpeciesResolver) -> Result<State> {
    let counts = names
        .iter()
        .map(|(name, &count)| {
            resolver
                .resolve(name)
                .map(|species| (species, count))
                .ok_or_else(|| MechError::UnknownSpecies(name.clone()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(State::new(StateMultiset::from_counts(counts)))
}

impl<E: RuleEngine> StateSpace<E> {
    pub fn to_document(&self) -> StateSpaceDocument {
        StateSpaceDocument {
            nodes: self
                .nodes()
                .map(|node| NodeDocument {
                    id: node.id(),
                    state: node.state().multiset().to_name_counts(),
                })
                .collect(),
            edges: self
                .edges()
                .map(|edge| EdgeDocument {
                    src: edge.source().id(),
                    tar: edge.target().id(),
                    edges: edge.transitions().iter().map(|e| e.id()).collect(),
                })
                .collect(),
            expanded: self.expanded_nodes(false).collect(),
            inverse_expanded: self.expanded_nodes(true).collect(),
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.to_document())?)
    }

    /// Rebuild a state space from its document.
    ///
    /// # Arguments
    /// * `document` - Persisted nodes, edges and expansion marks
    /// * `expander` - Derivation cache used to resolve event identities
    /// * `resolver` - Species names (and aliases) to species
    /// * `initial` - Initial state of the query; added if absent
    /// * `target` - Target state of the query; added if absent
    ///
    /// # Errors
    /// Unknown species, events or node ids, duplicated nodes or edges.
    pub fn from_document(
        document: &StateSpaceDocument,
        expander: SharedExpander<E>,
        resolver: &SpeciesResolver,
        initial: State,
        target: State,
    ) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut states = HashSet::new();
        let mut nodes = Vec::with_capacity(document.nodes.len());
        for node in &document.nodes {
            let state = resolve_state(&node.state, resolver)?;
            if !ids.insert(node.id) {
                return Err(MechError::Document(format!("node id {} occurs twice", node.id)));
            }
            if !states.insert(state.clone()) {
                return Err(MechError::Document(format!("state {state} occurs twice")));
            }
            nodes.push(StateSpaceNode::new(node.id, state));
        }
        let by_id: HashMap<NodeId, StateSpaceNode> =
            nodes.iter().map(|node| (node.id(), node.clone())).collect();
        let node = |id: NodeId| by_id.get(&id).cloned().ok_or(MechError::UnknownNode(id));

        let mut space = StateSpace::with_nodes(expander, nodes.iter().cloned(), initial, target);

        let mut seen_edges = HashSet::new();
        for edge in &document.edges {
            if !seen_edges.insert((edge.src, edge.tar)) {
                return Err(MechError::DuplicateEdge(edge.src, edge.tar));
            }
            let source = node(edge.src)?;
            let target = node(edge.tar)?;
            let transitions = {
                let expander = space.expander().borrow();
                edge.edges
                    .iter()
                    .map(|&id| expander.lookup_event(id).ok_or(MechError::UnknownEvent(id)))
                    .collect::<Result<BTreeSet<_>>>()?
            };
            space.add_transitions(&source, &target, transitions);
        }

        for (marked, inverse) in [(&document.expanded, false), (&document.inverse_expanded, true)] {
            for &id in marked {
                node(id)?;
                space.mark_expanded(id, inverse);
            }
        }

        tracing::debug!(
            states = space.num_states(),
            edges = space.num_edges(),
            "loaded state space"
        );
        Ok(space)
    }

    pub fn from_json(
        value: Value,
        expander: SharedExpander<E>,
        resolver: &SpeciesResolver,
        initial: State,
        target: State,
    ) -> Result<Self> {
        let document: StateSpaceDocument = serde_json::from_value(value)?;
        Self::from_document(&document, expander, resolver, initial, target)
    }

    /// Resolve a path serialized by [`Path::to_json`] against this space.
    pub fn path_from_json(&self, value: &Value) -> Result<Path> {
        let edges: Vec<EdgeDocument> = serde_json::from_value(value.clone())?;
        let mut nodes: Vec<NodeId> = edges.first().map(|e| e.src).into_iter().collect();
        for edge in &edges {
            if nodes.last() != Some(&edge.src) {
                return Err(MechError::Document(format!(
                    "path edge {} -> {} does not continue the walk",
                    edge.src, edge.tar
                )));
            }
            nodes.push(edge.tar);
        }
        self.get_path(&nodes)
    }
}
