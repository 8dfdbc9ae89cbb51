//! State-space graph.
//!
//! Nodes are deduplicated states, edges aggregate every elementary event
//! connecting an ordered pair of states. The graph is materialized lazily:
//! [`StateSpace::expand`] asks the shared derivation cache for the events of a
//! node the first time it is expanded in a direction, and serves the stored
//! incident edges afterwards.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{btree_set, BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::expander::DerivationExpander;
use super::path::Path;
use crate::chem::{State, TransitionGuard};
use crate::engine::{Event, RuleEngine};
use crate::error::{MechError, Result};

/// Node identity, unique within one state space and its derivatives.
pub type NodeId = usize;

/// Derivation cache shared by a space and every space derived from it.
///
/// Single-threaded by construction: `Rc` keeps it on one thread.
pub type SharedExpander<E> = Rc<RefCell<DerivationExpander<E>>>;

/// A state together with its identity in a state space.
#[derive(Clone, Debug)]
pub struct StateSpaceNode {
    id: NodeId,
    state: State,
}

impl StateSpaceNode {
    pub(crate) fn new(id: NodeId, state: State) -> Self {
        Self { id, state }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}

impl PartialEq for StateSpaceNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StateSpaceNode {}

impl Hash for StateSpaceNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for StateSpaceNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StateSpaceNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::fmt::Display for StateSpaceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.id, self.state)
    }
}

/// All events leading from `source` to `target`.
///
/// An edge with no transitions is a bridge inserted when merging spaces.
#[derive(Clone, Debug)]
pub struct StateSpaceEdge {
    source: StateSpaceNode,
    target: StateSpaceNode,
    transitions: BTreeSet<Event>,
}

impl StateSpaceEdge {
    pub fn new(source: StateSpaceNode, target: StateSpaceNode, transitions: BTreeSet<Event>) -> Self {
        Self {
            source,
            target,
            transitions,
        }
    }

    pub fn source(&self) -> &StateSpaceNode {
        &self.source
    }

    pub fn target(&self) -> &StateSpaceNode {
        &self.target
    }

    pub fn transitions(&self) -> &BTreeSet<Event> {
        &self.transitions
    }

    /// `(source id, target id)`
    pub fn key(&self) -> (NodeId, NodeId) {
        (self.source.id, self.target.id)
    }

    pub fn is_bridge(&self) -> bool {
        self.transitions.is_empty()
    }
}

impl PartialEq for StateSpaceEdge {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for StateSpaceEdge {}

impl Hash for StateSpaceEdge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Display for StateSpaceEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} ({} transitions)",
            self.source,
            self.target,
            self.transitions.len()
        )
    }
}

#[derive(Clone, Debug)]
struct NodeEntry {
    node: StateSpaceNode,
    successors: BTreeSet<NodeId>,
    predecessors: BTreeSet<NodeId>,
}

/// Lazily built reachability graph over reaction states.
pub struct StateSpace<E: RuleEngine> {
    expander: SharedExpander<E>,
    nodes: BTreeMap<NodeId, NodeEntry>,
    edges: BTreeMap<(NodeId, NodeId), StateSpaceEdge>,
    state_to_node: HashMap<State, NodeId>,
    expanded: BTreeSet<NodeId>,
    inverse_expanded: BTreeSet<NodeId>,
    expansion_limit: Option<usize>,
    initial: StateSpaceNode,
    target: StateSpaceNode,
    guard: Option<Rc<dyn TransitionGuard>>,
    next_id: NodeId,
}

impl<E: RuleEngine> StateSpace<E> {
    /// Create a space for one initial/target query.
    ///
    /// # Arguments
    /// * `expander` - Derivation cache, possibly shared with other spaces
    /// * `initial` - State the mechanisms start from
    /// * `target` - State the mechanisms must reach
    pub fn new(expander: SharedExpander<E>, initial: State, target: State) -> Self {
        Self::with_nodes(expander, std::iter::empty(), initial, target)
    }

    /// Create a space from nodes with fixed identities, then locate (or add)
    /// the initial and target states.
    pub(crate) fn with_nodes(
        expander: SharedExpander<E>,
        nodes: impl IntoIterator<Item = StateSpaceNode>,
        initial: State,
        target: State,
    ) -> Self {
        let placeholder = StateSpaceNode::new(0, initial.clone());
        let mut space = Self {
            expander,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            state_to_node: HashMap::new(),
            expanded: BTreeSet::new(),
            inverse_expanded: BTreeSet::new(),
            expansion_limit: None,
            initial: placeholder.clone(),
            target: placeholder,
            guard: None,
            next_id: 0,
        };
        for node in nodes {
            space.insert_node(node);
        }
        space.initial = space.add_state(initial);
        space.target = space.add_state(target);
        space
    }

    /// Create a space with a fresh, unshared derivation cache.
    pub fn from_engine(engine: E, initial: State, target: State) -> Self {
        Self::new(
            Rc::new(RefCell::new(DerivationExpander::new(engine))),
            initial,
            target,
        )
    }

    pub fn expander(&self) -> &SharedExpander<E> {
        &self.expander
    }

    pub fn initial_node(&self) -> &StateSpaceNode {
        &self.initial
    }

    pub fn target_node(&self) -> &StateSpaceNode {
        &self.target
    }

    /// Veto transitions during future expansions (for example by distance).
    pub fn set_transition_guard(&mut self, guard: Rc<dyn TransitionGuard>) {
        self.guard = Some(guard);
    }

    /// Maximum number of expansions (both directions combined); `None`
    /// removes the limit.
    pub fn set_expansion_limit(&mut self, limit: Option<usize>) {
        self.expansion_limit = limit;
    }

    pub fn expansion_limit(&self) -> Option<usize> {
        self.expansion_limit
    }

    /// Whether the expansion budget allows one more fresh expansion.
    pub fn can_expand(&self) -> bool {
        match self.expansion_limit {
            None => true,
            Some(limit) => limit > self.expanded.len() + self.inverse_expanded.len(),
        }
    }

    /// Freeze the shared derivation cache. Irreversible, and it affects every
    /// space sharing the cache.
    pub fn freeze(&self) {
        self.expander.borrow_mut().freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.expander.borrow().is_frozen()
    }

    pub fn num_states(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_expanded(&self, inverse: bool) -> usize {
        self.expanded_set(inverse).len()
    }

    pub fn is_expanded(&self, id: NodeId, inverse: bool) -> bool {
        self.expanded_set(inverse).contains(&id)
    }

    /// Ids of nodes fully expanded in one direction, ascending.
    pub fn expanded_nodes(&self, inverse: bool) -> impl Iterator<Item = NodeId> + '_ {
        self.expanded_set(inverse).iter().copied()
    }

    fn expanded_set(&self, inverse: bool) -> &BTreeSet<NodeId> {
        if inverse {
            &self.inverse_expanded
        } else {
            &self.expanded
        }
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &StateSpaceNode> + '_ {
        self.nodes.values().map(|entry| &entry.node)
    }

    pub fn node(&self, id: NodeId) -> Option<&StateSpaceNode> {
        self.nodes.get(&id).map(|entry| &entry.node)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The node holding `state`, if any.
    pub fn node_of(&self, state: &State) -> Option<&StateSpaceNode> {
        self.state_to_node.get(state).and_then(|id| self.node(*id))
    }

    /// Edges ordered by `(source id, target id)`.
    pub fn edges(&self) -> impl Iterator<Item = &StateSpaceEdge> + '_ {
        self.edges.values()
    }

    pub fn edge(&self, source: NodeId, target: NodeId) -> Option<&StateSpaceEdge> {
        self.edges.get(&(source, target))
    }

    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|entry| entry.successors.iter().copied())
    }

    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|entry| entry.predecessors.iter().copied())
    }

    /// Number of edges touching `id` in either direction.
    pub fn degree(&self, id: NodeId) -> usize {
        self.nodes
            .get(&id)
            .map_or(0, |entry| entry.successors.len() + entry.predecessors.len())
    }

    /// Return the node for `state`, creating it if the state is new.
    pub fn add_state(&mut self, state: State) -> StateSpaceNode {
        if let Some(node) = self.node_of(&state) {
            return node.clone();
        }
        let node = StateSpaceNode::new(self.next_id, state);
        self.insert_node(node.clone());
        node
    }

    /// Insert a node with a fixed identity (used when reloading).
    pub(crate) fn insert_node(&mut self, node: StateSpaceNode) {
        self.next_id = self.next_id.max(node.id + 1);
        self.state_to_node.insert(node.state.clone(), node.id);
        self.nodes.insert(
            node.id,
            NodeEntry {
                node,
                successors: BTreeSet::new(),
                predecessors: BTreeSet::new(),
            },
        );
    }

    /// Create the edge `source -> target` if needed and merge `transitions`
    /// into it.
    pub(crate) fn add_transitions(
        &mut self,
        source: &StateSpaceNode,
        target: &StateSpaceNode,
        transitions: impl IntoIterator<Item = Event>,
    ) -> &StateSpaceEdge {
        if let Some(entry) = self.nodes.get_mut(&source.id) {
            entry.successors.insert(target.id);
        }
        if let Some(entry) = self.nodes.get_mut(&target.id) {
            entry.predecessors.insert(source.id);
        }
        let edge = self
            .edges
            .entry((source.id, target.id))
            .or_insert_with(|| StateSpaceEdge::new(source.clone(), target.clone(), BTreeSet::new()));
        edge.transitions.extend(transitions);
        edge
    }

    pub(crate) fn mark_expanded(&mut self, id: NodeId, inverse: bool) {
        if inverse {
            self.inverse_expanded.insert(id);
        } else {
            self.expanded.insert(id);
        }
    }

    /// Edges incident to `node` in the given direction.
    ///
    /// Forward expansion yields out-edges, inverse expansion yields in-edges
    /// (the node is the edge target). Already expanded nodes, and every node
    /// of a frozen space, are answered from the stored graph. When the
    /// expansion budget is used up nothing is yielded and the node stays
    /// unexpanded. Otherwise every derivation is fired and each created or
    /// augmented edge is yielded, followed by stored incident edges no
    /// derivation produced (such as bridges from
    /// [`append_state_space`](Self::append_state_space)); the node is marked
    /// expanded once the iterator has been drained without error.
    pub fn expand(&mut self, node: &StateSpaceNode, inverse: bool) -> Expansion<'_, E> {
        let id = node.id();
        let mode = if self.node_of(node.state()).map(StateSpaceNode::id) != Some(id) {
            ExpansionMode::Failed(Some(MechError::UnknownNode(id)))
        } else if self.is_expanded(id, inverse) || self.is_frozen() {
            ExpansionMode::Cached(self.incident_keys(id, inverse).into_iter())
        } else if !self.can_expand() {
            tracing::debug!(node = id, inverse, "expansion budget exhausted");
            ExpansionMode::Done
        } else {
            let events = self
                .expander
                .borrow_mut()
                .compute_derivations(node.state().multiset(), inverse);
            tracing::debug!(node = id, inverse, events = events.len(), "expanding node");
            ExpansionMode::Fresh {
                node: node.clone(),
                events: events.into_iter(),
                yielded: BTreeSet::new(),
            }
        };
        Expansion {
            space: self,
            inverse,
            mode,
        }
    }

    /// Drain [`expand`](Self::expand) into a vector.
    pub fn expand_all(&mut self, node: &StateSpaceNode, inverse: bool) -> Result<Vec<StateSpaceEdge>> {
        self.expand(node, inverse).collect()
    }

    fn incident_keys(&self, id: NodeId, inverse: bool) -> Vec<(NodeId, NodeId)> {
        if inverse {
            self.predecessors(id).map(|source| (source, id)).collect()
        } else {
            self.successors(id).map(|target| (id, target)).collect()
        }
    }

    /// The walk through `nodes`, edge by edge.
    ///
    /// # Errors
    /// [`MechError::UnknownNode`] or [`MechError::MissingEdge`] if the
    /// sequence is not a walk of this space.
    pub fn get_path(&self, nodes: &[NodeId]) -> Result<Path> {
        if let Some(&missing) = nodes.iter().find(|id| !self.contains_node(**id)) {
            return Err(MechError::UnknownNode(missing));
        }
        let edges = nodes
            .windows(2)
            .map(|pair| {
                self.edge(pair[0], pair[1])
                    .cloned()
                    .ok_or(MechError::MissingEdge(pair[0], pair[1]))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Path::new(edges))
    }

    /// Induced subgraph on `keep` sharing this space's derivation cache.
    ///
    /// The initial and target nodes are always retained. Node identities and
    /// expansion marks carry over for the retained nodes.
    pub fn sub_space(&self, keep: &BTreeSet<NodeId>) -> StateSpace<E> {
        let retained: BTreeSet<NodeId> = keep
            .iter()
            .copied()
            .filter(|id| self.contains_node(*id))
            .chain([self.initial.id, self.target.id])
            .collect();

        let nodes = self
            .nodes
            .iter()
            .filter(|(id, _)| retained.contains(id))
            .map(|(&id, entry)| {
                let mut entry = entry.clone();
                entry.successors.retain(|n| retained.contains(n));
                entry.predecessors.retain(|n| retained.contains(n));
                (id, entry)
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|((s, t), _)| retained.contains(s) && retained.contains(t))
            .map(|(key, edge)| (*key, edge.clone()))
            .collect();
        let state_to_node = self
            .state_to_node
            .iter()
            .filter(|(_, id)| retained.contains(id))
            .map(|(state, &id)| (state.clone(), id))
            .collect();

        StateSpace {
            expander: Rc::clone(&self.expander),
            nodes,
            edges,
            state_to_node,
            expanded: self.expanded.intersection(&retained).copied().collect(),
            inverse_expanded: self.inverse_expanded.intersection(&retained).copied().collect(),
            expansion_limit: self.expansion_limit,
            initial: self.initial.clone(),
            target: self.target.clone(),
            guard: self.guard.clone(),
            next_id: self.next_id,
        }
    }

    /// Merge `other` into this space.
    ///
    /// Nodes are deduplicated by state and edges remapped; transitions of
    /// edges present in both spaces are merged. Bridge edges without
    /// transitions connect this initial node to `other`'s initial node and
    /// `other`'s target node to this target node (skipped when they would be
    /// self loops). Expansion marks of `other` are not carried over.
    ///
    /// # Errors
    /// [`MechError::ForeignExpander`] if `other` uses a different derivation
    /// cache.
    pub fn append_state_space(&mut self, other: &StateSpace<E>) -> Result<()> {
        if !Rc::ptr_eq(&self.expander, &other.expander) {
            return Err(MechError::ForeignExpander);
        }

        let mut remap: HashMap<NodeId, StateSpaceNode> = HashMap::with_capacity(other.num_states());
        for node in other.nodes() {
            let mapped = self.add_state(node.state().clone());
            remap.insert(node.id(), mapped);
        }
        let lookup = |id: NodeId| remap.get(&id).cloned().ok_or(MechError::UnknownNode(id));

        for edge in other.edges() {
            let source = lookup(edge.source().id())?;
            let target = lookup(edge.target().id())?;
            self.add_transitions(&source, &target, edge.transitions().iter().cloned());
        }

        let initial = self.initial.clone();
        let target = self.target.clone();
        let other_initial = lookup(other.initial.id)?;
        let other_target = lookup(other.target.id)?;
        if initial != other_initial {
            self.add_transitions(&initial, &other_initial, std::iter::empty());
        }
        if other_target != target {
            self.add_transitions(&other_target, &target, std::iter::empty());
        }

        tracing::debug!(
            states = self.num_states(),
            edges = self.num_edges(),
            "appended state space"
        );
        Ok(())
    }
}

impl<E: RuleEngine> std::fmt::Display for StateSpace<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StateSpace(|V|={}, |E|={}, expanded=({}, {}))",
            self.num_states(),
            self.num_edges(),
            self.expanded.len(),
            self.inverse_expanded.len()
        )
    }
}

enum ExpansionMode {
    /// Serve stored edges by key.
    Cached(std::vec::IntoIter<(NodeId, NodeId)>),
    /// Fire fresh derivations of `node`.
    Fresh {
        node: StateSpaceNode,
        events: btree_set::IntoIter<Event>,
        yielded: BTreeSet<(NodeId, NodeId)>,
    },
    /// Stored incident edges the derivations did not reach (bridges and
    /// merged-in edges); the node is marked expanded once these run out.
    Remaining {
        id: NodeId,
        keys: std::vec::IntoIter<(NodeId, NodeId)>,
    },
    Failed(Option<MechError>),
    Done,
}

/// Lazy iterator returned by [`StateSpace::expand`].
///
/// Dropping it before exhaustion leaves the node unexpanded, so a later
/// call recomputes (from the derivation cache) and finishes the job.
pub struct Expansion<'a, E: RuleEngine> {
    space: &'a mut StateSpace<E>,
    inverse: bool,
    mode: ExpansionMode,
}

impl<'a, E: RuleEngine> Iterator for Expansion<'a, E> {
    type Item = Result<StateSpaceEdge>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.mode {
                ExpansionMode::Done => return None,
                ExpansionMode::Failed(err) => {
                    let err = err.take();
                    self.mode = ExpansionMode::Done;
                    return err.map(Err);
                }
                ExpansionMode::Cached(keys) => {
                    let key = keys.next()?;
                    if let Some(edge) = self.space.edges.get(&key) {
                        return Some(Ok(edge.clone()));
                    }
                }
                ExpansionMode::Remaining { id, keys } => {
                    let Some(key) = keys.next() else {
                        let id = *id;
                        self.space.mark_expanded(id, self.inverse);
                        self.mode = ExpansionMode::Done;
                        return None;
                    };
                    if let Some(edge) = self.space.edges.get(&key) {
                        return Some(Ok(edge.clone()));
                    }
                }
                ExpansionMode::Fresh { node, events, yielded } => {
                    let Some(event) = events.next() else {
                        let id = node.id();
                        let keys: Vec<(NodeId, NodeId)> = self
                            .space
                            .incident_keys(id, self.inverse)
                            .into_iter()
                            .filter(|key| !yielded.contains(key))
                            .collect();
                        self.mode = ExpansionMode::Remaining {
                            id,
                            keys: keys.into_iter(),
                        };
                        continue;
                    };

                    let guard = self.space.guard.clone();
                    match node.state().fire_guarded(&event, self.inverse, guard.as_deref()) {
                        Err(err) => {
                            self.mode = ExpansionMode::Done;
                            return Some(Err(err));
                        }
                        Ok(None) => continue,
                        Ok(Some(state)) => {
                            let node = node.clone();
                            let other = self.space.add_state(state);
                            let (source, target) = if self.inverse {
                                (other, node)
                            } else {
                                (node, other)
                            };
                            let edge = self.space.add_transitions(&source, &target, [event]);
                            yielded.insert(edge.key());
                            return Some(Ok(edge.clone()));
                        }
                    }
                }
            }
        }
    }
}
