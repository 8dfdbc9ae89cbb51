//! Shared fixtures for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::chem::{Species, SpeciesResolver, State, StateMultiset};
use crate::engine::{Event, EventId, Rule, RuleEngine, RuleId};
use crate::error::EngineError;
use crate::network::ReactionNetwork;
use crate::space::{StateSpace, StateSpaceEdge};

/// Reaction network that counts `apply` calls and can be told to fail.
#[derive(Debug, Default)]
pub struct MockEngine {
    network: ReactionNetwork,
    failing: HashSet<RuleId>,
    apply_calls: usize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn species(&mut self, name: &str) -> Species {
        self.network.add_species(name, 1)
    }

    pub fn reaction(&mut self, name: &str, left: &[&Species], right: &[&Species]) -> RuleId {
        let left = StateMultiset::from_species(left.iter().map(|s| (*s).clone()));
        let right = StateMultiset::from_species(right.iter().map(|s| (*s).clone()));
        self.network
            .add_reaction(name, left, right, Vec::new())
            .expect("non-empty left-hand side")
    }

    pub fn failing_reaction(&mut self, name: &str, left: &[&Species], right: &[&Species]) -> RuleId {
        let id = self.reaction(name, left, right);
        self.failing.insert(id);
        id
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls
    }
}

impl RuleEngine for MockEngine {
    fn rules(&self) -> Vec<Rule> {
        self.network.rules()
    }

    fn invert_rule(&mut self, rule: &Rule) -> Rule {
        self.network.invert_rule(rule)
    }

    fn is_isomorphic(&self, a: &Rule, b: &Rule) -> bool {
        self.network.is_isomorphic(a, b)
    }

    fn admits(&self, rule: &Rule, species: &Species) -> bool {
        self.network.admits(rule, species)
    }

    fn apply(&mut self, rule: &Rule, inputs: &[Species]) -> Result<Vec<Event>, EngineError> {
        self.apply_calls += 1;
        if self.failing.contains(&rule.id()) {
            return Err(EngineError::MalformedRule {
                rule: rule.id(),
                reason: "injected failure".to_string(),
            });
        }
        self.network.apply(rule, inputs)
    }

    fn invert_event(&mut self, event: &Event, rule: &Rule) -> Result<Event, EngineError> {
        self.network.invert_event(event, rule)
    }

    fn lookup_event(&self, id: EventId) -> Option<Event> {
        self.network.lookup_event(id)
    }
}

pub fn single(species: &Species) -> State {
    State::new(StateMultiset::from_species([species.clone()]))
}

/// Species `A`, `B`, `C` with reactions `A -> B` and `B -> C`; the space
/// runs from `{A}` (node 0) to `{C}` (node 1) and is not expanded yet.
pub fn chain_space() -> (StateSpace<MockEngine>, Vec<Species>) {
    let mut engine = MockEngine::new();
    let species: Vec<Species> = ["A", "B", "C"].iter().map(|n| engine.species(n)).collect();
    engine.reaction("a_to_b", &[&species[0]], &[&species[1]]);
    engine.reaction("b_to_c", &[&species[1]], &[&species[2]]);
    let space = StateSpace::from_engine(engine, single(&species[0]), single(&species[2]));
    (space, species)
}

/// One species `S<i>` per node and one reaction per directed edge, so the
/// state space is isomorphic to the given graph.
pub fn synthetic_space(
    nodes: usize,
    edges: &[(usize, usize)],
    initial: usize,
    target: usize,
) -> (StateSpace<MockEngine>, Vec<Species>) {
    let mut engine = MockEngine::new();
    let species: Vec<Species> = (0..nodes).map(|i| engine.species(&format!("S{i}"))).collect();
    for &(from, to) in edges {
        engine.reaction(&format!("r{from}_{to}"), &[&species[from]], &[&species[to]]);
    }
    let space = StateSpace::from_engine(engine, single(&species[initial]), single(&species[target]));
    (space, species)
}

/// Index of the single species of a synthetic node state.
pub fn synthetic_index(state: &State) -> usize {
    state
        .multiset()
        .iter()
        .next()
        .and_then(|(species, _)| species.name().strip_prefix('S'))
        .and_then(|digits| digits.parse().ok())
        .expect("synthetic state")
}

/// Weight function reading per-edge costs keyed by synthetic indices.
pub fn table_weight(costs: HashMap<(usize, usize), f64>) -> impl Fn(f64, &StateSpaceEdge) -> f64 {
    move |accumulated, edge| {
        let key = (
            synthetic_index(edge.source().state()),
            synthetic_index(edge.target().state()),
        );
        accumulated + costs.get(&key).copied().unwrap_or(1.0)
    }
}

/// Forward-expand everything reachable from the initial node.
pub fn expand_everything<E: RuleEngine>(space: &mut StateSpace<E>) {
    let mut queue = VecDeque::from([space.initial_node().clone()]);
    let mut seen = HashSet::from([space.initial_node().id()]);
    while let Some(node) = queue.pop_front() {
        for edge in space.expand_all(&node, false).expect("expansion") {
            if seen.insert(edge.target().id()) {
                queue.push_back(edge.target().clone());
            }
        }
    }
}

pub fn resolver_for(species: &[Species]) -> SpeciesResolver {
    SpeciesResolver::from_species(species.iter())
}
