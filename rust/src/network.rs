//! Table-driven reaction network.
//!
//! A small [`RuleEngine`] whose rules are explicit reactions between named
//! species. It is the engine behind the command-line tool and the Python
//! bindings, and doubles as the reference for how an engine must behave:
//! stable event identities, inverse rules that reuse isomorphic forward
//! rules, and inverse events re-expressed through their forward rule.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::chem::{Species, SpeciesId, SpeciesResolver, State, StateMultiset};
use crate::engine::{Event, EventId, Rule, RuleEngine, RuleId};
use crate::error::{EngineError, MechError, Result};
use crate::space::resolve_state;

fn default_vertices() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDocument {
    pub name: String,
    /// Number of atoms.
    #[serde(default = "default_vertices")]
    pub vertices: u32,
    /// Free energy estimate used by the energy heuristics.
    #[serde(default)]
    pub energy: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactionDocument {
    pub name: String,
    pub left: BTreeMap<String, u32>,
    pub right: BTreeMap<String, u32>,
    /// Atom index pairs between which the reaction forms a bond.
    #[serde(default)]
    pub formed_bonds: Vec<(usize, usize)>,
}

/// On-disk description of a reaction network and one query on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkDocument {
    pub species: Vec<SpeciesDocument>,
    /// alias -> canonical species name
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    pub rules: Vec<ReactionDocument>,
    #[serde(default)]
    pub initial: BTreeMap<String, u32>,
    #[serde(default)]
    pub target: BTreeMap<String, u32>,
    /// Candidate catalysts for the catalyst planner.
    #[serde(default)]
    pub catalysts: Vec<String>,
    /// Bonds between global atom indices, for the displacement guard.
    #[serde(default)]
    pub atom_bonds: Vec<(usize, usize)>,
}

#[derive(Clone, Debug)]
struct Reaction {
    rule: Rule,
    left: StateMultiset,
    right: StateMultiset,
    formed_bonds: Vec<(usize, usize)>,
    /// False for rules created by [`RuleEngine::invert_rule`].
    forward: bool,
}

/// Reaction network answering derivation queries by exact left-hand-side
/// matching.
#[derive(Clone, Debug, Default)]
pub struct ReactionNetwork {
    species: Vec<Species>,
    resolver: SpeciesResolver,
    energies: HashMap<SpeciesId, f64>,
    /// Indexed by rule id.
    reactions: Vec<Reaction>,
    /// Indexed by event id.
    events: Vec<Event>,
    event_index: HashMap<(StateMultiset, StateMultiset, RuleId), EventId>,
    initial: StateMultiset,
    target: StateMultiset,
    catalysts: Vec<Species>,
    atom_bonds: Vec<(usize, usize)>,
}

impl ReactionNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a [`NetworkDocument`] from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let document: NetworkDocument = serde_json::from_str(text)?;
        Self::from_document(&document)
    }

    pub fn from_document(document: &NetworkDocument) -> Result<Self> {
        let mut network = Self::new();
        for entry in &document.species {
            if network.resolver.resolve(&entry.name).is_some() {
                return Err(MechError::Network(format!(
                    "species `{}` is declared twice",
                    entry.name
                )));
            }
            let species = network.add_species(&entry.name, entry.vertices);
            if let Some(energy) = entry.energy {
                network.set_energy(&species, energy);
            }
        }
        for (alias, canonical) in &document.aliases {
            if network.resolver.resolve(canonical).is_none() {
                return Err(MechError::Network(format!(
                    "alias `{alias}` refers to unknown species `{canonical}`"
                )));
            }
            network.add_alias(alias, canonical);
        }
        for reaction in &document.rules {
            let left = resolve_state(&reaction.left, &network.resolver)?;
            let right = resolve_state(&reaction.right, &network.resolver)?;
            network.add_reaction(
                &reaction.name,
                left.multiset().clone(),
                right.multiset().clone(),
                reaction.formed_bonds.clone(),
            )?;
        }
        network.initial = resolve_state(&document.initial, &network.resolver)?
            .multiset()
            .clone();
        network.target = resolve_state(&document.target, &network.resolver)?
            .multiset()
            .clone();
        network.catalysts = document
            .catalysts
            .iter()
            .map(|name| {
                network
                    .resolver
                    .resolve(name)
                    .ok_or_else(|| MechError::UnknownSpecies(name.clone()))
            })
            .collect::<Result<_>>()?;
        network.atom_bonds = document.atom_bonds.clone();

        tracing::info!(
            species = network.species.len(),
            rules = network.reactions.len(),
            "loaded reaction network"
        );
        Ok(network)
    }

    /// Register a species, or return the existing one with that name.
    pub fn add_species(&mut self, name: &str, vertices: u32) -> Species {
        if let Some(existing) = self.resolver.resolve(name) {
            return existing;
        }
        let species = Species::new(self.species.len() as SpeciesId, name, vertices);
        self.species.push(species.clone());
        self.resolver.insert(species.clone());
        species
    }

    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        self.resolver.add_alias(alias, canonical);
    }

    pub fn set_energy(&mut self, species: &Species, energy: f64) {
        self.energies.insert(species.id(), energy);
    }

    /// Add a forward reaction `left -> right`.
    ///
    /// # Errors
    /// [`MechError::Network`] if the left-hand side is empty.
    pub fn add_reaction(
        &mut self,
        name: &str,
        left: StateMultiset,
        right: StateMultiset,
        formed_bonds: Vec<(usize, usize)>,
    ) -> Result<RuleId> {
        if left.is_empty() {
            return Err(MechError::Network(format!(
                "reaction `{name}` has an empty left-hand side"
            )));
        }
        Ok(self.push_reaction(name.to_string(), left, right, formed_bonds, true))
    }

    fn push_reaction(
        &mut self,
        name: String,
        left: StateMultiset,
        right: StateMultiset,
        formed_bonds: Vec<(usize, usize)>,
        forward: bool,
    ) -> RuleId {
        let id = self.reactions.len() as RuleId;
        let rule = Rule::new(id, name, left.len());
        self.reactions.push(Reaction {
            rule,
            left,
            right,
            formed_bonds,
            forward,
        });
        id
    }

    fn reaction(&self, id: RuleId) -> Option<&Reaction> {
        self.reactions.get(id as usize)
    }

    /// Stable event for a `(sources, targets, rule)` triple.
    fn intern(
        &mut self,
        sources: &StateMultiset,
        targets: &StateMultiset,
        rule: RuleId,
        formed_bonds: &[(usize, usize)],
    ) -> Event {
        let key = (sources.clone(), targets.clone(), rule);
        if let Some(&id) = self.event_index.get(&key) {
            return self.events[id as usize].clone();
        }
        let id = self.events.len() as EventId;
        let event = Event::with_formed_bonds(
            id,
            sources.clone(),
            targets.clone(),
            vec![rule],
            formed_bonds.to_vec(),
        );
        self.events.push(event.clone());
        self.event_index.insert(key, id);
        event
    }

    pub fn species(&self, name: &str) -> Option<Species> {
        self.resolver.resolve(name)
    }

    pub fn all_species(&self) -> &[Species] {
        &self.species
    }

    pub fn resolver(&self) -> &SpeciesResolver {
        &self.resolver
    }

    /// Species id -> energy, for species with a known energy.
    pub fn energies(&self) -> &HashMap<SpeciesId, f64> {
        &self.energies
    }

    pub fn catalysts(&self) -> &[Species] {
        &self.catalysts
    }

    /// Total number of atoms over all declared species.
    pub fn atom_count(&self) -> usize {
        self.species.iter().map(|s| s.vertex_count() as usize).sum()
    }

    pub fn atom_bonds(&self) -> &[(usize, usize)] {
        &self.atom_bonds
    }

    pub fn initial_state(&self) -> State {
        State::new(self.initial.clone())
    }

    pub fn target_state(&self) -> State {
        State::new(self.target.clone())
    }

    pub fn set_query(&mut self, initial: StateMultiset, target: StateMultiset) {
        self.initial = initial;
        self.target = target;
    }

    /// Number of distinct events handed out so far.
    pub fn num_events(&self) -> usize {
        self.events.len()
    }
}

impl RuleEngine for ReactionNetwork {
    fn rules(&self) -> Vec<Rule> {
        self.reactions
            .iter()
            .filter(|reaction| reaction.forward)
            .map(|reaction| reaction.rule.clone())
            .collect()
    }

    fn invert_rule(&mut self, rule: &Rule) -> Rule {
        let Some(reaction) = self.reaction(rule.id()).cloned() else {
            return rule.clone();
        };
        if let Some(existing) = self
            .reactions
            .iter()
            .find(|other| other.left == reaction.right && other.right == reaction.left)
        {
            return existing.rule.clone();
        }
        let id = self.push_reaction(
            format!("inverse({})", reaction.rule.name()),
            reaction.right,
            reaction.left,
            Vec::new(),
            false,
        );
        self.reactions[id as usize].rule.clone()
    }

    fn is_isomorphic(&self, a: &Rule, b: &Rule) -> bool {
        match (self.reaction(a.id()), self.reaction(b.id())) {
            (Some(a), Some(b)) => a.left == b.left && a.right == b.right,
            _ => false,
        }
    }

    fn admits(&self, rule: &Rule, species: &Species) -> bool {
        self.reaction(rule.id())
            .map_or(false, |reaction| reaction.left.contains(species))
    }

    fn fits(&self, rule: &Rule, state: &StateMultiset) -> bool {
        self.reaction(rule.id())
            .map_or(false, |reaction| reaction.left.is_sub_multiset_of(state))
    }

    fn apply(&mut self, rule: &Rule, inputs: &[Species]) -> std::result::Result<Vec<Event>, EngineError> {
        let reaction = self
            .reaction(rule.id())
            .cloned()
            .ok_or(EngineError::UnknownRule(rule.id()))?;
        let inputs = StateMultiset::from_species(inputs.iter().cloned());
        if inputs != reaction.left {
            return Ok(Vec::new());
        }
        Ok(vec![self.intern(
            &reaction.left,
            &reaction.right,
            rule.id(),
            &reaction.formed_bonds,
        )])
    }

    fn invert_event(&mut self, event: &Event, rule: &Rule) -> std::result::Result<Event, EngineError> {
        let reaction = self
            .reaction(rule.id())
            .cloned()
            .ok_or(EngineError::UnknownRule(rule.id()))?;
        if event.targets() != &reaction.left || event.sources() != &reaction.right {
            return Err(EngineError::MalformedInput {
                rule: rule.id(),
                reason: format!("event {} is not an inverse of this rule", event.id()),
            });
        }
        Ok(self.intern(
            event.targets(),
            event.sources(),
            rule.id(),
            &reaction.formed_bonds,
        ))
    }

    fn lookup_event(&self, id: EventId) -> Option<Event> {
        self.events.get(id as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORK: &str = r#"{
        "species": [
            {"name": "A", "vertices": 2, "energy": 1.0},
            {"name": "B", "vertices": 1},
            {"name": "C", "vertices": 3, "energy": -2.5}
        ],
        "aliases": {"alpha": "A"},
        "rules": [
            {"name": "join", "left": {"A": 1, "B": 1}, "right": {"C": 1}, "formed_bonds": [[0, 2]]},
            {"name": "split", "left": {"C": 1}, "right": {"A": 1, "B": 1}}
        ],
        "initial": {"alpha": 1, "B": 1},
        "target": {"C": 1},
        "catalysts": ["B"]
    }"#;

    #[test]
    fn test_load_document() {
        let network = ReactionNetwork::from_json_str(NETWORK).unwrap();
        assert_eq!(network.all_species().len(), 3);
        assert_eq!(network.rules().len(), 2);
        assert_eq!(network.initial_state().multiset().len(), 2);
        assert_eq!(network.catalysts().len(), 1);
        let c = network.species("C").unwrap();
        assert_eq!(network.energies().get(&c.id()), Some(&-2.5));
        assert_eq!(network.species("alpha"), network.species("A"));
    }

    #[test]
    fn test_invalid_documents() {
        let unknown = NETWORK.replace(r#""target": {"C": 1}"#, r#""target": {"D": 1}"#);
        assert!(matches!(
            ReactionNetwork::from_json_str(&unknown),
            Err(MechError::UnknownSpecies(name)) if name == "D"
        ));
        let bad_alias = NETWORK.replace(r#"{"alpha": "A"}"#, r#"{"alpha": "Z"}"#);
        assert!(matches!(
            ReactionNetwork::from_json_str(&bad_alias),
            Err(MechError::Network(_))
        ));
        assert!(matches!(
            ReactionNetwork::from_json_str("{"),
            Err(MechError::Json(_))
        ));
    }

    #[test]
    fn test_inverse_rule_reuses_isomorphic_rule() {
        let mut network = ReactionNetwork::from_json_str(NETWORK).unwrap();
        let rules = network.rules();
        let inverse = network.invert_rule(&rules[0]);
        assert_eq!(inverse.id(), rules[1].id());
        assert!(network.is_isomorphic(&inverse, &rules[1]));
        assert_eq!(network.rules().len(), 2);
    }

    #[test]
    fn test_apply_interns_events() {
        let mut network = ReactionNetwork::from_json_str(NETWORK).unwrap();
        let join = network.rules()[0].clone();
        let a = network.species("A").unwrap();
        let b = network.species("B").unwrap();

        let first = network.apply(&join, &[a.clone(), b.clone()]).unwrap();
        let second = network.apply(&join, &[b.clone(), a.clone()]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].formed_bonds(), &[(0, 2)]);
        assert!(network.apply(&join, &[a]).unwrap().is_empty());
        assert_eq!(network.lookup_event(first[0].id()), Some(first[0].clone()));
    }

    #[test]
    fn test_invert_event_matches_forward_event() {
        let mut network = ReactionNetwork::new();
        let a = network.add_species("A", 1);
        let b = network.add_species("B", 1);
        let forward = network
            .add_reaction(
                "convert",
                StateMultiset::from_species([a.clone()]),
                StateMultiset::from_species([b.clone()]),
                Vec::new(),
            )
            .unwrap();
        let rule = network.rules()[forward as usize].clone();
        let inverse = network.invert_rule(&rule);
        assert_ne!(inverse.id(), rule.id());

        let backward = network.apply(&inverse, &[b.clone()]).unwrap();
        let restored = network.invert_event(&backward[0], &rule).unwrap();
        let direct = network.apply(&rule, &[a]).unwrap();
        assert_eq!(restored, direct[0]);

        assert!(matches!(
            network.invert_event(&direct[0], &rule),
            Err(EngineError::MalformedInput { .. })
        ));
    }
}
