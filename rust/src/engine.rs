//! Contract with the external rule-application engine.
//!
//! The engine owns species, rules and the derivation graph. It applies a rule
//! to a concrete list of input species and reports the resulting elementary
//! events; every event has a stable identity so repeated queries return
//! comparable results.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::chem::{Species, StateMultiset};
use crate::error::EngineError;

/// Engine-assigned rule identity.
pub type RuleId = u32;

/// Engine-assigned event (derivation hyperedge) identity.
pub type EventId = u64;

/// A transformation rule as seen by the derivation cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    id: RuleId,
    name: String,
    /// Number of connected components of the left-hand side; bounds how many
    /// input species a single application can consume.
    left_components: usize,
}

impl Rule {
    pub fn new(id: RuleId, name: impl Into<String>, left_components: usize) -> Self {
        Self {
            id,
            name: name.into(),
            left_components,
        }
    }

    #[inline]
    pub fn id(&self) -> RuleId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn left_components(&self) -> usize {
        self.left_components
    }
}

#[derive(Debug)]
struct EventData {
    id: EventId,
    sources: StateMultiset,
    targets: StateMultiset,
    rules: Vec<RuleId>,
    /// Pairs of global atom indices between which the event forms a bond.
    formed_bonds: Vec<(usize, usize)>,
}

/// One elementary transformation: `sources` → `targets` under `rules`.
///
/// Cheap to clone. Equality, hashing and ordering use the engine identity.
#[derive(Clone, Debug)]
pub struct Event(Arc<EventData>);

impl Event {
    pub fn new(
        id: EventId,
        sources: StateMultiset,
        targets: StateMultiset,
        rules: Vec<RuleId>,
    ) -> Self {
        Self::with_formed_bonds(id, sources, targets, rules, Vec::new())
    }

    pub fn with_formed_bonds(
        id: EventId,
        sources: StateMultiset,
        targets: StateMultiset,
        rules: Vec<RuleId>,
        formed_bonds: Vec<(usize, usize)>,
    ) -> Self {
        Self(Arc::new(EventData {
            id,
            sources,
            targets,
            rules,
            formed_bonds,
        }))
    }

    #[inline]
    pub fn id(&self) -> EventId {
        self.0.id
    }

    pub fn sources(&self) -> &StateMultiset {
        &self.0.sources
    }

    pub fn targets(&self) -> &StateMultiset {
        &self.0.targets
    }

    pub fn rules(&self) -> &[RuleId] {
        &self.0.rules
    }

    pub fn formed_bonds(&self) -> &[(usize, usize)] {
        &self.0.formed_bonds
    }

    /// The side consumed when firing in the given direction.
    pub fn consumed(&self, inverse: bool) -> &StateMultiset {
        if inverse {
            self.targets()
        } else {
            self.sources()
        }
    }

    /// The side produced when firing in the given direction.
    pub fn produced(&self, inverse: bool) -> &StateMultiset {
        if inverse {
            self.sources()
        } else {
            self.targets()
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}: {} -> {}", self.id(), self.sources(), self.targets())
    }
}

/// The external rule-application engine.
///
/// Implementations hold a single mutable derivation builder, so every
/// mutating call takes `&mut self`.
pub trait RuleEngine {
    /// All rules of the grammar.
    fn rules(&self) -> Vec<Rule>;

    /// The inverse of `rule` (left and right swapped).
    fn invert_rule(&mut self, rule: &Rule) -> Rule;

    /// Whether two rules are isomorphic.
    fn is_isomorphic(&self, a: &Rule, b: &Rule) -> bool;

    /// Whether some left-hand-side component of `rule` can match `species`.
    fn admits(&self, rule: &Rule, species: &Species) -> bool;

    /// Cheap pre-filter: can `rule` possibly apply somewhere inside `state`?
    fn fits(&self, rule: &Rule, state: &StateMultiset) -> bool {
        state.iter().any(|(species, _)| self.admits(rule, species))
    }

    /// Apply `rule` to exactly the given input species.
    fn apply(&mut self, rule: &Rule, inputs: &[Species]) -> Result<Vec<Event>, EngineError>;

    /// Re-synthesize `event` (found with an inverse rule) as a derivation of
    /// the forward rule `rule` with source and target swapped.
    fn invert_event(&mut self, event: &Event, rule: &Rule) -> Result<Event, EngineError>;

    /// Look up an event of the derivation graph by identity.
    fn lookup_event(&self, id: EventId) -> Option<Event>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_sides() {
        let a = Species::new(1, "A", 1);
        let b = Species::new(2, "B", 1);
        let event = Event::new(
            9,
            StateMultiset::from_species([a.clone()]),
            StateMultiset::from_species([b.clone()]),
            vec![0],
        );
        assert!(event.consumed(false).contains(&a));
        assert!(event.produced(false).contains(&b));
        assert!(event.consumed(true).contains(&b));
        assert!(event.produced(true).contains(&a));
    }

    #[test]
    fn test_event_identity() {
        let empty = StateMultiset::new;
        let e1 = Event::new(3, empty(), empty(), vec![1]);
        let e2 = Event::new(3, empty(), empty(), vec![2]);
        assert_eq!(e1, e2);
    }
}
