//! Global reaction states and transition guards.

use std::sync::Arc;

use super::multiset::StateMultiset;
use crate::engine::Event;
use crate::error::Result;

/// A global reaction snapshot: an immutable multiset of species.
///
/// Cloning is cheap; equality and hashing delegate to the multiset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct State {
    multiset: Arc<StateMultiset>,
}

impl State {
    pub fn new(multiset: StateMultiset) -> Self {
        Self {
            multiset: Arc::new(multiset),
        }
    }

    pub fn multiset(&self) -> &StateMultiset {
        &self.multiset
    }

    pub fn is_empty(&self) -> bool {
        self.multiset.is_empty()
    }

    /// Apply `event` to this state.
    ///
    /// Forward firing consumes the event sources and produces its targets;
    /// inverse firing does the opposite.
    ///
    /// # Errors
    /// [`MechError::NegativeMultiplicity`](crate::error::MechError) if the
    /// consumed side is not contained in this state.
    pub fn fire(&self, event: &Event, inverse: bool) -> Result<State> {
        let remaining = self.multiset.try_minus(event.consumed(inverse))?;
        Ok(State::new(remaining.plus(event.produced(inverse))))
    }

    /// Like [`fire`](Self::fire), but returns `Ok(None)` when `guard` rejects
    /// the transition.
    pub fn fire_guarded(
        &self,
        event: &Event,
        inverse: bool,
        guard: Option<&dyn TransitionGuard>,
    ) -> Result<Option<State>> {
        if let Some(guard) = guard {
            if !guard.permits(self, event, inverse) {
                return Ok(None);
            }
        }
        self.fire(event, inverse).map(Some)
    }
}

impl From<StateMultiset> for State {
    fn from(multiset: StateMultiset) -> Self {
        Self::new(multiset)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.multiset)
    }
}

/// Optional veto on transitions, checked before a state fires an event.
pub trait TransitionGuard {
    fn permits(&self, source: &State, event: &Event, inverse: bool) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::Species;
    use crate::error::MechError;

    struct RejectAll;

    impl TransitionGuard for RejectAll {
        fn permits(&self, _: &State, _: &Event, _: bool) -> bool {
            false
        }
    }

    fn setup() -> (Species, Species, Species, Event) {
        let a = Species::new(1, "A", 1);
        let b = Species::new(2, "B", 1);
        let c = Species::new(3, "C", 2);
        // A + B -> C
        let event = Event::new(
            1,
            StateMultiset::from_species([a.clone(), b.clone()]),
            StateMultiset::from_species([c.clone()]),
            vec![0],
        );
        (a, b, c, event)
    }

    #[test]
    fn test_fire_forward_and_inverse() {
        let (a, b, c, event) = setup();
        let start = State::new(StateMultiset::from_counts([(a.clone(), 2), (b, 1)]));

        let next = start.fire(&event, false).unwrap();
        assert_eq!(next.multiset().count(&a), 1);
        assert_eq!(next.multiset().count(&c), 1);

        let back = next.fire(&event, true).unwrap();
        assert_eq!(back, start);
    }

    #[test]
    fn test_fire_missing_species() {
        let (a, _, _, event) = setup();
        let start = State::new(StateMultiset::from_species([a]));
        assert!(matches!(
            start.fire(&event, false),
            Err(MechError::NegativeMultiplicity { .. })
        ));
    }

    #[test]
    fn test_guard_rejects() {
        let (a, b, _, event) = setup();
        let start = State::new(StateMultiset::from_species([a, b]));
        let result = start.fire_guarded(&event, false, Some(&RejectAll)).unwrap();
        assert!(result.is_none());
        assert!(start.fire_guarded(&event, false, None).unwrap().is_some());
    }
}
