//! Edge weights.
//!
//! A weight maps the cost accumulated so far and the next edge to the cost
//! after taking that edge. Shortest-path searches require the result never to
//! be smaller than the accumulated cost.
//!
//! Bridge edges (no transitions, inserted when merging spaces) are free under
//! every weight defined here.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::chem::{Species, SpeciesId, State};
use crate::space::StateSpaceEdge;

/// Cost of extending a walk by one edge.
pub trait EdgeWeight {
    fn weight(&self, accumulated: f64, edge: &StateSpaceEdge) -> f64;
}

impl<F> EdgeWeight for F
where
    F: Fn(f64, &StateSpaceEdge) -> f64,
{
    fn weight(&self, accumulated: f64, edge: &StateSpaceEdge) -> f64 {
        self(accumulated, edge)
    }
}

/// Fixed increment per edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantWeight {
    pub increment: f64,
}

impl ConstantWeight {
    pub fn new(increment: f64) -> Self {
        Self { increment }
    }
}

impl Default for ConstantWeight {
    fn default() -> Self {
        Self { increment: 1.0 }
    }
}

impl EdgeWeight for ConstantWeight {
    fn weight(&self, accumulated: f64, edge: &StateSpaceEdge) -> f64 {
        if edge.is_bridge() {
            accumulated
        } else {
            accumulated + self.increment
        }
    }
}

/// Energy estimate for a single species.
pub trait EnergyModel {
    fn energy(&self, species: &Species) -> f64;
}

/// Energies looked up in a table, with a fallback for unknown species.
#[derive(Clone, Debug, Default)]
pub struct TableEnergy {
    energies: HashMap<SpeciesId, f64>,
    fallback: f64,
}

impl TableEnergy {
    pub fn new(energies: HashMap<SpeciesId, f64>, fallback: f64) -> Self {
        Self { energies, fallback }
    }
}

impl EnergyModel for TableEnergy {
    fn energy(&self, species: &Species) -> f64 {
        self.energies.get(&species.id()).copied().unwrap_or(self.fallback)
    }
}

/// Sum of species energies over a state, memoized per species.
struct StateEnergy<M> {
    model: M,
    cache: RefCell<HashMap<SpeciesId, f64>>,
}

impl<M: EnergyModel> StateEnergy<M> {
    fn new(model: M) -> Self {
        Self {
            model,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn of(&self, state: &State) -> f64 {
        let mut cache = self.cache.borrow_mut();
        state
            .multiset()
            .iter()
            .map(|(species, count)| {
                let energy = *cache
                    .entry(species.id())
                    .or_insert_with(|| self.model.energy(species));
                energy * f64::from(count)
            })
            .sum()
    }
}

/// `accumulated + E(target) - E(source)`.
///
/// Can decrease along a walk; use it for sampling with `dfs` or on
/// landscapes known to be uphill.
pub struct EnergyDifference<M> {
    energy: StateEnergy<M>,
}

impl<M: EnergyModel> EnergyDifference<M> {
    pub fn new(model: M) -> Self {
        Self {
            energy: StateEnergy::new(model),
        }
    }
}

impl<M: EnergyModel> EdgeWeight for EnergyDifference<M> {
    fn weight(&self, accumulated: f64, edge: &StateSpaceEdge) -> f64 {
        if edge.is_bridge() {
            return accumulated;
        }
        accumulated + self.energy.of(edge.target().state()) - self.energy.of(edge.source().state())
    }
}

/// Highest state energy seen so far: `max(accumulated, E(target))`.
pub struct EnergyBarrier<M> {
    energy: StateEnergy<M>,
}

impl<M: EnergyModel> EnergyBarrier<M> {
    pub fn new(model: M) -> Self {
        Self {
            energy: StateEnergy::new(model),
        }
    }
}

impl<M: EnergyModel> EdgeWeight for EnergyBarrier<M> {
    fn weight(&self, accumulated: f64, edge: &StateSpaceEdge) -> f64 {
        if edge.is_bridge() {
            return accumulated;
        }
        accumulated.max(self.energy.of(edge.target().state()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::chem::StateMultiset;
    use crate::space::StateSpaceNode;

    fn edge(source: &[(&Species, u32)], target: &[(&Species, u32)], bridge: bool) -> StateSpaceEdge {
        let state = |counts: &[(&Species, u32)]| {
            State::new(StateMultiset::from_counts(
                counts.iter().map(|(s, c)| ((*s).clone(), *c)),
            ))
        };
        let transitions = if bridge {
            BTreeSet::new()
        } else {
            BTreeSet::from([crate::engine::Event::new(
                0,
                StateMultiset::new(),
                StateMultiset::new(),
                vec![0],
            )])
        };
        StateSpaceEdge::new(
            StateSpaceNode::new(0, state(source)),
            StateSpaceNode::new(1, state(target)),
            transitions,
        )
    }

    fn model() -> (Species, Species, TableEnergy) {
        let a = Species::new(1, "A", 1);
        let b = Species::new(2, "B", 1);
        let table = TableEnergy::new(HashMap::from([(1, 2.0), (2, 5.0)]), 0.0);
        (a, b, table)
    }

    #[test]
    fn test_constant_weight() {
        let (a, b, _) = model();
        let w = ConstantWeight::default();
        assert_eq!(w.weight(3.0, &edge(&[(&a, 1)], &[(&b, 1)], false)), 4.0);
        assert_eq!(w.weight(3.0, &edge(&[(&a, 1)], &[(&b, 1)], true)), 3.0);
    }

    #[test]
    fn test_energy_difference() {
        let (a, b, table) = model();
        let w = EnergyDifference::new(table);
        // 2 * 2.0 -> 5.0
        assert_eq!(w.weight(1.0, &edge(&[(&a, 2)], &[(&b, 1)], false)), 2.0);
        assert_eq!(w.weight(1.0, &edge(&[(&b, 1)], &[(&a, 1)], false)), -2.0);
    }

    #[test]
    fn test_energy_barrier() {
        let (a, b, table) = model();
        let w = EnergyBarrier::new(table);
        assert_eq!(w.weight(0.0, &edge(&[(&a, 1)], &[(&b, 1)], false)), 5.0);
        assert_eq!(w.weight(7.0, &edge(&[(&a, 1)], &[(&b, 1)], false)), 7.0);
        assert_eq!(w.weight(1.0, &edge(&[(&a, 1)], &[(&b, 1)], true)), 1.0);
    }

    #[test]
    fn test_closure_weight() {
        let (a, b, _) = model();
        let doubled = |accumulated: f64, _: &StateSpaceEdge| accumulated * 2.0 + 1.0;
        assert_eq!(doubled.weight(2.0, &edge(&[(&a, 1)], &[(&b, 1)], false)), 5.0);
    }
}
