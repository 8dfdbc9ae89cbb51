//! Catalyst planner.
//!
//! Many mechanisms only exist with a helper species present on both sides of
//! the overall reaction (an amino acid side chain, a cofactor). The planner
//! adds combinations of candidate catalysts to the query, explores and prunes
//! each augmented query, and merges every productive sub-space into one space
//! whose initial and target states are the catalyst-free ones. Bridge edges
//! without transitions link the plain states to the augmented ones.

use std::rc::Rc;

use itertools::Itertools;

use crate::chem::{Species, State, StateMultiset, TransitionGuard};
use crate::config::ExplorationConfig;
use crate::engine::RuleEngine;
use crate::error::Result;
use crate::explore::bidirectional_bfs;
use crate::pruning::prune;
use crate::space::{SharedExpander, StateSpace};

/// Merged result of a catalyst search.
pub struct CatalystPlan<E: RuleEngine> {
    /// Union of the pruned sub-spaces, rooted at the catalyst-free query.
    pub space: StateSpace<E>,
    /// Catalyst combinations that admitted at least one mechanism.
    pub productive: Vec<Vec<Species>>,
    /// Number of combinations explored.
    pub explored: usize,
}

/// Explore the query once per combination of `1..=max_catalysts` catalysts.
///
/// # Arguments
/// * `expander` - Derivation cache shared by every explored space
/// * `initial`, `target` - Catalyst-free query
/// * `catalysts` - Candidate helper species
/// * `max_catalysts` - Largest combination tried
/// * `config` - BFS radius and expansion budget applied to each combination
/// * `guard` - Optional transition veto installed on every space
///
/// # Errors
/// Propagates fatal expansion errors; combinations without a mechanism are
/// skipped.
pub fn plan_with_catalysts<E: RuleEngine>(
    expander: &SharedExpander<E>,
    initial: &State,
    target: &State,
    catalysts: &[Species],
    max_catalysts: usize,
    config: &ExplorationConfig,
    guard: Option<Rc<dyn TransitionGuard>>,
) -> Result<CatalystPlan<E>> {
    let mut merged = StateSpace::new(Rc::clone(expander), initial.clone(), target.clone());
    if let Some(guard) = &guard {
        merged.set_transition_guard(Rc::clone(guard));
    }
    let mut productive = Vec::new();
    let mut explored = 0;

    for size in 1..=max_catalysts.min(catalysts.len()) {
        for chosen in catalysts.iter().cloned().combinations(size) {
            explored += 1;
            let extra = StateMultiset::from_species(chosen.iter().cloned());
            let mut space = StateSpace::new(
                Rc::clone(expander),
                State::new(initial.multiset().plus(&extra)),
                State::new(target.multiset().plus(&extra)),
            );
            if let Some(guard) = &guard {
                space.set_transition_guard(Rc::clone(guard));
            }
            space.set_expansion_limit(config.expansion_limit);

            let names = chosen.iter().map(Species::name).join(", ");
            tracing::info!(catalysts = %names, "exploring with catalysts");
            bidirectional_bfs(&mut space, config.max_length)?;

            let pruned = prune(&space);
            if pruned.connected {
                merged.append_state_space(&pruned.space)?;
                productive.push(chosen);
            } else {
                tracing::info!(catalysts = %names, "no mechanism with these catalysts");
            }
        }
    }

    tracing::info!(
        explored,
        productive = productive.len(),
        merged = %merged,
        "catalyst planning finished"
    );
    Ok(CatalystPlan {
        space: merged,
        productive,
        explored,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::explore::{shortest_path, ConstantWeight, SearchAlgorithm};
    use crate::space::DerivationExpander;
    use crate::test_support::{single, MockEngine};

    /// `A + E -> AE -> B + E`: the catalyst `E` is needed, `F` is useless.
    fn catalysed() -> (SharedExpander<MockEngine>, Vec<Species>) {
        let mut engine = MockEngine::new();
        let species: Vec<Species> = ["A", "B", "E", "AE", "F"]
            .iter()
            .map(|name| engine.species(name))
            .collect();
        let [a, b, e, ae, _] = [0, 1, 2, 3, 4].map(|i| &species[i]);
        engine.reaction("bind", &[a, e], &[ae]);
        engine.reaction("release", &[ae], &[b, e]);
        let expander = Rc::new(RefCell::new(DerivationExpander::new(engine)));
        (expander, species)
    }

    #[test]
    fn test_single_catalyst() {
        let (expander, species) = catalysed();
        let catalysts = vec![species[2].clone(), species[4].clone()];
        let plan = plan_with_catalysts(
            &expander,
            &single(&species[0]),
            &single(&species[1]),
            &catalysts,
            1,
            &ExplorationConfig::default(),
            None,
        )
        .unwrap();

        assert_eq!(plan.explored, 2);
        assert_eq!(plan.productive, vec![vec![species[2].clone()]]);

        // {A} => {A, E} -> {AE} -> {B, E} => {B}
        let mut space = plan.space;
        space.freeze();
        let (cost, path) = shortest_path(&mut space, &ConstantWeight::default(), SearchAlgorithm::Dijkstra)
            .unwrap()
            .unwrap();
        assert_eq!(cost, 2.0);
        assert_eq!(path.len(), 4);
        assert!(path.edges()[0].is_bridge());
        assert!(path.edges()[3].is_bridge());
    }

    #[test]
    fn test_merged_space_is_searchable_before_freezing() {
        let (expander, species) = catalysed();
        let plan = plan_with_catalysts(
            &expander,
            &single(&species[0]),
            &single(&species[1]),
            &[species[2].clone()],
            1,
            &ExplorationConfig::default(),
            None,
        )
        .unwrap();

        let mut space = plan.space;
        assert!(!space.is_frozen());
        let initial = space.initial_node().clone();
        let first = space.expand_all(&initial, false).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].is_bridge());
        let second = space.expand_all(&initial, false).unwrap();
        assert_eq!(first, second);

        let (cost, path) = shortest_path(&mut space, &ConstantWeight::default(), SearchAlgorithm::Dijkstra)
            .unwrap()
            .unwrap();
        assert_eq!(cost, 2.0);
        assert_eq!(path.len(), 4);
        assert!(path.edges()[3].is_bridge());
    }

    #[test]
    fn test_pairs_include_productive_superset() {
        let (expander, species) = catalysed();
        let catalysts = vec![species[2].clone(), species[4].clone()];
        let plan = plan_with_catalysts(
            &expander,
            &single(&species[0]),
            &single(&species[1]),
            &catalysts,
            2,
            &ExplorationConfig::default(),
            None,
        )
        .unwrap();
        assert_eq!(plan.explored, 3);
        assert_eq!(plan.productive.len(), 2);
    }

    #[test]
    fn test_no_catalysts() {
        let (expander, species) = catalysed();
        let plan = plan_with_catalysts(
            &expander,
            &single(&species[0]),
            &single(&species[1]),
            &[],
            3,
            &ExplorationConfig::default(),
            None,
        )
        .unwrap();
        assert_eq!(plan.explored, 0);
        assert!(plan.productive.is_empty());
        assert_eq!(plan.space.num_edges(), 0);
    }
}
