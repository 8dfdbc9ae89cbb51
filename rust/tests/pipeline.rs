use std::cell::RefCell;
use std::rc::Rc;

use mechsearch::explore::ConstantWeight;
use mechsearch::{
    bidirectional_bfs, explore_network, prune, shortest_path, shortest_simple_paths, DerivationExpander,
    ExplorationConfig, MechError, ReactionNetwork, SearchAlgorithm, StateSpace,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const CHAIN: &str = r#"{
    "species": [{"name": "A"}, {"name": "B"}, {"name": "C"}],
    "aliases": {"start": "A"},
    "rules": [
        {"name": "a_to_b", "left": {"A": 1}, "right": {"B": 1}},
        {"name": "b_to_c", "left": {"B": 1}, "right": {"C": 1}}
    ],
    "initial": {"start": 1},
    "target": {"C": 1}
}"#;

fn chain() -> ReactionNetwork {
    ReactionNetwork::from_json_str(CHAIN).unwrap()
}

fn chain_space(network: ReactionNetwork) -> StateSpace<ReactionNetwork> {
    let initial = network.initial_state();
    let target = network.target_state();
    StateSpace::from_engine(network, initial, target)
}

#[test]
fn test_chain_end_to_end() {
    let config = ExplorationConfig {
        num_paths: 3,
        ..ExplorationConfig::default()
    };
    let result = explore_network(chain(), &config).unwrap();
    assert!(result.connected);
    assert_eq!(result.mechanisms.len(), 1);

    let best = &result.mechanisms[0];
    assert_eq!(best.cost, 2.0);
    assert_eq!(best.path.len(), 2);
    assert_eq!(best.to_json()["states"], json!(["{A}", "{B}", "{C}"]));
    assert_eq!(result.space.num_states(), 3);
    assert_eq!(result.space.num_edges(), 2);
}

#[test]
fn test_three_requested_one_delivered() {
    let mut space = chain_space(chain());
    bidirectional_bfs(&mut space, 2).unwrap();
    space.freeze();

    let weight = ConstantWeight::default();
    let mut paths = shortest_simple_paths(&mut space, &weight, SearchAlgorithm::Dijkstra, None);
    let (cost, path) = paths.next().unwrap().unwrap();
    assert_eq!(cost, 2.0);
    assert_eq!(path.len(), 2);
    assert!(paths.next().is_none());
    assert!(paths.next().is_none());
}

#[test]
fn test_persisted_space_answers_the_same_query() {
    let network = chain();
    let resolver = network.resolver().clone();
    let initial = network.initial_state();
    let target = network.target_state();
    let expander = Rc::new(RefCell::new(DerivationExpander::new(network)));

    let mut space = StateSpace::new(Rc::clone(&expander), initial.clone(), target.clone());
    bidirectional_bfs(&mut space, 4).unwrap();
    let pruned = prune(&space);
    assert!(pruned.connected);
    let saved = pruned.space.to_json().unwrap();

    let mut reloaded =
        StateSpace::from_json(saved.clone(), Rc::clone(&expander), &resolver, initial, target).unwrap();
    assert_eq!(reloaded.to_json().unwrap(), saved);

    reloaded.freeze();
    let (cost, path) = shortest_path(&mut reloaded, &ConstantWeight::default(), SearchAlgorithm::BidirectionalDijkstra)
        .unwrap()
        .unwrap();
    assert_eq!(cost, 2.0);
    assert_eq!(reloaded.path_from_json(&path.to_json()).unwrap(), path);
}

#[test]
fn test_reload_rejects_unknown_species() {
    let network = chain();
    let initial = network.initial_state();
    let target = network.target_state();
    let resolver = network.resolver().clone();
    let expander = Rc::new(RefCell::new(DerivationExpander::new(network)));

    let document = json!({
        "nodes": [{"id": 0, "state": {"Z": 1}}],
        "edges": [],
        "expanded": [],
        "inverse_expanded": []
    });
    let result = StateSpace::from_json(document, expander, &resolver, initial, target);
    assert!(matches!(result, Err(MechError::UnknownSpecies(name)) if name == "Z"));
}

#[test]
fn test_negative_weight_is_reported() {
    let reversible = ReactionNetwork::from_json_str(
        r#"{
            "species": [{"name": "A"}, {"name": "B"}, {"name": "C"}],
            "rules": [
                {"name": "a_to_b", "left": {"A": 1}, "right": {"B": 1}},
                {"name": "b_to_a", "left": {"B": 1}, "right": {"A": 1}},
                {"name": "b_to_c", "left": {"B": 1}, "right": {"C": 1}}
            ],
            "initial": {"A": 1},
            "target": {"C": 1}
        }"#,
    )
    .unwrap();

    let mut space = chain_space(reversible);
    let falling = |accumulated: f64, _: &mechsearch::StateSpaceEdge| accumulated - 1.0;
    let result = shortest_path(&mut space, &falling, SearchAlgorithm::Dijkstra);
    assert!(matches!(result, Err(MechError::NegativeRelaxation { .. })));
}
