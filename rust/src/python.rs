//! Python bindings (feature `python`).
//!
//! Build with maturin and `--features extension-module`; the module is
//! importable as `mechsearch`.

use std::rc::Rc;

use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::wrap_pyfunction;

use crate::chem::TransitionGuard;
use crate::config::ExplorationConfig;
use crate::distance::{hop_distance_matrix, DistanceGuard, DEFAULT_DISPLACEMENT_THRESHOLD};
use crate::network::ReactionNetwork;
use crate::pipeline::explore_network_guarded;

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Explore a reaction network and return its best mechanisms.
///
/// # Arguments
/// * `network_json` - Network description with its initial/target query
/// * `config_json` - Optional exploration settings; missing fields default
/// * `distance_matrix` - Optional (n_atoms, n_atoms) atom distance matrix;
///   overrides the network's atom bonds for the displacement guard
/// * `displacement_threshold` - Threshold used with `distance_matrix` when
///   the config sets none
///
/// # Returns
/// * List of dicts with `rank`, `cost`, `states` and `edges`
///   (`(src, tar, [event ids])` per step)
#[pyfunction]
#[pyo3(signature = (network_json, config_json=None, distance_matrix=None, displacement_threshold=None))]
fn find_mechanisms(
    py: Python<'_>,
    network_json: &str,
    config_json: Option<&str>,
    distance_matrix: Option<PyReadonlyArray2<f64>>,
    displacement_threshold: Option<f64>,
) -> PyResult<Vec<PyObject>> {
    let network = ReactionNetwork::from_json_str(network_json).map_err(value_error)?;
    let mut config: ExplorationConfig = match config_json {
        Some(text) => serde_json::from_str(text).map_err(value_error)?,
        None => ExplorationConfig::default(),
    };
    if displacement_threshold.is_some() {
        config.displacement_threshold = displacement_threshold;
    }

    let guard = match (&distance_matrix, config.displacement_threshold) {
        (Some(matrix), threshold) => Some(Rc::new(DistanceGuard::new(
            matrix.as_array().to_owned(),
            threshold.unwrap_or(DEFAULT_DISPLACEMENT_THRESHOLD),
        )) as Rc<dyn TransitionGuard>),
        (None, Some(threshold)) => Some(Rc::new(DistanceGuard::from_bonds(
            network.atom_count(),
            network.atom_bonds(),
            threshold,
        )) as Rc<dyn TransitionGuard>),
        (None, None) => None,
    };

    let result = explore_network_guarded(network, &config, guard).map_err(value_error)?;

    result
        .mechanisms
        .iter()
        .map(|mechanism| {
            let dict = PyDict::new(py);
            dict.set_item("rank", mechanism.rank)?;
            dict.set_item("cost", mechanism.cost)?;
            let states: Vec<String> = mechanism
                .path
                .iter()
                .map(|edge| edge.source().state().to_string())
                .chain(mechanism.path.end().map(|node| node.state().to_string()))
                .collect();
            dict.set_item("states", states)?;
            let edges: Vec<(usize, usize, Vec<u64>)> = mechanism
                .path
                .iter()
                .map(|edge| {
                    (
                        edge.source().id(),
                        edge.target().id(),
                        edge.transitions().iter().map(|event| event.id()).collect(),
                    )
                })
                .collect();
            dict.set_item("edges", edges)?;
            Ok(dict.into())
        })
        .collect()
}

/// Hop distances between atoms of a bond graph.
///
/// # Returns
/// * (n_atoms, n_atoms) matrix, `inf` for disconnected atoms
#[pyfunction]
fn atom_distances<'py>(py: Python<'py>, n_atoms: usize, bonds: Vec<(usize, usize)>) -> &'py PyArray2<f64> {
    hop_distance_matrix(n_atoms, &bonds).into_pyarray(py)
}

/// Python module definition
#[pymodule]
fn mechsearch(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(find_mechanisms, m)?)?;
    m.add_function(wrap_pyfunction!(atom_distances, m)?)?;
    Ok(())
}
