//! Exploration settings.

use std::path::Path as FsPath;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Largest sub-multiset submitted to the rule engine by default.
pub const DEFAULT_MAX_SUB_MULTISET_SIZE: usize = 5;

/// Shortest-path routine used for single paths and Yen spur searches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    #[default]
    Dijkstra,
    #[value(alias = "bidirectional")]
    BidirectionalDijkstra,
}

impl std::fmt::Display for SearchAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchAlgorithm::Dijkstra => write!(f, "dijkstra"),
            SearchAlgorithm::BidirectionalDijkstra => write!(f, "bidirectional_dijkstra"),
        }
    }
}

/// Edge weight selected by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WeightKind {
    #[default]
    Constant,
    EnergyDifference,
    EnergyBarrier,
}

impl std::fmt::Display for WeightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightKind::Constant => write!(f, "constant"),
            WeightKind::EnergyDifference => write!(f, "energy_difference"),
            WeightKind::EnergyBarrier => write!(f, "energy_barrier"),
        }
    }
}

/// Configuration of one exploration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Bidirectional BFS radius. Default: 6
    pub max_length: usize,
    /// Largest sub-multiset handed to the rule engine. Default: 5
    pub max_sub_multiset_size: usize,
    /// Budget of fresh node expansions (both directions). Default: unlimited
    pub expansion_limit: Option<usize>,
    /// Nodes a single shortest-path search may settle. Default: unlimited
    pub search_expansion_limit: Option<usize>,
    pub algorithm: SearchAlgorithm,
    /// Number of mechanisms to report. Default: 1
    pub num_paths: usize,
    pub weight: WeightKind,
    /// Maximum atom distance of bonds formed in one step. Default: off
    pub displacement_threshold: Option<f64>,
    /// Restrict the space to initial-to-target paths before searching.
    /// Default: true
    pub prune: bool,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            max_length: 6,
            max_sub_multiset_size: DEFAULT_MAX_SUB_MULTISET_SIZE,
            expansion_limit: None,
            search_expansion_limit: None,
            algorithm: SearchAlgorithm::default(),
            num_paths: 1,
            weight: WeightKind::default(),
            displacement_threshold: None,
            prune: true,
        }
    }
}

impl ExplorationConfig {
    /// Read a JSON configuration file; missing fields take their defaults.
    pub fn from_file(path: &FsPath) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
