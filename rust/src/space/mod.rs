//! State spaces: derivation cache, lazily expanded graph, paths and
//! persistence.

pub mod expander;
pub mod graph;
pub mod path;
pub mod persist;

pub use expander::{DerivationExpander, ExpanderStats};
pub use graph::{Expansion, NodeId, SharedExpander, StateSpace, StateSpaceEdge, StateSpaceNode};
pub use path::Path;
pub use persist::{resolve_state, EdgeDocument, NodeDocument, StateSpaceDocument};
