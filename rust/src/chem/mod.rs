//! Chemical data model: species, multisets and states.

pub mod multiset;
pub mod species;
pub mod state;

pub use multiset::StateMultiset;
pub use species::{Species, SpeciesId, SpeciesResolver};
pub use state::{State, TransitionGuard};
