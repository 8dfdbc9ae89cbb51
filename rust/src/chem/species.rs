//! Species identity.
//!
//! Species are canonical graphs owned by the rule engine. This crate only
//! carries their engine-assigned identity plus a few cached fields; equality,
//! hashing and ordering all go through the identity.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Engine-assigned species identity.
pub type SpeciesId = u32;

#[derive(Debug)]
struct SpeciesData {
    id: SpeciesId,
    name: String,
    vertex_count: u32,
}

/// Immutable handle to a species.
///
/// Cloning is cheap (reference counted). Two handles are equal iff the
/// engine gave them the same identity, regardless of the cached name.
#[derive(Clone, Debug)]
pub struct Species(Arc<SpeciesData>);

impl Species {
    /// Wrap an engine species.
    ///
    /// # Arguments
    /// * `id` - Canonical identity assigned by the engine
    /// * `name` - Display name (used for persistence)
    /// * `vertex_count` - Number of vertices (atoms) of the species graph
    pub fn new(id: SpeciesId, name: impl Into<String>, vertex_count: u32) -> Self {
        Self(Arc::new(SpeciesData {
            id,
            name: name.into(),
            vertex_count,
        }))
    }

    #[inline]
    pub fn id(&self) -> SpeciesId {
        self.0.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.0.vertex_count
    }
}

impl PartialEq for Species {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Species {}

impl Hash for Species {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Species {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Species {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Name → species lookup used when reloading persisted state spaces.
///
/// Aliases cover species that were merged with an isomorphic species when
/// grammars were combined: the alias name resolves to the surviving species.
#[derive(Clone, Debug, Default)]
pub struct SpeciesResolver {
    by_name: HashMap<String, Species>,
    aliases: HashMap<String, String>,
}

impl SpeciesResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver from species handles, keyed by their names.
    pub fn from_species<'a>(species: impl IntoIterator<Item = &'a Species>) -> Self {
        let mut resolver = Self::new();
        for s in species {
            resolver.insert(s.clone());
        }
        resolver
    }

    pub fn insert(&mut self, species: Species) {
        self.by_name.insert(species.name().to_string(), species);
    }

    /// Register `alias` as another name for the species called `canonical`.
    pub fn add_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(alias.into(), canonical.into());
    }

    /// Resolve a name, following at most one alias hop.
    pub fn resolve(&self, name: &str) -> Option<Species> {
        if let Some(species) = self.by_name.get(name) {
            return Some(species.clone());
        }
        self.aliases
            .get(name)
            .and_then(|canonical| self.by_name.get(canonical))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
