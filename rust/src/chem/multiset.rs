//! Species multisets.
//!
//! The global reaction state is a multiset of species. The canonical form is
//! the sequence of species sorted by identity, each repeated per count; two
//! multisets are equal iff their canonical sequences are equal, and the hash
//! is computed once from that sequence.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Sub};

use super::species::Species;
use crate::error::{MechError, Result};

/// Immutable multiset of species with an order-independent cached hash.
#[derive(Clone, Debug)]
pub struct StateMultiset {
    /// species -> positive count (zero counts are never stored)
    counts: BTreeMap<Species, u32>,
    /// Total number of species with multiplicity.
    total: usize,
    cached_hash: u64,
}

impl PartialEq for StateMultiset {
    fn eq(&self, other: &Self) -> bool {
        self.cached_hash == other.cached_hash && self.counts == other.counts
    }
}

impl Eq for StateMultiset {}

impl Hash for StateMultiset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cached_hash.hash(state);
    }
}

impl Default for StateMultiset {
    fn default() -> Self {
        Self::from_map(BTreeMap::new())
    }
}

impl StateMultiset {
    /// The empty multiset.
    pub fn new() -> Self {
        Self::default()
    }

    fn from_map(mut counts: BTreeMap<Species, u32>) -> Self {
        counts.retain(|_, count| *count > 0);
        let total = counts.values().map(|&c| c as usize).sum();
        let cached_hash = Self::compute_hash(&counts);
        Self {
            counts,
            total,
            cached_hash,
        }
    }

    /// Hash the canonical sequence (BTreeMap iterates in identity order).
    fn compute_hash(counts: &BTreeMap<Species, u32>) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        for (species, count) in counts {
            species.id().hash(&mut hasher);
            count.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Build from `(species, count)` pairs; repeated species accumulate.
    pub fn from_counts(counts: impl IntoIterator<Item = (Species, u32)>) -> Self {
        let mut map = BTreeMap::new();
        for (species, count) in counts {
            *map.entry(species).or_insert(0) += count;
        }
        Self::from_map(map)
    }

    /// Build from a flat list of species (with duplicates).
    pub fn from_species(species: impl IntoIterator<Item = Species>) -> Self {
        Self::from_counts(species.into_iter().map(|s| (s, 1)))
    }

    /// Total number of species, with multiplicity.
    #[inline]
    pub fn len(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct species.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, species: &Species) -> u32 {
        self.counts.get(species).copied().unwrap_or(0)
    }

    pub fn contains(&self, species: &Species) -> bool {
        self.counts.contains_key(species)
    }

    /// Iterate `(species, count)` in ascending identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&Species, u32)> + '_ {
        self.counts.iter().map(|(s, &c)| (s, c))
    }

    /// The canonical sequence: ascending identity, repeated per count.
    pub fn sequence(&self) -> Vec<Species> {
        let mut result = Vec::with_capacity(self.total);
        for (species, &count) in &self.counts {
            for _ in 0..count {
                result.push(species.clone());
            }
        }
        result
    }

    /// True if every species of `self` occurs in `other` at least as often.
    pub fn is_sub_multiset_of(&self, other: &StateMultiset) -> bool {
        self.total <= other.total
            && self
                .counts
                .iter()
                .all(|(species, &count)| other.count(species) >= count)
    }

    /// Union of counts.
    pub fn plus(&self, other: &StateMultiset) -> Self {
        let mut counts = self.counts.clone();
        for (species, &count) in &other.counts {
            *counts.entry(species.clone()).or_insert(0) += count;
        }
        Self::from_map(counts)
    }

    /// Count difference.
    ///
    /// # Errors
    /// [`MechError::NegativeMultiplicity`] if `other` is not contained in `self`.
    pub fn try_minus(&self, other: &StateMultiset) -> Result<Self> {
        let mut counts = self.counts.clone();
        for (species, &take) in &other.counts {
            let have = counts.get(species).copied().unwrap_or(0);
            if have < take {
                return Err(MechError::NegativeMultiplicity {
                    species: species.name().to_string(),
                    have,
                    take,
                });
            }
            counts.insert(species.clone(), have - take);
        }
        Ok(Self::from_map(counts))
    }

    /// All sub-multisets whose total size is at most `maximum_size`
    /// (unbounded when `None`), the empty multiset included.
    ///
    /// Without a bound a multiset with counts c_1..c_n has exactly
    /// ∏(c_i + 1) sub-multisets.
    pub fn sub_multisets(&self, maximum_size: Option<usize>) -> Vec<StateMultiset> {
        let maximum_size = maximum_size.unwrap_or(self.total);
        let mut partial: Vec<(Vec<u32>, usize)> = vec![(Vec::new(), 0)];
        for &count in self.counts.values() {
            let mut next = Vec::new();
            for (picked, used) in &partial {
                let room = maximum_size.saturating_sub(*used).min(count as usize);
                for n in 0..=room {
                    let mut extended = picked.clone();
                    extended.push(n as u32);
                    next.push((extended, used + n));
                }
            }
            partial = next;
        }

        partial
            .into_iter()
            .map(|(picked, _)| {
                Self::from_counts(
                    self.counts
                        .keys()
                        .cloned()
                        .zip(picked)
                        .filter(|(_, n)| *n > 0),
                )
            })
            .collect()
    }

    /// Species names mapped to counts, as stored in persisted documents.
    pub fn to_name_counts(&self) -> BTreeMap<String, u32> {
        self.counts
            .iter()
            .map(|(s, &c)| (s.name().to_string(), c))
            .collect()
    }
}

impl Add for &StateMultiset {
    type Output = StateMultiset;

    fn add(self, rhs: &StateMultiset) -> StateMultiset {
        self.plus(rhs)
    }
}

/// Panics when a count would become negative; use
/// [`StateMultiset::try_minus`] to handle that case.
impl Sub for &StateMultiset {
    type Output = StateMultiset;

    fn sub(self, rhs: &StateMultiset) -> StateMultiset {
        match self.try_minus(rhs) {
            Ok(result) => result,
            Err(err) => panic!("{err}"),
        }
    }
}

impl std::fmt::Display for StateMultiset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(s, &c)| {
                if c > 1 {
                    format!("{}×{}", s.name(), c)
                } else {
                    s.name().to_string()
                }
            })
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
