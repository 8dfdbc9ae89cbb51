//! Derivation cache.
//!
//! Maps a state multiset to every elementary event applicable to some
//! sub-multiset of it. States are decomposed into small sub-multisets that at
//! least one rule can consume; each sub-multiset is handed to the engine once
//! and the resulting events are cached under that exact sub-multiset, so
//! overlapping states share work.

use std::collections::{BTreeSet, HashMap};

use crate::chem::{Species, StateMultiset};
use crate::config::DEFAULT_MAX_SUB_MULTISET_SIZE;
use crate::engine::{Event, EventId, Rule, RuleEngine};

/// Counters exposed for introspection and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpanderStats {
    /// Number of `RuleEngine::apply` calls.
    pub engine_calls: usize,
    /// Sub-multisets answered from the cache.
    pub cache_hits: usize,
    /// Rule applications skipped because the engine reported an error.
    pub skipped_applications: usize,
}

/// An inverse rule together with the forward rule it was derived from.
#[derive(Clone, Debug)]
struct InverseRule {
    inverse: Rule,
    origin: Rule,
}

/// Sub-multiset derivation cache over a [`RuleEngine`].
pub struct DerivationExpander<E: RuleEngine> {
    engine: E,
    /// Grammar rules sorted by id.
    rules: Vec<Rule>,
    /// One entry per forward rule, in the same order.
    inverse_rules: Vec<InverseRule>,
    forward_cache: HashMap<StateMultiset, BTreeSet<Event>>,
    inverse_cache: HashMap<StateMultiset, BTreeSet<Event>>,
    /// Every event returned so far, by identity.
    events: HashMap<EventId, Event>,
    max_sub_multiset_size: usize,
    frozen: bool,
    stats: ExpanderStats,
}

impl<E: RuleEngine> DerivationExpander<E> {
    pub fn new(engine: E) -> Self {
        Self::with_max_sub_multiset_size(engine, DEFAULT_MAX_SUB_MULTISET_SIZE)
    }

    /// Build the expander and its inverse-rule table.
    ///
    /// # Arguments
    /// * `engine` - Rule engine answering derivation queries
    /// * `max_sub_multiset_size` - Upper bound on the size of sub-multisets
    ///   submitted to the engine
    pub fn with_max_sub_multiset_size(mut engine: E, max_sub_multiset_size: usize) -> Self {
        let mut rules = engine.rules();
        rules.sort_by_key(|rule| rule.id());

        let mut inverse_rules = Vec::with_capacity(rules.len());
        for rule in &rules {
            let inverse = engine.invert_rule(rule);
            let inverse = rules
                .iter()
                .chain(inverse_rules.iter().map(|entry: &InverseRule| &entry.inverse))
                .find(|candidate| engine.is_isomorphic(candidate, &inverse))
                .cloned()
                .unwrap_or(inverse);
            inverse_rules.push(InverseRule {
                inverse,
                origin: rule.clone(),
            });
        }

        Self {
            engine,
            rules,
            inverse_rules,
            forward_cache: HashMap::new(),
            inverse_cache: HashMap::new(),
            events: HashMap::new(),
            max_sub_multiset_size,
            frozen: false,
            stats: ExpanderStats::default(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Inverse rule used for each forward rule. A forward rule or an earlier
    /// inverse isomorphic to a new inverse is reused in its place.
    pub fn inverse_rules(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.inverse_rules.iter().map(|entry| &entry.inverse)
    }

    pub fn stats(&self) -> ExpanderStats {
        self.stats
    }

    /// Number of sub-multisets cached for one direction.
    pub fn cached_sub_multisets(&self, inverse: bool) -> usize {
        if inverse {
            self.inverse_cache.len()
        } else {
            self.forward_cache.len()
        }
    }

    /// Stop consulting the engine. Irreversible.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Resolve an event identity, first among events seen by this cache,
    /// then through the engine.
    pub fn lookup_event(&self, id: EventId) -> Option<Event> {
        self.events
            .get(&id)
            .cloned()
            .or_else(|| self.engine.lookup_event(id))
    }

    /// All events applicable to some sub-multiset of `multiset`.
    ///
    /// Inverse events are returned in forward orientation (sources and
    /// targets as the forward rule would produce them); fire them with
    /// `inverse = true`. A frozen expander only answers from its cache.
    pub fn compute_derivations(&mut self, multiset: &StateMultiset, inverse: bool) -> BTreeSet<Event> {
        let candidates: Vec<usize> = (0..self.rules.len())
            .filter(|&index| self.engine.fits(self.rule_at(index, inverse), multiset))
            .collect();

        let entries: Vec<(Species, u32)> = multiset.iter().map(|(s, c)| (s.clone(), c)).collect();
        let mut pieces = Vec::new();
        self.collect_sub_multisets(0, &mut Vec::new(), &candidates, &entries, inverse, &mut pieces);

        let mut derivations = BTreeSet::new();
        for (species, rule_indices) in pieces {
            let key = StateMultiset::from_species(species.iter().cloned());
            let cache = if inverse {
                &self.inverse_cache
            } else {
                &self.forward_cache
            };
            if let Some(cached) = cache.get(&key) {
                self.stats.cache_hits += 1;
                derivations.extend(cached.iter().cloned());
                continue;
            }
            if self.frozen {
                continue;
            }

            let mut found = BTreeSet::new();
            for index in rule_indices {
                found.extend(self.apply_rule(index, &species, inverse));
            }
            derivations.extend(found.iter().cloned());
            if inverse {
                self.inverse_cache.insert(key, found);
            } else {
                self.forward_cache.insert(key, found);
            }
        }

        tracing::debug!(
            state = %multiset,
            inverse,
            events = derivations.len(),
            "computed derivations"
        );
        derivations
    }

    fn rule_at(&self, index: usize, inverse: bool) -> &Rule {
        if inverse {
            &self.inverse_rules[index].inverse
        } else {
            &self.rules[index]
        }
    }

    /// Enumerate non-empty sub-multisets (as canonical species sequences)
    /// together with the rules that may consume all of their species.
    ///
    /// Species are added in ascending identity order starting after
    /// `start - 1`, so each sub-multiset is produced once.
    fn collect_sub_multisets(
        &self,
        start: usize,
        picked: &mut Vec<Species>,
        candidates: &[usize],
        entries: &[(Species, u32)],
        inverse: bool,
        out: &mut Vec<(Vec<Species>, Vec<usize>)>,
    ) {
        for (j, (species, count)) in entries.iter().enumerate().skip(start) {
            let mut surviving: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&index| self.engine.admits(self.rule_at(index, inverse), species))
                .collect();

            let depth = picked.len();
            for _ in 0..*count {
                if picked.len() >= self.max_sub_multiset_size {
                    break;
                }
                picked.push(species.clone());
                let size = picked.len();
                surviving.retain(|&index| self.rule_at(index, inverse).left_components() >= size);
                if surviving.is_empty() {
                    break;
                }
                out.push((picked.clone(), surviving.clone()));
                self.collect_sub_multisets(j + 1, picked, &surviving, entries, inverse, out);
            }
            picked.truncate(depth);
        }
    }

    /// Apply one rule to one input list, turning engine errors into skips.
    fn apply_rule(&mut self, index: usize, inputs: &[Species], inverse: bool) -> Vec<Event> {
        let rule = self.rule_at(index, inverse).clone();
        self.stats.engine_calls += 1;
        let events = match self.engine.apply(&rule, inputs) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(rule = rule.name(), error = %err, "skipping rule application");
                self.stats.skipped_applications += 1;
                return Vec::new();
            }
        };

        let mut result = Vec::with_capacity(events.len());
        for event in events {
            let event = if inverse {
                let origin = self.inverse_rules[index].origin.clone();
                match self.engine.invert_event(&event, &origin) {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(rule = origin.name(), error = %err, "skipping inverse event");
                        self.stats.skipped_applications += 1;
                        continue;
                    }
                }
            } else {
                event
            };
            self.events.insert(event.id(), event.clone());
            result.push(event);
        }
        result
    }
}

impl<E: RuleEngine> std::fmt::Debug for DerivationExpander<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivationExpander")
            .field("rules", &self.rules.len())
            .field("forward_cache", &self.forward_cache.len())
            .field("inverse_cache", &self.inverse_cache.len())
            .field("frozen", &self.frozen)
            .field("stats", &self.stats)
            .finish()
    }
}
