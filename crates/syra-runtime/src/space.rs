//! The atom space: canonical atoms, per-atom metadata, head-indexed lookup.
//!
//! Concurrency model: records live in a `DashMap` keyed by atom id, each
//! holding its metadata behind a per-record `RwLock`. `update_value` is an
//! atomic read-modify-write on one record; unrelated atoms never contend
//! beyond dashmap shard granularity. There is no global lock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use syra_core::{unify, Atom, AtomId, AtomValue, Bindings, Interner, RuntimeError};

/// Tunables for the space. The numbers are documented defaults; the policy
/// shape is what matters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// Hard cap on query results.
    pub max_results: usize,
    /// Candidates below this belief confidence are skipped by queries.
    pub min_confidence: f64,
    /// STI boost applied on every (re)insertion.
    pub insert_boost: f64,
    /// Belief revisions moving confidence by more than this also boost STI.
    pub significant_confidence_delta: f64,
    /// Fraction of the confidence delta converted into an STI boost.
    pub confidence_boost_factor: f64,
    /// Query work budget: `budget_base + budget_factor * sqrt(len)`.
    pub budget_base: usize,
    pub budget_factor: usize,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            max_results: 32,
            min_confidence: 0.05,
            insert_boost: 0.02,
            significant_confidence_delta: 0.1,
            confidence_boost_factor: 0.5,
            budget_base: 256,
            budget_factor: 16,
        }
    }
}

impl SpaceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_results == 0 {
            return Err("max_results must be greater than zero".into());
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err("min_confidence must be within [0, 1]".into());
        }
        if self.budget_base == 0 {
            return Err("budget_base must be greater than zero".into());
        }
        Ok(())
    }
}

/// One query match: the stored atom plus the bindings that made it match.
#[derive(Clone, Debug)]
pub struct Answer {
    pub atom: Atom,
    pub bindings: Bindings,
}

struct AtomRecord {
    atom: Atom,
    value: RwLock<AtomValue>,
}

/// Canonical atom store.
pub struct AtomSpace {
    interner: Interner,
    config: SpaceConfig,
    records: DashMap<AtomId, AtomRecord>,
    /// Head symbol id -> ids of stored expressions with that head.
    head_index: DashMap<AtomId, HashSet<AtomId>>,
    /// Atoms exempt from forgetting (structural symbols, live agents).
    protected: DashSet<AtomId>,
    /// Logical clock; every mutating touch advances it.
    clock: AtomicU64,
    /// Advisory gate excluding concurrent attention sweeps from each other.
    sweep_gate: Mutex<()>,
}

impl AtomSpace {
    pub fn new(config: SpaceConfig) -> Result<Self, RuntimeError> {
        config.validate().map_err(RuntimeError::Config)?;
        Ok(Self {
            interner: Interner::new(),
            config,
            records: DashMap::new(),
            head_index: DashMap::new(),
            protected: DashSet::new(),
            clock: AtomicU64::new(0),
            sweep_gate: Mutex::new(()),
        })
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    // Constructors: intern without inserting into the store.

    pub fn sym(&self, name: &str) -> Atom {
        self.interner.symbol(name)
    }

    pub fn var(&self, name: &str) -> Atom {
        self.interner.variable(name)
    }

    pub fn expr(&self, children: Vec<Atom>) -> Atom {
        self.interner.expression(children)
    }

    pub fn int(&self, value: i64) -> Atom {
        self.interner.int(value)
    }

    pub fn float(&self, value: f64) -> Atom {
        self.interner.float(value)
    }

    pub fn boolean(&self, value: bool) -> Atom {
        self.interner.boolean(value)
    }

    pub fn text(&self, value: &str) -> Atom {
        self.interner.text(value)
    }

    /// Number of atoms currently stored (stored, not merely interned).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        self.records.contains_key(&atom.id())
    }

    /// Advance and read the logical clock.
    pub fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Concrete (non-variable) head id of a stored expression, if any.
    fn head_key(atom: &Atom) -> Option<AtomId> {
        let head = atom.head()?;
        if head.is_variable() {
            None
        } else {
            Some(head.id())
        }
    }

    /// Insert an atom. Idempotent: re-inserting refreshes recency and
    /// applies a small STI boost instead of duplicating.
    pub fn add(&self, atom: &Atom) -> Atom {
        let now = self.tick();
        match self.records.entry(atom.id()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                let mut value = entry.get().value.write();
                value.importance.boost(self.config.insert_boost);
                value.touch(now);
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let mut value = AtomValue::default();
                value.importance.boost(self.config.insert_boost);
                value.touch(now);
                entry.insert(AtomRecord {
                    atom: atom.clone(),
                    value: RwLock::new(value),
                });
                if let Some(head) = Self::head_key(atom) {
                    self.head_index.entry(head).or_default().insert(atom.id());
                }
                tracing::trace!(atom = %atom, "atom added");
            }
        }
        atom.clone()
    }

    /// Copy of an atom's metadata. Absent means the caller substitutes a
    /// default; there is deliberately no panicking accessor.
    pub fn value(&self, atom: &Atom) -> Option<AtomValue> {
        self.records.get(&atom.id()).map(|r| *r.value.read())
    }

    /// Atomic read-modify-write of one atom's metadata.
    ///
    /// Invariants (importance in [0,1], evidence >= 0) are restored after
    /// the caller's mutation. A belief revision that moves confidence by
    /// more than the configured delta also boosts STI proportionally.
    pub fn update_value(&self, atom: &Atom, f: impl FnOnce(&mut AtomValue)) -> bool {
        let now = self.tick();
        let Some(record) = self.records.get(&atom.id()) else {
            return false;
        };
        let mut value = record.value.write();
        let confidence_before = value.belief.confidence();
        f(&mut value);
        value.normalize();
        let shift = (value.belief.confidence() - confidence_before).abs();
        if shift > self.config.significant_confidence_delta {
            value
                .importance
                .boost(shift * self.config.confidence_boost_factor);
        }
        value.touch(now);
        true
    }

    /// Delete an atom, its metadata, and its index entries.
    pub fn remove(&self, atom: &Atom) -> bool {
        let Some((id, _record)) = self.records.remove(&atom.id()) else {
            return false;
        };
        if let Some(head) = Self::head_key(atom) {
            if let Some(mut ids) = self.head_index.get_mut(&head) {
                ids.remove(&id);
            }
        }
        true
    }

    pub fn protect(&self, atom: &Atom) {
        self.protected.insert(atom.id());
    }

    pub fn unprotect(&self, atom: &Atom) {
        self.protected.remove(&atom.id());
    }

    pub fn is_protected(&self, atom: &Atom) -> bool {
        self.protected.contains(&atom.id())
    }

    /// Per-query candidate budget, sub-linear in store size so pathological
    /// scans stay bounded.
    fn scan_budget(&self) -> usize {
        let len = self.records.len() as f64;
        self.config.budget_base + self.config.budget_factor * (len.sqrt() as usize)
    }

    /// Pattern query.
    ///
    /// Uses the head index when the pattern is an expression with a
    /// concrete head, otherwise falls back to a bounded full scan. Results
    /// are deduplicated, capped at `max_results`, and sorted descending by
    /// belief strength x confidence.
    pub fn query(&self, pattern: &Atom) -> Vec<Answer> {
        let mut budget = self.scan_budget();
        let mut scored: Vec<(f64, Answer)> = Vec::new();
        let mut seen: HashSet<AtomId> = HashSet::new();

        let mut consider = |record: &AtomRecord, budget: &mut usize| -> bool {
            if *budget == 0 {
                return false;
            }
            *budget -= 1;
            let belief = record.value.read().belief;
            if belief.confidence() < self.config.min_confidence {
                return true;
            }
            if let Some(bindings) = unify(pattern, &record.atom, &Bindings::new()) {
                if seen.insert(record.atom.id()) {
                    scored.push((
                        belief.score(),
                        Answer {
                            atom: record.atom.clone(),
                            bindings,
                        },
                    ));
                }
            }
            true
        };

        if let Some(head) = Self::head_key(pattern) {
            let ids: Vec<AtomId> = self
                .head_index
                .get(&head)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default();
            for id in ids {
                if let Some(record) = self.records.get(&id) {
                    if !consider(&record, &mut budget) {
                        break;
                    }
                }
            }
        } else {
            for record in self.records.iter() {
                if !consider(&record, &mut budget) {
                    break;
                }
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.max_results);
        scored.into_iter().map(|(_, answer)| answer).collect()
    }

    /// Iterate stored atoms with their current metadata.
    ///
    /// Snapshot semantics are best-effort under concurrent mutation, which
    /// is all the attention sweep needs.
    pub fn for_each_record(&self, mut f: impl FnMut(&Atom, &RwLock<AtomValue>)) {
        for record in self.records.iter() {
            f(&record.atom, &record.value);
        }
    }

    pub(crate) fn sweep_gate(&self) -> &Mutex<()> {
        &self.sweep_gate
    }

    /// Current logical time without advancing the clock.
    pub fn now(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }
}
