//! Attention decay and capacity-driven forgetting.
//!
//! A sweep is a combined recency/frequency eviction pass with a protected
//! working set: decay STI (habituating a fraction into LTI), score every
//! atom, then, only when the store is over capacity, evict the
//! lowest-scoring unprotected candidates down to a target *below* capacity
//! so the next insertion does not immediately re-trigger.
//!
//! Sweeps exclude concurrent sweeps via the space's advisory gate but never
//! block ordinary reads/writes. Eviction is advisory policy, not a fault.

use serde::{Deserialize, Serialize};

use crate::space::AtomSpace;
use syra_core::{Atom, AtomId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttentionConfig {
    /// Store size that triggers eviction.
    pub capacity: usize,
    /// Eviction target as a fraction of capacity, strictly below 1.
    pub target_fill: f64,
    /// Fraction of STI lost per sweep.
    pub sti_decay: f64,
    /// Fraction of the decayed STI habituated into LTI.
    pub lti_transfer: f64,
    /// Atoms scoring below this are forgetting candidates.
    pub forget_threshold: f64,
    /// Logical-tick half-life for the recency discount on STI.
    pub recency_half_life: f64,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            target_fill: 0.9,
            sti_decay: 0.1,
            lti_transfer: 0.2,
            forget_threshold: 0.02,
            recency_half_life: 256.0,
        }
    }
}

impl AttentionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than zero".into());
        }
        if !(0.0..1.0).contains(&self.target_fill) {
            return Err("target_fill must be within [0, 1)".into());
        }
        if !(0.0..=1.0).contains(&self.sti_decay) || !(0.0..=1.0).contains(&self.lti_transfer) {
            return Err("decay rates must be within [0, 1]".into());
        }
        if self.recency_half_life <= 0.0 {
            return Err("recency_half_life must be positive".into());
        }
        Ok(())
    }

    fn target(&self) -> usize {
        ((self.capacity as f64) * self.target_fill) as usize
    }
}

/// Outcome of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Atoms whose importance was decayed.
    pub decayed: usize,
    /// Unprotected atoms below the forget threshold.
    pub candidates: usize,
    /// Atoms actually evicted.
    pub evicted: usize,
    /// True when another sweep held the gate and this one did nothing.
    pub skipped: bool,
}

/// Run one decay + evict pass over the space.
pub fn sweep(space: &AtomSpace, config: &AttentionConfig) -> SweepStats {
    let Some(_gate) = space.sweep_gate().try_lock() else {
        return SweepStats {
            skipped: true,
            ..SweepStats::default()
        };
    };

    let now = space.tick();
    let mut stats = SweepStats::default();
    let mut scored: Vec<(f64, AtomId, Atom)> = Vec::new();

    space.for_each_record(|atom, value| {
        let mut value = value.write();
        let age = now.saturating_sub(value.last_access) as f64;
        value.importance.decay(config.sti_decay, config.lti_transfer);
        value.touch(now);
        stats.decayed += 1;

        if space.is_protected(atom) || atom.is_variable() {
            return;
        }
        let recency = (-age / config.recency_half_life).exp2();
        let score = (value.importance.short_term * recency + value.importance.long_term)
            * value.belief.confidence();
        if score < config.forget_threshold {
            scored.push((score, atom.id(), atom.clone()));
        }
    });
    stats.candidates = scored.len();

    if space.len() > config.capacity {
        let target = config.target();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        for (_, _, atom) in scored {
            if space.len() <= target {
                break;
            }
            if space.remove(&atom) {
                stats.evicted += 1;
            }
        }
        tracing::debug!(
            evicted = stats.evicted,
            remaining = space.len(),
            "forgetting pass evicted atoms"
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::SpaceConfig;

    fn small_space() -> AtomSpace {
        AtomSpace::new(SpaceConfig::default()).unwrap()
    }

    fn fill(space: &AtomSpace, count: usize) {
        for n in 0..count {
            let atom = space.expr(vec![space.sym("fact"), space.int(n as i64)]);
            space.add(&atom);
        }
    }

    #[test]
    fn under_capacity_sweep_only_decays() {
        let space = small_space();
        fill(&space, 10);
        let config = AttentionConfig {
            capacity: 100,
            ..AttentionConfig::default()
        };
        let stats = sweep(&space, &config);
        assert_eq!(stats.evicted, 0);
        assert_eq!(stats.decayed, 10);
        assert_eq!(space.len(), 10);
    }

    #[test]
    fn over_capacity_sweep_evicts_to_target() {
        let space = small_space();
        fill(&space, 100);
        let config = AttentionConfig {
            capacity: 50,
            target_fill: 0.8,
            ..AttentionConfig::default()
        };
        let stats = sweep(&space, &config);
        assert!(space.len() <= 50, "store must end at or below capacity");
        // Never evicts exactly to capacity: target is 40.
        assert_eq!(space.len(), 40);
        assert_eq!(stats.evicted, 60);
    }

    #[test]
    fn protected_atoms_survive_any_number_of_sweeps() {
        let space = small_space();
        let keep = space.sym("=");
        space.add(&keep);
        space.protect(&keep);
        fill(&space, 60);

        let config = AttentionConfig {
            capacity: 10,
            target_fill: 0.5,
            ..AttentionConfig::default()
        };
        for _ in 0..20 {
            sweep(&space, &config);
        }
        assert!(space.contains(&keep));
    }

    #[test]
    fn high_importance_atoms_are_not_candidates() {
        let space = small_space();
        let hot = space.sym("hot");
        space.add(&hot);
        space.update_value(&hot, |v| v.importance.short_term = 1.0);
        fill(&space, 60);

        let config = AttentionConfig {
            capacity: 10,
            target_fill: 0.5,
            sti_decay: 0.01,
            ..AttentionConfig::default()
        };
        sweep(&space, &config);
        assert!(space.contains(&hot));
    }

    #[test]
    fn decay_habituates_into_long_term() {
        let space = small_space();
        let atom = space.sym("a");
        space.add(&atom);
        space.update_value(&atom, |v| v.importance.short_term = 0.8);

        let config = AttentionConfig {
            capacity: 100,
            ..AttentionConfig::default()
        };
        sweep(&space, &config);
        let value = space.value(&atom).unwrap();
        assert!(value.importance.short_term < 0.8);
        assert!(value.importance.long_term > 0.0);
    }

    #[test]
    fn config_validation() {
        assert!(AttentionConfig::default().validate().is_ok());
        let bad = AttentionConfig {
            target_fill: 1.0,
            ..AttentionConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
