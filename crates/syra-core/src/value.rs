//! Per-atom metadata: belief and importance.
//!
//! Exactly one [`AtomValue`] exists per canonical atom in a store, created
//! with defaults on first insertion and mutated in place under the store's
//! per-atom lock.

use serde::{Deserialize, Serialize};

/// Evidence weight at which confidence reaches 0.5.
pub const CONFIDENCE_K: f64 = 1.0;

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Truth value as a (strength, evidence-count) pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    /// How strongly the atom is held to be true, in [0, 1].
    pub strength: f64,
    /// Accumulated evidence weight, >= 0.
    pub evidence: f64,
}

impl Default for Belief {
    fn default() -> Self {
        // A freshly asserted fact: fully believed on one unit of evidence.
        Belief {
            strength: 1.0,
            evidence: 1.0,
        }
    }
}

impl Belief {
    pub fn new(strength: f64, evidence: f64) -> Self {
        Belief {
            strength: clamp01(strength),
            evidence: evidence.max(0.0),
        }
    }

    /// Confidence derived from evidence weight, in [0, 1).
    pub fn confidence(&self) -> f64 {
        self.evidence / (self.evidence + CONFIDENCE_K)
    }

    /// Ranking score: strength weighted by confidence.
    pub fn score(&self) -> f64 {
        self.strength * self.confidence()
    }

    /// Evidence-weighted revision.
    ///
    /// Commutative and associative, so concurrent merges applied in any
    /// order converge to the same belief.
    pub fn revise(&self, other: &Belief) -> Belief {
        let total = self.evidence + other.evidence;
        if total == 0.0 {
            return Belief::new((self.strength + other.strength) / 2.0, 0.0);
        }
        Belief {
            strength: (self.strength * self.evidence + other.strength * other.evidence) / total,
            evidence: total,
        }
    }
}

/// Short-/long-term importance pair driving scheduling and forgetting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Importance {
    /// Short-term importance (STI), in [0, 1]. Boosted on access, decayed
    /// by attention sweeps.
    pub short_term: f64,
    /// Long-term importance (LTI), in [0, 1]. Accumulates habituated STI.
    pub long_term: f64,
}

impl Importance {
    pub fn new(short_term: f64, long_term: f64) -> Self {
        Importance {
            short_term: clamp01(short_term),
            long_term: clamp01(long_term),
        }
    }

    pub fn boost(&mut self, amount: f64) {
        self.short_term = clamp01(self.short_term + amount);
    }

    /// Decay STI by `rate`, transferring `transfer` of the decayed amount
    /// into LTI (habituation).
    pub fn decay(&mut self, rate: f64, transfer: f64) {
        let lost = self.short_term * clamp01(rate);
        self.short_term = clamp01(self.short_term - lost);
        self.long_term = clamp01(self.long_term + lost * clamp01(transfer));
    }

    /// Combined urgency used as scheduling priority.
    pub fn combined(&self) -> f64 {
        clamp01(self.short_term + self.long_term)
    }

    pub(crate) fn clamp_in_place(&mut self) {
        self.short_term = clamp01(self.short_term);
        self.long_term = clamp01(self.long_term);
    }
}

/// Complete mutable metadata for one canonical atom.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AtomValue {
    pub belief: Belief,
    pub importance: Importance,
    /// Logical store tick of the last access.
    pub last_access: u64,
}

impl AtomValue {
    pub fn touch(&mut self, now: u64) {
        self.last_access = self.last_access.max(now);
    }

    /// Restore invariants after an arbitrary caller mutation.
    pub fn normalize(&mut self) {
        self.belief.strength = clamp01(self.belief.strength);
        self.belief.evidence = self.belief.evidence.max(0.0);
        self.importance.clamp_in_place();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_is_commutative_and_associative() {
        let a = Belief::new(1.0, 2.0);
        let b = Belief::new(0.0, 1.0);
        let c = Belief::new(0.5, 4.0);

        assert_eq!(a.revise(&b), b.revise(&a));

        let left = a.revise(&b).revise(&c);
        let right = a.revise(&c.revise(&b));
        assert!((left.strength - right.strength).abs() < 1e-12);
        assert!((left.evidence - right.evidence).abs() < 1e-12);
    }

    #[test]
    fn confidence_grows_with_evidence() {
        let weak = Belief::new(1.0, 0.5);
        let strong = Belief::new(1.0, 8.0);
        assert!(strong.confidence() > weak.confidence());
        assert!(strong.confidence() < 1.0);
        assert_eq!(Belief::new(1.0, 0.0).confidence(), 0.0);
    }

    #[test]
    fn decay_habituates_into_long_term() {
        let mut imp = Importance::new(0.8, 0.0);
        imp.decay(0.5, 0.25);
        assert!((imp.short_term - 0.4).abs() < 1e-12);
        assert!((imp.long_term - 0.1).abs() < 1e-12);

        // Repeated decay never leaves [0, 1].
        for _ in 0..100 {
            imp.decay(0.9, 1.0);
        }
        assert!(imp.short_term >= 0.0 && imp.long_term <= 1.0);
    }

    #[test]
    fn normalize_restores_invariants() {
        let mut value = AtomValue {
            belief: Belief {
                strength: 2.5,
                evidence: -1.0,
            },
            importance: Importance {
                short_term: 1.7,
                long_term: -0.2,
            },
            last_access: 0,
        };
        value.normalize();
        assert_eq!(value.belief.strength, 1.0);
        assert_eq!(value.belief.evidence, 0.0);
        assert_eq!(value.importance.short_term, 1.0);
        assert_eq!(value.importance.long_term, 0.0);
    }
}
