//! Runtime metrics: relaxed atomic counters with snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for the interesting runtime events. All updates are relaxed;
/// snapshots are approximate under concurrency, which is fine for counters.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    queries: AtomicU64,
    rewrites: AtomicU64,
    grounded_calls: AtomicU64,
    cycles: AtomicU64,
    faults: AtomicU64,
    sweeps: AtomicU64,
    evictions: AtomicU64,
    ticks: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rewrite(&self) {
        self.rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_grounded_call(&self) {
        self.grounded_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self, evicted: u64) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            rewrites: self.rewrites.load(Ordering::Relaxed),
            grounded_calls: self.grounded_calls.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub rewrites: u64,
    pub grounded_calls: u64,
    pub cycles: u64,
    pub faults: u64,
    pub sweeps: u64,
    pub evictions: u64,
    pub ticks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsCollector::new();
        metrics.record_cycle();
        metrics.record_cycle();
        metrics.record_sweep(3);
        let snap = metrics.snapshot();
        assert_eq!(snap.cycles, 2);
        assert_eq!(snap.sweeps, 1);
        assert_eq!(snap.evictions, 3);
    }

    #[test]
    fn snapshot_serializes() {
        let metrics = MetricsCollector::new();
        metrics.record_query();
        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        assert!(json.contains("\"queries\":1"));
    }
}
