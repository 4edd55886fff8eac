//! Priority-weighted cooperative agent scheduler.
//!
//! A periodic tick task selects up to `max_cycles_per_tick` runnable agents
//! by weighted sampling without replacement (weight = the priority read from
//! each agent's own symbol in the space) and pushes cycle jobs to a global
//! injector. Worker tasks steal jobs (local queue first, then the
//! injector, then each other) and run cycles independently against the
//! shared space. Terminal agents simply stop being selected.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::agent::{run_cycle, AgentContext, Game};
use crate::engine::EngineSymbols;
use crate::interp::Interpreter;
use crate::metrics::MetricsCollector;
use crate::space::AtomSpace;
use syra_core::{Atom, RuntimeError};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Milliseconds between scheduling ticks.
    pub tick_interval_ms: u64,
    /// Agents dispatched per tick.
    pub max_cycles_per_tick: usize,
    /// Worker tasks executing cycles concurrently.
    pub workers: usize,
    /// STI boost applied to asserted percepts.
    pub perception_boost: f64,
    /// Multiplier applied to an agent's STI after a contained fault.
    pub fault_penalty: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 25,
            max_cycles_per_tick: 4,
            workers: 4,
            perception_boost: 0.05,
            fault_penalty: 0.5,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than zero".into());
        }
        if self.max_cycles_per_tick == 0 {
            return Err("max_cycles_per_tick must be greater than zero".into());
        }
        if self.workers == 0 {
            return Err("workers must be greater than zero".into());
        }
        if !(0.0..=1.0).contains(&self.fault_penalty) {
            return Err("fault_penalty must be within [0, 1]".into());
        }
        Ok(())
    }
}

struct CycleJob {
    agent: Arc<AgentContext>,
}

/// Weighted sampling without replacement.
///
/// Selects up to `count` items; each draw picks proportionally to weight
/// among the remaining items. Non-positive total weight ends selection.
pub(crate) fn weighted_sample<T, R: Rng>(
    rng: &mut R,
    mut items: Vec<(T, f64)>,
    count: usize,
) -> Vec<T> {
    let mut selected = Vec::with_capacity(count.min(items.len()));
    while selected.len() < count && !items.is_empty() {
        let total: f64 = items.iter().map(|(_, w)| w.max(0.0)).sum();
        if total <= 0.0 {
            break;
        }
        let mut draw = rng.gen_range(0.0..total);
        let mut index = items.len() - 1;
        for (i, (_, weight)) in items.iter().enumerate() {
            let weight = weight.max(0.0);
            if draw < weight {
                index = i;
                break;
            }
            draw -= weight;
        }
        selected.push(items.remove(index).0);
    }
    selected
}

/// Drives all registered agents against one shared space.
pub struct AgentScheduler {
    config: SchedulerConfig,
    space: Arc<AtomSpace>,
    interp: Arc<Interpreter>,
    symbols: Arc<EngineSymbols>,
    metrics: Arc<MetricsCollector>,
    agents: DashMap<String, Arc<AgentContext>>,
    injector: Injector<CycleJob>,
    stealers: RwLock<Vec<Stealer<CycleJob>>>,
    notify: Notify,
    running: AtomicBool,
    started: AtomicBool,
    ticks: AtomicU64,
}

impl AgentScheduler {
    pub fn new(
        config: SchedulerConfig,
        space: Arc<AtomSpace>,
        interp: Arc<Interpreter>,
        symbols: Arc<EngineSymbols>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self, RuntimeError> {
        config.validate().map_err(RuntimeError::Config)?;
        Ok(Self {
            config,
            space,
            interp,
            symbols,
            metrics,
            agents: DashMap::new(),
            injector: Injector::new(),
            stealers: RwLock::new(Vec::new()),
            notify: Notify::new(),
            running: AtomicBool::new(false),
            started: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Completed scheduling ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn agent(&self, id: &str) -> Option<Arc<AgentContext>> {
        self.agents.get(id).map(|entry| entry.value().clone())
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Register an agent: creates its identifying symbol and utility atom in
    /// the space, protects both for the agent's lifetime, and seeds the
    /// symbol's STI with `initial_priority`.
    pub fn register_agent(
        &self,
        id: &str,
        game: Arc<dyn Game>,
        goal: Atom,
        max_cycles: Option<u64>,
        initial_priority: f64,
    ) -> Result<Arc<AgentContext>, RuntimeError> {
        match self.agents.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RuntimeError::agent(id, "already registered"))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let symbol = self.space.sym(id);
                let utility = self
                    .space
                    .expr(vec![self.symbols.utility.clone(), symbol.clone()]);
                self.space.add(&symbol);
                self.space.add(&utility);
                self.space.update_value(&symbol, |v| {
                    v.importance.short_term = initial_priority.clamp(0.0, 1.0);
                });
                self.space.protect(&symbol);
                self.space.protect(&utility);

                let agent = Arc::new(AgentContext::new(
                    id.to_string(),
                    symbol,
                    utility,
                    game,
                    goal,
                    max_cycles,
                ));
                entry.insert(Arc::clone(&agent));
                tracing::info!(agent = id, priority = initial_priority, "agent registered");
                Ok(agent)
            }
        }
    }

    /// Remove an agent and lift the forgetting protection on its atoms.
    pub fn unregister_agent(&self, id: &str) -> bool {
        match self.agents.remove(id) {
            Some((_, agent)) => {
                self.space.unprotect(&agent.symbol);
                self.space.unprotect(&agent.utility);
                tracing::info!(agent = id, "agent unregistered");
                true
            }
            None => false,
        }
    }

    /// Current scheduling priority of an agent, read from its symbol.
    pub fn agent_priority(&self, agent: &AgentContext) -> f64 {
        self.space
            .value(&agent.symbol)
            .map(|v| v.importance.combined())
            .unwrap_or(0.0)
    }

    /// One scheduling tick: weighted selection and dispatch.
    ///
    /// Public so embedders (and tests) can step the scheduler manually
    /// instead of running the timer.
    pub fn run_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_tick();

        let mut candidates: Vec<(Arc<AgentContext>, f64)> = Vec::new();
        for entry in self.agents.iter() {
            let agent = entry.value();
            if agent.status().is_terminal() {
                continue;
            }
            let priority = self.agent_priority(agent);
            if priority > 0.0 {
                candidates.push((Arc::clone(agent), priority));
            }
        }

        let selected = weighted_sample(
            &mut rand::thread_rng(),
            candidates,
            self.config.max_cycles_per_tick,
        );
        for agent in selected {
            // At most one outstanding cycle per agent.
            if agent.begin_cycle() {
                self.injector.push(CycleJob { agent });
                self.notify.notify_one();
            }
        }
    }

    /// Number of dispatched-but-unclaimed cycle jobs.
    pub fn queued_jobs(&self) -> usize {
        self.injector.len()
    }

    async fn process(&self, job: CycleJob) {
        let agent = job.agent;
        let result = run_cycle(
            &agent,
            &self.space,
            &self.interp,
            &self.symbols.act,
            &self.metrics,
            self.config.perception_boost,
        )
        .await;

        if let Err(error) = result {
            // AgentFault: contained, logged, and priced into priority.
            agent.record_fault();
            self.metrics.record_fault();
            let penalty = self.config.fault_penalty;
            self.space.update_value(&agent.symbol, |v| {
                v.importance.short_term *= penalty;
            });
            tracing::warn!(agent = %agent.id, error = %error, "agent cycle fault contained");
        }
        agent.end_cycle();
    }

    /// Run all currently queued jobs inline. Together with [`run_tick`]
    /// this gives a deterministic single-threaded stepping mode.
    pub async fn drain_queue(&self) {
        loop {
            match self.injector.steal() {
                Steal::Success(job) => self.process(job).await,
                Steal::Retry => continue,
                Steal::Empty => break,
            }
        }
    }

    /// Step once: tick, then run everything that tick dispatched.
    pub async fn step(&self) {
        self.run_tick();
        self.drain_queue().await;
    }

    fn steal_next(&self, local: &Worker<CycleJob>, worker_id: usize) -> Option<CycleJob> {
        // Local queue first, then the global injector, then other workers.
        if let Some(job) = local.pop() {
            return Some(job);
        }
        match self.injector.steal() {
            Steal::Success(job) => return Some(job),
            Steal::Retry => {
                if let Steal::Success(job) = self.injector.steal() {
                    return Some(job);
                }
            }
            Steal::Empty => {}
        }
        let stealers = self.stealers.read();
        let count = stealers.len();
        for offset in 1..count {
            let target = (worker_id + offset) % count;
            match stealers[target].steal() {
                Steal::Success(job) => return Some(job),
                Steal::Retry => {
                    if let Steal::Success(job) = stealers[target].steal() {
                        return Some(job);
                    }
                }
                Steal::Empty => {}
            }
        }
        None
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize, local: Worker<CycleJob>) {
        tracing::debug!(worker = worker_id, "scheduler worker started");
        loop {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            if let Some(job) = self.steal_next(&local, worker_id) {
                self.process(job).await;
                continue;
            }
            // Idle: wait for a dispatch or re-check after a tick interval.
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(Duration::from_millis(self.config.tick_interval_ms)) => {}
            }
        }
        tracing::debug!(worker = worker_id, "scheduler worker stopped");
    }

    async fn tick_loop(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            self.run_tick();
        }
    }

    /// Spawn the tick task and worker pool. Idempotent; restart after
    /// shutdown is not supported.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        self.running.store(true, Ordering::Release);

        let mut locals = Vec::with_capacity(self.config.workers);
        {
            let mut stealers = self.stealers.write();
            for _ in 0..self.config.workers {
                let worker = Worker::new_fifo();
                stealers.push(worker.stealer());
                locals.push(worker);
            }
        }
        for (worker_id, local) in locals.into_iter().enumerate() {
            let this = Arc::clone(self);
            tokio::spawn(this.worker_loop(worker_id, local));
        }
        let this = Arc::clone(self);
        tokio::spawn(this.tick_loop());
        tracing::info!(workers = self.config.workers, "scheduler started");
    }

    /// Stop scheduling. In-flight cycles finish; no new ones start.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            self.notify.notify_waiters();
            tracing::info!("scheduler shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn weighted_sample_respects_count_and_uniqueness() {
        let mut rng = StdRng::seed_from_u64(7);
        let items = vec![("a", 1.0), ("b", 1.0), ("c", 1.0)];
        let picked = weighted_sample(&mut rng, items, 2);
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0], picked[1]);
    }

    #[test]
    fn weighted_sample_converges_to_priority_ratio() {
        // Agents with priority ratio 4:1 should be picked first roughly
        // 4x as often over many draws.
        let mut rng = StdRng::seed_from_u64(42);
        let mut high = 0u32;
        let trials = 20_000;
        for _ in 0..trials {
            let items = vec![("high", 0.8), ("low", 0.2)];
            if weighted_sample(&mut rng, items, 1)[0] == "high" {
                high += 1;
            }
        }
        let fraction = high as f64 / trials as f64;
        assert!(
            (fraction - 0.8).abs() < 0.02,
            "fraction was {fraction}, expected ~0.8"
        );
    }

    #[test]
    fn weighted_sample_ignores_non_positive_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let items = vec![("dead", 0.0), ("alive", 0.5)];
        let picked = weighted_sample(&mut rng, items, 2);
        // The zero-weight item can only be reached once all weight is gone,
        // at which point selection stops.
        assert_eq!(picked, vec!["alive"]);
    }

    #[test]
    fn config_validation_rejects_zero_workers() {
        let config = SchedulerConfig {
            workers: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
