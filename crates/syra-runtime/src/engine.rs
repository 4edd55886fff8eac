//! Engine facade: configuration, canonical symbols, and the public API.
//!
//! Every operator the runtime treats specially is still just an atom; the
//! [`EngineSymbols`] struct makes those canonical atoms explicit fields on
//! one object created at startup instead of hidden global state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::maintenance::MemoryGame;
use crate::agent::{AgentContext, Game};
use crate::attention::AttentionConfig;
use crate::interp::{EvalConfig, GroundedFn, Interpreter};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::scheduler::{AgentScheduler, SchedulerConfig};
use crate::space::{Answer, AtomSpace, SpaceConfig};
use syra_core::{parse_all, parse_one, Atom, ParseError, RuntimeError};

/// Reserved id for the built-in maintenance agent.
pub const MAINTENANCE_AGENT_ID: &str = "memory";

/// Canonical structural/control symbols, interned once at startup.
pub struct EngineSymbols {
    /// Rule equality: `(= pattern template)`.
    pub eq: Atom,
    /// Action-selection hook: `(act <agent>)`.
    pub act: Atom,
    /// Per-agent utility head: `(utility <agent>)`.
    pub utility: Atom,
    /// Maintenance action and percept heads.
    pub sweep: Atom,
    pub memory_pressure: Atom,
    /// Internal variables used to query rules; the double-underscore names
    /// keep them out of the way of ordinary programs.
    pub rule_lhs: Atom,
    pub rule_rhs: Atom,
}

impl EngineSymbols {
    pub fn new(space: &AtomSpace) -> Self {
        Self {
            eq: space.sym("="),
            act: space.sym("act"),
            utility: space.sym("utility"),
            sweep: space.sym("sweep"),
            memory_pressure: space.sym("memory-pressure"),
            rule_lhs: space.var("__rule_lhs"),
            rule_rhs: space.var("__rule_rhs"),
        }
    }

    /// The fixed allow-list protected from forgetting.
    pub fn protected(&self) -> [&Atom; 5] {
        [
            &self.eq,
            &self.act,
            &self.utility,
            &self.sweep,
            &self.memory_pressure,
        ]
    }
}

/// Aggregated engine configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub space: SpaceConfig,
    pub attention: AttentionConfig,
    pub eval: EvalConfig,
    pub scheduler: SchedulerConfig,
    /// Install a global tracing subscriber on construction.
    pub enable_tracing: bool,
    /// Extra symbol names to protect from forgetting.
    pub protected_symbols: Vec<String>,
}

impl EngineConfig {
    /// Compact configuration for tests: small store, fast ticks, no
    /// tracing subscriber.
    pub fn for_testing() -> Self {
        Self {
            attention: AttentionConfig {
                capacity: 512,
                ..AttentionConfig::default()
            },
            scheduler: SchedulerConfig {
                tick_interval_ms: 5,
                ..SchedulerConfig::default()
            },
            enable_tracing: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.space.validate().map_err(RuntimeError::Config)?;
        self.attention.validate().map_err(RuntimeError::Config)?;
        self.eval.validate().map_err(RuntimeError::Config)?;
        self.scheduler.validate().map_err(RuntimeError::Config)?;
        Ok(())
    }
}

/// The assembled runtime: space + interpreter + scheduler behind one API.
pub struct Engine {
    config: EngineConfig,
    space: Arc<AtomSpace>,
    symbols: Arc<EngineSymbols>,
    metrics: Arc<MetricsCollector>,
    interpreter: Arc<Interpreter>,
    scheduler: Arc<AgentScheduler>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, RuntimeError> {
        if config.enable_tracing {
            // Ignore failure if a subscriber is already installed.
            tracing_subscriber::fmt()
                .with_target(false)
                .with_level(true)
                .try_init()
                .ok();
        }
        config.validate()?;

        let space = Arc::new(AtomSpace::new(config.space.clone())?);
        let symbols = Arc::new(EngineSymbols::new(&space));

        // Seed and protect the structural allow-list.
        for atom in symbols.protected() {
            space.add(atom);
            space.protect(atom);
        }
        for name in &config.protected_symbols {
            let atom = space.sym(name);
            space.add(&atom);
            space.protect(&atom);
        }

        let metrics = Arc::new(MetricsCollector::new());
        let interpreter = Arc::new(Interpreter::new(
            Arc::clone(&space),
            Arc::clone(&symbols),
            Arc::clone(&metrics),
            config.eval,
        )?);
        let scheduler = Arc::new(AgentScheduler::new(
            config.scheduler.clone(),
            Arc::clone(&space),
            Arc::clone(&interpreter),
            Arc::clone(&symbols),
            Arc::clone(&metrics),
        )?);

        tracing::info!("engine initialized");
        Ok(Self {
            config,
            space,
            symbols,
            metrics,
            interpreter,
            scheduler,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn space(&self) -> &Arc<AtomSpace> {
        &self.space
    }

    pub fn symbols(&self) -> &EngineSymbols {
        &self.symbols
    }

    pub fn interpreter(&self) -> &Arc<Interpreter> {
        &self.interpreter
    }

    pub fn scheduler(&self) -> &Arc<AgentScheduler> {
        &self.scheduler
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // -- Parsing ----------------------------------------------------------

    pub fn parse_one(&self, text: &str) -> Result<Atom, ParseError> {
        parse_one(self.space.interner(), text)
    }

    pub fn parse_all(&self, text: &str) -> Result<Vec<Atom>, ParseError> {
        parse_all(self.space.interner(), text)
    }

    // -- Store ------------------------------------------------------------

    pub fn add(&self, atom: &Atom) -> Atom {
        self.space.add(atom)
    }

    pub fn query(&self, pattern: &Atom) -> Vec<Answer> {
        self.metrics.record_query();
        self.space.query(pattern)
    }

    // -- Evaluation -------------------------------------------------------

    pub fn eval(&self, atom: &Atom) -> Vec<Atom> {
        self.interpreter.eval(atom)
    }

    pub fn eval_with_depth(&self, atom: &Atom, depth: usize) -> Vec<Atom> {
        self.interpreter.eval_with_depth(atom, depth)
    }

    pub fn eval_best(&self, atom: &Atom) -> Atom {
        self.interpreter.eval_best(atom)
    }

    pub fn register_function(&self, name: &str, f: GroundedFn) {
        self.interpreter.register_function(name, f);
    }

    // -- Agents -----------------------------------------------------------

    /// Register an agent with the default initial priority.
    pub fn register_agent(
        &self,
        id: &str,
        game: Arc<dyn Game>,
        goal: Atom,
        max_cycles: Option<u64>,
    ) -> Result<Arc<AgentContext>, RuntimeError> {
        self.register_agent_with_priority(id, game, goal, max_cycles, 0.5)
    }

    pub fn register_agent_with_priority(
        &self,
        id: &str,
        game: Arc<dyn Game>,
        goal: Atom,
        max_cycles: Option<u64>,
        priority: f64,
    ) -> Result<Arc<AgentContext>, RuntimeError> {
        self.scheduler
            .register_agent(id, game, goal, max_cycles, priority)
    }

    pub fn unregister_agent(&self, id: &str) -> bool {
        self.scheduler.unregister_agent(id)
    }

    /// Tune an agent's urgency by setting its symbol's STI directly.
    pub fn set_agent_priority(&self, id: &str, priority: f64) -> bool {
        match self.scheduler.agent(id) {
            Some(agent) => self.space.update_value(&agent.symbol, |v| {
                v.importance.short_term = priority.clamp(0.0, 1.0);
            }),
            None => false,
        }
    }

    /// Register the built-in maintenance agent whose game is the memory
    /// itself. Same scheduler, same priority mechanism: starve it and the
    /// store stops being cleaned.
    pub fn register_maintenance_agent(
        &self,
        priority: f64,
    ) -> Result<Arc<AgentContext>, RuntimeError> {
        let game = MemoryGame::new(self.config.attention.clone(), Arc::clone(&self.metrics))
            .map_err(|e| RuntimeError::agent(MAINTENANCE_AGENT_ID, e.to_string()))?;
        // The goal never matches unless the user asserts (halt-maintenance).
        let goal = self.space.expr(vec![self.space.sym("halt-maintenance")]);
        self.register_agent_with_priority(
            MAINTENANCE_AGENT_ID,
            Arc::new(game),
            goal,
            None,
            priority,
        )
    }

    // -- Lifecycle --------------------------------------------------------

    pub fn start(&self) {
        self.scheduler.start();
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}
