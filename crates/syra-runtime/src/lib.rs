//! SYRA runtime: atom space, attention, interpreter, agents, scheduler.
//!
//! The [`engine::Engine`] facade wires the subsystems together and is the
//! intended entry point; the individual modules are public for embedders
//! that want finer control.

pub mod agent;
pub mod attention;
pub mod engine;
pub mod interp;
pub mod metrics;
pub mod scheduler;
pub mod space;

pub use agent::maintenance::MemoryGame;
pub use agent::{AgentContext, AgentStatus, Game, GameError, GameResult, StepOutcome};
pub use attention::{sweep, AttentionConfig, SweepStats};
pub use engine::{Engine, EngineConfig, EngineSymbols, MAINTENANCE_AGENT_ID};
pub use interp::{EvalConfig, GroundedFn, Interpreter};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use scheduler::{AgentScheduler, SchedulerConfig};
pub use space::{Answer, AtomSpace, SpaceConfig};

// Re-export the core term model so embedders need a single dependency.
pub use syra_core::{
    parse_all, parse_one, substitute, unify, Atom, AtomId, AtomKind, AtomValue, Belief, Bindings,
    GroundedValue, Importance, Interner, ParseError, RuntimeError,
};
