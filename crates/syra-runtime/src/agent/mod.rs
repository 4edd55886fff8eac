//! Agents and their external `Game` environments.
//!
//! An agent *is* a symbol in the space: external code tunes urgency by
//! boosting or decaying that symbol's importance, and the scheduler reads
//! its priority from the same place. A cycle is perceive → select action →
//! act → learn, expressed through the store and interpreter.

pub mod maintenance;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use thiserror::Error;

use crate::interp::Interpreter;
use crate::metrics::MetricsCollector;
use crate::space::AtomSpace;
use syra_core::{Atom, Belief};

/// Fault raised by an environment. Contained per-cycle: it penalizes the
/// owning agent and never reaches the scheduler or other agents.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("environment failure: {0}")]
    Environment(String),
    #[error("invalid action {action}: {reason}")]
    InvalidAction { action: String, reason: String },
}

pub type GameResult<T> = Result<T, GameError>;

/// Result of executing one action.
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// Fresh observations caused by the action.
    pub percepts: Vec<Atom>,
    /// Scalar reward signal.
    pub reward: f64,
}

/// External environment capability. Only the operations the core calls;
/// everything else about an environment is the embedder's business.
#[async_trait]
pub trait Game: Send + Sync {
    /// Current observable state as atoms (built through the space's
    /// constructors so they are canonical).
    async fn perceive(&self, space: &AtomSpace) -> GameResult<Vec<Atom>>;

    /// Actions available in the given state.
    async fn available_actions(&self, space: &AtomSpace, state: &[Atom])
        -> GameResult<Vec<Atom>>;

    /// Execute an action, yielding new percepts and a reward.
    async fn execute(&self, space: &AtomSpace, action: &Atom) -> GameResult<StepOutcome>;

    /// False once the environment has ended.
    fn is_running(&self) -> bool;
}

/// Agent lifecycle states. `Running` is the only non-terminal state;
/// terminal agents stop being scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentStatus {
    Running,
    GoalMet,
    EnvironmentEnded,
    MaxCyclesReached,
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AgentStatus::Running)
    }
}

/// Per-agent bookkeeping. Created on registration, dropped on
/// unregistration; at most one cycle is outstanding at any time.
pub struct AgentContext {
    pub id: String,
    /// The agent's identifying symbol in the space; its importance is the
    /// scheduling priority.
    pub symbol: Atom,
    /// `(utility <agent>)` atom accumulating the reward belief.
    pub utility: Atom,
    pub game: Arc<dyn Game>,
    /// Goal pattern; a non-empty query match means the goal is met.
    pub goal: Atom,
    /// `None` means unbounded.
    pub max_cycles: Option<u64>,
    cycles: AtomicU64,
    faults: AtomicU64,
    status: RwLock<AgentStatus>,
    in_flight: AtomicBool,
    last_state: RwLock<Vec<Atom>>,
}

impl AgentContext {
    pub fn new(
        id: String,
        symbol: Atom,
        utility: Atom,
        game: Arc<dyn Game>,
        goal: Atom,
        max_cycles: Option<u64>,
    ) -> Self {
        Self {
            id,
            symbol,
            utility,
            game,
            goal,
            max_cycles,
            cycles: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            status: RwLock::new(AgentStatus::Running),
            in_flight: AtomicBool::new(false),
            last_state: RwLock::new(Vec::new()),
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> AgentStatus {
        *self.status.read()
    }

    pub fn last_state(&self) -> Vec<Atom> {
        self.last_state.read().clone()
    }

    pub(crate) fn set_status(&self, status: AgentStatus) {
        *self.status.write() = status;
    }

    /// Claim the cycle slot. False means a cycle is already outstanding.
    pub(crate) fn begin_cycle(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_cycle(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }
}

/// Squash an unbounded reward into belief-strength range.
fn reward_strength(reward: f64) -> f64 {
    0.5 + 0.5 * reward.tanh()
}

/// Rule-driven action selection with a uniform-random default.
///
/// The store is consulted through `(act <agent>)`: if evaluation produces
/// one of the available actions, that wins; otherwise pick uniformly.
fn select_action(
    space: &AtomSpace,
    interp: &Interpreter,
    act_symbol: &Atom,
    agent: &AgentContext,
    actions: &[Atom],
) -> Option<Atom> {
    if actions.is_empty() {
        return None;
    }
    let probe = space.expr(vec![act_symbol.clone(), agent.symbol.clone()]);
    for result in interp.eval(&probe) {
        if actions.contains(&result) {
            return Some(result);
        }
    }
    let index = rand::thread_rng().gen_range(0..actions.len());
    Some(actions[index].clone())
}

/// One perceive → select → act → learn cycle.
///
/// Percepts are asserted and boosted; the reward is folded into the agent's
/// utility belief with the commutative revision, so concurrent cycles of
/// different agents interleave safely. Terminal conditions are re-checked
/// at the end of every cycle.
pub(crate) async fn run_cycle(
    agent: &AgentContext,
    space: &AtomSpace,
    interp: &Interpreter,
    act_symbol: &Atom,
    metrics: &MetricsCollector,
    perception_boost: f64,
) -> GameResult<()> {
    let cycle = agent.cycles.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::debug!(agent = %agent.id, cycle, "agent cycle start");

    // Perceive.
    let percepts = agent.game.perceive(space).await?;
    for percept in &percepts {
        space.add(percept);
        space.update_value(percept, |v| v.importance.boost(perception_boost));
    }
    *agent.last_state.write() = percepts.clone();

    // Select and act.
    let actions = agent.game.available_actions(space, &percepts).await?;
    if let Some(action) = select_action(space, interp, act_symbol, agent, &actions) {
        let outcome = agent.game.execute(space, &action).await?;
        for percept in &outcome.percepts {
            space.add(percept);
            space.update_value(percept, |v| v.importance.boost(perception_boost));
        }
        if !outcome.percepts.is_empty() {
            *agent.last_state.write() = outcome.percepts;
        }

        // Learn: fold the reward into the utility belief.
        space.add(&agent.utility);
        let sample = Belief::new(reward_strength(outcome.reward), 1.0);
        space.update_value(&agent.utility, |v| v.belief = v.belief.revise(&sample));
    }

    // Terminal checks.
    if !space.query(&agent.goal).is_empty() {
        agent.set_status(AgentStatus::GoalMet);
        tracing::info!(agent = %agent.id, cycle, "goal met");
    } else if !agent.game.is_running() {
        agent.set_status(AgentStatus::EnvironmentEnded);
        tracing::info!(agent = %agent.id, cycle, "environment ended");
    } else if agent.max_cycles.is_some_and(|max| cycle >= max) {
        agent.set_status(AgentStatus::MaxCyclesReached);
        tracing::info!(agent = %agent.id, cycle, "max cycles reached");
    }

    metrics.record_cycle();
    Ok(())
}
