//! Memory maintenance as an ordinary agent.
//!
//! The maintenance agent's `Game` *is* the atom space: it perceives store
//! pressure, its one action runs an attention sweep, and its reward tracks
//! evictions. Because it rides the same scheduler and priority mechanism as
//! every other agent, maintenance starvation is a real, user-controllable
//! outcome rather than an engine special case.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{Game, GameError, GameResult, StepOutcome};
use crate::attention::{sweep, AttentionConfig};
use crate::metrics::MetricsCollector;
use crate::space::AtomSpace;
use syra_core::Atom;

pub struct MemoryGame {
    config: AttentionConfig,
    metrics: Arc<MetricsCollector>,
}

impl MemoryGame {
    pub fn new(config: AttentionConfig, metrics: Arc<MetricsCollector>) -> Result<Self, GameError> {
        config
            .validate()
            .map_err(GameError::Environment)?;
        Ok(Self { config, metrics })
    }

    /// Store fill ratio, quantized so percept atoms do not accumulate one
    /// per query.
    fn pressure(&self, space: &AtomSpace) -> f64 {
        let ratio = space.len() as f64 / self.config.capacity as f64;
        (ratio * 100.0).round() / 100.0
    }

    fn pressure_atom(&self, space: &AtomSpace) -> Atom {
        space.expr(vec![
            space.sym("memory-pressure"),
            space.float(self.pressure(space)),
        ])
    }
}

#[async_trait]
impl Game for MemoryGame {
    async fn perceive(&self, space: &AtomSpace) -> GameResult<Vec<Atom>> {
        Ok(vec![self.pressure_atom(space)])
    }

    async fn available_actions(
        &self,
        space: &AtomSpace,
        _state: &[Atom],
    ) -> GameResult<Vec<Atom>> {
        Ok(vec![space.expr(vec![space.sym("sweep")])])
    }

    async fn execute(&self, space: &AtomSpace, _action: &Atom) -> GameResult<StepOutcome> {
        let stats = sweep(space, &self.config);
        if !stats.skipped {
            self.metrics.record_sweep(stats.evicted as u64);
        }
        Ok(StepOutcome {
            percepts: vec![self.pressure_atom(space)],
            // Relieving pressure is rewarding; a skipped sweep is mildly
            // negative so the agent's utility reflects contention.
            reward: if stats.skipped {
                -0.1
            } else {
                stats.evicted as f64
            },
        })
    }

    fn is_running(&self) -> bool {
        true
    }
}
