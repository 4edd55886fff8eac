//! Runtime error types shared across the workspace.
//!
//! Negative results (unification failure, a grounded function declining to
//! fire, an empty query) are plain data, not errors. These variants cover
//! genuine misuse (bad configuration, duplicate registration) and contained
//! per-agent faults.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("space error: {0}")]
    Space(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("agent '{id}': {message}")]
    Agent { id: String, message: String },
}

impl RuntimeError {
    pub fn agent(id: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::Agent {
            id: id.into(),
            message: message.into(),
        }
    }
}
