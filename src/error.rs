use std::time::Duration;
use thiserror::Error;
use walk_common::ConfigError;

/// Faults raised while a walk is running.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("invalid run parameters: {0}")]
    Config(#[from] ConfigError),

    /// A caller broke an operation's preconditions. Always a bug, never retried.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Shared state no longer matches the run's invariants.
    #[error("invariant violation in generation {generation}: {detail}; lattice state: {cell_counts:?}")]
    InvariantViolation {
        generation: u32,
        detail: String,
        cell_counts: Vec<u32>,
    },

    #[error("generation {generation} timed out after {timeout:?}: {arrived}/{expected} particles arrived")]
    GenerationTimeout {
        generation: u32,
        arrived: usize,
        expected: usize,
        timeout: Duration,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} thread panicked")]
    TaskPanicked(String),
}

impl WalkError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WalkError::Cancelled)
    }
}

pub type WalkResult<T> = Result<T, WalkError>;
