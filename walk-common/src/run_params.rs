use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigError;

/// When the coordinator hands a snapshot to the reporting sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportingPolicy {
    /// Pause for `delay`, then report after every generation.
    EveryGeneration { delay: Duration },
    /// Report only when the elapsed wall clock has crossed into a new whole second.
    OncePerSecond,
}

/// Run parameters derived from the configuration, shared read-only by every task of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub lattice_length: usize,
    pub particle_count: usize,
    pub move_probability: f64,
    pub generation_limit: u32,
    pub reporting: ReportingPolicy,
    pub generation_timeout: Duration,
    pub seed: Option<u64>,
}

impl RunParams {
    /// Checks the ranges every run relies on. Parameters built by
    /// `WalkConfig::run_params` always pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lattice_length == 0 {
            return Err(ConfigError::EmptyLattice);
        }
        if self.particle_count == 0 {
            return Err(ConfigError::NoParticles);
        }
        if !(0.0..=1.0).contains(&self.move_probability) {
            return Err(ConfigError::ProbabilityOutOfRange(self.move_probability));
        }
        if self.generation_limit == 0 {
            return Err(ConfigError::ZeroGenerationLimit);
        }
        if self.generation_timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout(0.0));
        }
        Ok(())
    }

    /// Replaces the generation limit, keeping the rest of the run unchanged.
    pub fn with_generation_limit(mut self, generation_limit: u32) -> Result<Self, ConfigError> {
        if generation_limit == 0 {
            return Err(ConfigError::ZeroGenerationLimit);
        }
        self.generation_limit = generation_limit;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
