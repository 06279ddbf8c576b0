use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::run_params::{ReportingPolicy, RunParams};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// Lattice geometry and particle population
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    pub length: u32,
    pub particles: u32,
    /// Probability of a move to the right on each generation.
    pub move_probability: f64,
}

/// How the length of a run is bounded.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunMode {
    /// Runs for `floor(execution_seconds / delay_seconds)` generations,
    /// pausing `delay_seconds` before every report.
    TimeBounded {
        execution_seconds: f64,
        delay_seconds: f64,
    },
    IterationBounded {
        generation_limit: u32,
    },
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCadence {
    EveryGeneration,
    OncePerSecond,
}

// Reporting overrides. Both fields fall back to the mode's defaults.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ReportingConfig {
    #[serde(default)]
    pub cadence: Option<ReportCadence>,
    #[serde(default)]
    pub delay_seconds: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    #[serde(default)]
    pub seed: Option<u64>,
    /// Upper bound on how long the coordinator waits for one generation to complete.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            seed: None,
            generation_timeout_secs: default_generation_timeout(),
        }
    }
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_stats: bool,
    pub save_positions: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: String::from("lattice_walk"),
            save_stats: false,
            save_positions: false,
            format: None,
        }
    }
}

fn default_generation_timeout() -> f64 {
    30.0
}

/// Rejected configuration values. Raised before any worker is spawned.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("lattice length must be greater than 0")]
    EmptyLattice,
    #[error("particle count must be greater than 0")]
    NoParticles,
    #[error("move probability {0} is outside [0, 1]")]
    ProbabilityOutOfRange(f64),
    #[error("execution_seconds must be positive, got {0}")]
    NonPositiveExecutionTime(f64),
    #[error("delay_seconds must be positive, got {0}")]
    NonPositiveDelay(f64),
    #[error("running {execution_seconds}s with a {delay_seconds}s delay yields zero generations")]
    ZeroGenerations {
        execution_seconds: f64,
        delay_seconds: f64,
    },
    #[error("running {execution_seconds}s with a {delay_seconds}s delay needs more generations than a run can count")]
    TooManyGenerations {
        execution_seconds: f64,
        delay_seconds: f64,
    },
    #[error("generation_limit must be greater than 0")]
    ZeroGenerationLimit,
    #[error("generation_timeout_secs must be positive, got {0}")]
    NonPositiveTimeout(f64),
    #[error("reporting delay_seconds must be a finite non-negative number, got {0}")]
    InvalidReportingDelay(f64),
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WalkConfig {
    pub lattice: LatticeConfig,
    pub mode: RunMode,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl WalkConfig {
    /// Loads and validates the configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;

        Ok(config)
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: WalkConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lattice.length == 0 {
            return Err(ConfigError::EmptyLattice);
        }
        if self.lattice.particles == 0 {
            return Err(ConfigError::NoParticles);
        }
        let p = self.lattice.move_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::ProbabilityOutOfRange(p));
        }

        match self.mode {
            RunMode::TimeBounded { execution_seconds, delay_seconds } => {
                if !(execution_seconds > 0.0 && execution_seconds.is_finite()) {
                    return Err(ConfigError::NonPositiveExecutionTime(execution_seconds));
                }
                if !(delay_seconds > 0.0 && delay_seconds.is_finite()) {
                    return Err(ConfigError::NonPositiveDelay(delay_seconds));
                }
                if timed_generations(execution_seconds, delay_seconds)? == 0 {
                    return Err(ConfigError::ZeroGenerations { execution_seconds, delay_seconds });
                }
            }
            RunMode::IterationBounded { generation_limit } => {
                if generation_limit == 0 {
                    return Err(ConfigError::ZeroGenerationLimit);
                }
            }
        }

        let timeout = self.run.generation_timeout_secs;
        if !(timeout > 0.0 && timeout.is_finite()) {
            return Err(ConfigError::NonPositiveTimeout(timeout));
        }
        if let Some(delay) = self.reporting.delay_seconds {
            if !(delay >= 0.0 && delay.is_finite()) {
                return Err(ConfigError::InvalidReportingDelay(delay));
            }
        }
        Ok(())
    }

    /// Number of generations the run advances through.
    pub fn generation_limit(&self) -> Result<u32, ConfigError> {
        match self.mode {
            RunMode::TimeBounded { execution_seconds, delay_seconds } => {
                timed_generations(execution_seconds, delay_seconds)
            }
            RunMode::IterationBounded { generation_limit } => Ok(generation_limit),
        }
    }

    /// Converts the configuration into the parameters used at runtime.
    pub fn run_params(&self) -> Result<RunParams, ConfigError> {
        self.validate()?;

        let mode_delay = match self.mode {
            RunMode::TimeBounded { delay_seconds, .. } => delay_seconds,
            RunMode::IterationBounded { .. } => 0.0,
        };
        let delay_seconds = self.reporting.delay_seconds.unwrap_or(mode_delay);
        let delay = Duration::try_from_secs_f64(delay_seconds)
            .map_err(|_| ConfigError::InvalidReportingDelay(delay_seconds))?;
        let generation_timeout = Duration::try_from_secs_f64(self.run.generation_timeout_secs)
            .map_err(|_| ConfigError::NonPositiveTimeout(self.run.generation_timeout_secs))?;

        let cadence = self.reporting.cadence.unwrap_or(match self.mode {
            RunMode::TimeBounded { .. } => ReportCadence::EveryGeneration,
            RunMode::IterationBounded { .. } => ReportCadence::OncePerSecond,
        });
        let reporting = match cadence {
            ReportCadence::EveryGeneration => ReportingPolicy::EveryGeneration { delay },
            ReportCadence::OncePerSecond => ReportingPolicy::OncePerSecond,
        };

        Ok(RunParams {
            lattice_length: self.lattice.length as usize,
            particle_count: self.lattice.particles as usize,
            move_probability: self.lattice.move_probability,
            generation_limit: self.generation_limit()?,
            reporting,
            generation_timeout,
            seed: self.run.seed,
        })
    }
}

/// `floor(execution_seconds / delay_seconds)`, where a quotient within rounding
/// error of a whole number counts as that number (0.3 / 0.1 is 3, not 2).
fn timed_generations(execution_seconds: f64, delay_seconds: f64) -> Result<u32, ConfigError> {
    let ratio = execution_seconds / delay_seconds;
    let nearest = ratio.round();
    let generations = if (ratio - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest
    } else {
        ratio.floor()
    };
    if generations.is_nan() || generations > u32::MAX as f64 {
        return Err(ConfigError::TooManyGenerations { execution_seconds, delay_seconds });
    }
    Ok(generations as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITERATION_CONFIG: &str = r#"
        [lattice]
        length = 5
        particles = 10
        move_probability = 0.5

        [mode]
        kind = "iteration_bounded"
        generation_limit = 3
    "#;

    fn parse(s: &str) -> WalkConfig {
        toml::from_str(s).expect("test config should parse")
    }

    #[test]
    fn iteration_mode_defaults_to_once_per_second() {
        let config = WalkConfig::from_toml_str(ITERATION_CONFIG).unwrap();
        let params = config.run_params().unwrap();
        assert_eq!(params.lattice_length, 5);
        assert_eq!(params.particle_count, 10);
        assert_eq!(params.generation_limit, 3);
        assert_eq!(params.reporting, ReportingPolicy::OncePerSecond);
        assert_eq!(params.generation_timeout, Duration::from_secs(30));
        assert_eq!(params.seed, None);
    }

    #[test]
    fn time_mode_floors_generation_count() {
        let config = parse(
            r#"
            [lattice]
            length = 4
            particles = 2
            move_probability = 0.7

            [mode]
            kind = "time_bounded"
            execution_seconds = 2.5
            delay_seconds = 1.0
        "#,
        );
        assert_eq!(config.generation_limit(), Ok(2));
        let params = config.run_params().unwrap();
        assert_eq!(
            params.reporting,
            ReportingPolicy::EveryGeneration { delay: Duration::from_secs(1) }
        );
    }

    #[test]
    fn time_mode_counts_decimal_quotients_exactly() {
        let mut config = parse(ITERATION_CONFIG);
        for (execution_seconds, delay_seconds, expected) in
            [(0.3, 0.1, 3), (0.6, 0.2, 3), (0.7, 0.1, 7), (0.35, 0.1, 3), (0.29, 0.1, 2)]
        {
            config.mode = RunMode::TimeBounded { execution_seconds, delay_seconds };
            assert_eq!(
                config.generation_limit(),
                Ok(expected),
                "{}s / {}s",
                execution_seconds,
                delay_seconds
            );
            assert_eq!(config.run_params().unwrap().generation_limit, expected);
        }
    }

    #[test]
    fn time_mode_rejects_more_generations_than_a_counter_holds() {
        let mut config = parse(ITERATION_CONFIG);
        config.mode = RunMode::TimeBounded { execution_seconds: 1e10, delay_seconds: 1e-3 };
        assert!(matches!(config.validate(), Err(ConfigError::TooManyGenerations { .. })));
        assert!(matches!(config.run_params(), Err(ConfigError::TooManyGenerations { .. })));

        config.mode = RunMode::TimeBounded { execution_seconds: u32::MAX as f64, delay_seconds: 1.0 };
        assert_eq!(config.generation_limit(), Ok(u32::MAX));
    }

    #[test]
    fn reporting_section_overrides_mode_defaults() {
        let config = parse(&format!(
            "{}\n[reporting]\ncadence = \"every_generation\"\ndelay_seconds = 0.0\n[run]\nseed = 7\n",
            ITERATION_CONFIG
        ));
        let params = config.run_params().unwrap();
        assert_eq!(params.reporting, ReportingPolicy::EveryGeneration { delay: Duration::ZERO });
        assert_eq!(params.seed, Some(7));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = parse(ITERATION_CONFIG);
        config.lattice.length = 0;
        assert_eq!(config.validate(), Err(ConfigError::EmptyLattice));

        let mut config = parse(ITERATION_CONFIG);
        config.lattice.particles = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoParticles));

        let mut config = parse(ITERATION_CONFIG);
        config.lattice.move_probability = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::ProbabilityOutOfRange(1.5)));

        let mut config = parse(ITERATION_CONFIG);
        config.lattice.move_probability = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::ProbabilityOutOfRange(_))));

        let mut config = parse(ITERATION_CONFIG);
        config.mode = RunMode::IterationBounded { generation_limit: 0 };
        assert_eq!(config.validate(), Err(ConfigError::ZeroGenerationLimit));

        let mut config = parse(ITERATION_CONFIG);
        config.mode = RunMode::TimeBounded { execution_seconds: 0.5, delay_seconds: 1.0 };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroGenerations { .. })));

        let mut config = parse(ITERATION_CONFIG);
        config.mode = RunMode::TimeBounded { execution_seconds: 1.0, delay_seconds: 0.0 };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveDelay(0.0)));

        let mut config = parse(ITERATION_CONFIG);
        config.run.generation_timeout_secs = -1.0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveTimeout(-1.0)));
    }

    #[test]
    fn probability_bounds_are_inclusive() {
        for p in [0.0, 1.0] {
            let mut config = parse(ITERATION_CONFIG);
            config.lattice.move_probability = p;
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn from_toml_str_reports_validation_failure() {
        let err = WalkConfig::from_toml_str(&ITERATION_CONFIG.replace("particles = 10", "particles = 0"))
            .unwrap_err();
        assert!(err.to_string().contains("particle count"));
    }
}
