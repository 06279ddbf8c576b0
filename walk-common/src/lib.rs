pub mod config;
pub mod run_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{ConfigError, LatticeConfig, OutputConfig, ReportCadence, ReportingConfig, RunConfig, RunMode, WalkConfig};
pub use run_params::{ReportingPolicy, RunParams};
pub use snapshot::{FinalReport, Snapshot};
