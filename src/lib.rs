//! Synchronized random walk of K particles on a 1-D lattice.
//!
//! Each particle runs on its own thread and every generation ends at a
//! barrier: the coordinator waits for all particles, checks and reports the
//! lattice, then releases everyone into the next generation.

pub mod cancel;
pub mod coordinator;
pub mod error;
pub mod lattice;
pub mod output;
pub mod report;
pub mod simulation;
pub mod step;
pub mod tracker;
pub mod worker;

pub use cancel::CancellationToken;
pub use coordinator::{Coordinator, CoordinatorState};
pub use error::{WalkError, WalkResult};
pub use lattice::Lattice;
pub use report::{LogSink, RecordingSink, ReportSink, TeeSink};
pub use simulation::{RunSummary, WalkSimulation};
pub use step::{reflect, Direction, Stepper};
pub use tracker::GenerationTracker;
pub use worker::ParticleWorker;
