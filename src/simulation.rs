use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::Instant;

use crate::cancel::CancellationToken;
use crate::coordinator::Coordinator;
use crate::error::{WalkError, WalkResult};
use crate::lattice::Lattice;
use crate::report::ReportSink;
use crate::tracker::GenerationTracker;
use crate::worker::ParticleWorker;
use walk_common::{FinalReport, RunParams};

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub report: FinalReport,
    /// Final cell of each particle, indexed by particle.
    pub final_positions: Vec<usize>,
    /// Seed the per-particle generators were derived from.
    pub seed: u64,
}

/// Starts the particle workers and the coordinator for one run and waits for them.
#[derive(Debug, Clone)]
pub struct WalkSimulation {
    params: RunParams,
    seed: u64,
}

impl WalkSimulation {
    /// Validates `params` and fixes the run's seed, drawing one if none was configured.
    pub fn new(params: RunParams) -> WalkResult<Self> {
        params.validate()?;
        u32::try_from(params.particle_count).map_err(|_| {
            WalkError::ContractViolation(format!(
                "particle count {} does not fit a cell counter",
                params.particle_count
            ))
        })?;

        let seed = match params.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::rng().random();
                info!("No seed configured, using {}", seed);
                seed
            }
        };
        Ok(Self { params, seed })
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// One generator seed per particle, derived from the run seed.
    fn particle_seeds(&self) -> Vec<u64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.params.particle_count).map(|_| rng.random()).collect()
    }

    pub fn run<S: ReportSink + Send + ?Sized>(&self, sink: &mut S) -> WalkResult<RunSummary> {
        self.run_with_cancellation(sink, CancellationToken::new())
    }

    /// Runs the walk until the generation limit, a fault, or `cancel` fires.
    pub fn run_with_cancellation<S: ReportSink + Send + ?Sized>(
        &self,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> WalkResult<RunSummary> {
        let params = &self.params;
        let lattice = Lattice::from_params(params)?;
        let tracker = GenerationTracker::new(params.particle_count, cancel);

        let workers = self
            .particle_seeds()
            .into_iter()
            .enumerate()
            .map(|(index, seed)| ParticleWorker::new(index, params, &lattice, &tracker, seed))
            .collect::<WalkResult<Vec<_>>>()?;

        info!(
            "Starting {} particles on {} cells for {} generations (seed {}).",
            params.particle_count, params.lattice_length, params.generation_limit, self.seed
        );
        debug!("Run parameters: {:#?}", params);
        let started = Instant::now();

        thread::scope(|scope| {
            let lattice = &lattice;
            let tracker = &tracker;
            let mut errors = Vec::new();

            let mut worker_handles = Vec::with_capacity(workers.len());
            for worker in workers {
                let name = format!("particle-{}", worker.index());
                match thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(scope, move || worker.run())
                {
                    Ok(handle) => worker_handles.push((name, handle)),
                    Err(source) => {
                        tracker.cancel();
                        errors.push(WalkError::Spawn { name, source });
                        break;
                    }
                }
            }

            let coordinator = Coordinator::new(params, lattice, tracker, sink, started);
            let coordinator_result = match thread::Builder::new()
                .name("coordinator".to_string())
                .spawn_scoped(scope, move || coordinator.run())
            {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(WalkError::TaskPanicked("coordinator".to_string()))),
                Err(source) => {
                    tracker.cancel();
                    Err(WalkError::Spawn { name: "coordinator".to_string(), source })
                }
            };

            let mut final_positions = Vec::with_capacity(worker_handles.len());
            for (name, handle) in worker_handles {
                match handle.join() {
                    Ok(Ok(position)) => final_positions.push(position),
                    Ok(Err(e)) => errors.push(e),
                    Err(_) => errors.push(WalkError::TaskPanicked(name)),
                }
            }

            match coordinator_result {
                Ok(report) if errors.is_empty() => Ok(RunSummary {
                    report,
                    final_positions,
                    seed: self.seed,
                }),
                Ok(_) => Err(first_fault(errors)),
                Err(e) => {
                    errors.insert(0, e);
                    Err(first_fault(errors))
                }
            }
        })
    }
}

/// Picks the error that caused a failed run. Cancellations are only the echo
/// of another task's fault, so any other error wins over them.
fn first_fault(errors: Vec<WalkError>) -> WalkError {
    errors
        .into_iter()
        .find(|e| !e.is_cancelled())
        .unwrap_or(WalkError::Cancelled)
}
