use log::{error, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{WalkError, WalkResult};
use crate::lattice::Lattice;
use crate::step::Stepper;
use crate::tracker::GenerationTracker;
use walk_common::RunParams;

/// Cancels the run if the owning thread unwinds, so no one waits on a dead task.
pub(crate) struct CancelOnPanic<'a>(pub(crate) &'a GenerationTracker);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.cancel();
        }
    }
}

/// Drives one particle through every generation of a run.
///
/// The position is private to the worker; the lattice only ever sees it
/// through `transfer`.
pub struct ParticleWorker<'a> {
    index: usize,
    position: usize,
    generation_limit: u32,
    stepper: Stepper,
    rng: StdRng,
    lattice: &'a Lattice,
    tracker: &'a GenerationTracker,
}

impl<'a> ParticleWorker<'a> {
    /// Creates the worker for particle `index`, starting in cell 0.
    pub fn new(
        index: usize,
        params: &RunParams,
        lattice: &'a Lattice,
        tracker: &'a GenerationTracker,
        seed: u64,
    ) -> WalkResult<Self> {
        Ok(Self {
            index,
            position: 0,
            generation_limit: params.generation_limit,
            stepper: Stepper::new(lattice.length(), params.move_probability)?,
            rng: StdRng::seed_from_u64(seed),
            lattice,
            tracker,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Runs every generation and returns the final position.
    ///
    /// On failure the whole run is cancelled before the error is returned.
    pub fn run(mut self) -> WalkResult<usize> {
        let _guard = CancelOnPanic(self.tracker);
        let result = self.run_generations();
        if let Err(e) = &result {
            if !e.is_cancelled() {
                error!("Particle {} failed: {}", self.index, e);
                self.tracker.cancel();
            }
        }
        result
    }

    fn run_generations(&mut self) -> WalkResult<usize> {
        for generation in 1..=self.generation_limit {
            self.tracker.cancellation().check()?;
            self.advance(generation)?;

            let released_into = self.tracker.arrive(self.index)?;
            if released_into != generation {
                return Err(WalkError::ContractViolation(format!(
                    "particle {} finished generation {} but was released into epoch {}",
                    self.index, generation, released_into
                )));
            }
        }
        Ok(self.position)
    }

    /// Moves the particle for one generation.
    fn advance(&mut self, generation: u32) -> WalkResult<()> {
        let next = self.stepper.step(self.position, &mut self.rng);
        if next >= self.stepper.length() {
            return Err(self.lattice.invariant_violation(
                generation,
                format!(
                    "particle {} stepped to {} outside [0, {})",
                    self.index,
                    next,
                    self.lattice.length()
                ),
            ));
        }

        if next != self.position {
            self.lattice.transfer(self.position, next)?;
            trace!("Particle {} moved {} -> {} in generation {}", self.index, self.position, next, generation);
        }
        self.position = next;
        Ok(())
    }
}
