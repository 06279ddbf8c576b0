use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::cancel::{CancellationToken, WAKE_CHECK_INTERVAL};
use crate::error::{WalkError, WalkResult};

#[derive(Debug)]
struct TrackerState {
    /// `completion_flags[i]` is set once particle `i` finished its move this generation.
    completion_flags: Vec<bool>,
    arrived: usize,
    /// Number of generations released so far. Workers wait for it to advance.
    epoch: u32,
}

/// Reusable generation barrier between the particle workers and the coordinator.
///
/// Workers call [`arrive`](Self::arrive) and block until the coordinator,
/// having seen every flag set through [`wait_all_arrived`](Self::wait_all_arrived),
/// calls [`release`](Self::release). Reset and wake-up happen under one lock,
/// so a released worker always sees a clean set of flags.
#[derive(Debug)]
pub struct GenerationTracker {
    state: Mutex<TrackerState>,
    all_arrived: Condvar,
    released: Condvar,
    cancel: CancellationToken,
}

impl GenerationTracker {
    pub fn new(particle_count: usize, cancel: CancellationToken) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                completion_flags: vec![false; particle_count],
                arrived: 0,
                epoch: 0,
            }),
            all_arrived: Condvar::new(),
            released: Condvar::new(),
            cancel,
        }
    }

    fn lock(&self) -> WalkResult<MutexGuard<'_, TrackerState>> {
        self.state
            .lock()
            .map_err(|_| WalkError::LockPoisoned("generation tracker"))
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels the run and wakes every task blocked on the barrier.
    pub fn cancel(&self) {
        self.cancel.cancel();
        let _state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.all_arrived.notify_all();
        self.released.notify_all();
    }

    /// Marks `index` as done with the current generation and blocks until released.
    ///
    /// Returns the epoch the worker was released into, which is the number of
    /// generations completed so far.
    pub fn arrive(&self, index: usize) -> WalkResult<u32> {
        let mut state = self.lock()?;
        let expected = state.completion_flags.len();
        match state.completion_flags.get(index) {
            None => {
                return Err(WalkError::ContractViolation(format!(
                    "particle {} arrived at a barrier sized for {}",
                    index, expected
                )))
            }
            Some(true) => {
                return Err(WalkError::ContractViolation(format!(
                    "particle {} arrived twice in generation {}",
                    index,
                    state.epoch + 1
                )))
            }
            Some(false) => {}
        }
        self.cancel.check()?;

        state.completion_flags[index] = true;
        state.arrived += 1;
        if state.arrived == expected {
            self.all_arrived.notify_all();
        }

        let epoch = state.epoch;
        while state.epoch == epoch {
            self.cancel.check()?;
            let (guard, _) = self
                .released
                .wait_timeout(state, WAKE_CHECK_INTERVAL)
                .map_err(|_| WalkError::LockPoisoned("generation tracker"))?;
            state = guard;
        }
        Ok(state.epoch)
    }

    /// Blocks until every particle has arrived for the current generation.
    ///
    /// Fails with [`WalkError::GenerationTimeout`] after `timeout`, or
    /// [`WalkError::Cancelled`] once the run is cancelled.
    pub fn wait_all_arrived(&self, timeout: Duration) -> WalkResult<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock()?;
        while state.arrived < state.completion_flags.len() {
            self.cancel.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Err(WalkError::GenerationTimeout {
                    generation: state.epoch + 1,
                    arrived: state.arrived,
                    expected: state.completion_flags.len(),
                    timeout,
                });
            }
            let (guard, _) = self
                .all_arrived
                .wait_timeout(state, (deadline - now).min(WAKE_CHECK_INTERVAL))
                .map_err(|_| WalkError::LockPoisoned("generation tracker"))?;
            state = guard;
        }
        Ok(())
    }

    /// Resets every flag, advances the epoch and wakes all waiting workers.
    /// Only valid once every particle has arrived.
    pub fn release(&self) -> WalkResult<u32> {
        let mut state = self.lock()?;
        if !state.completion_flags.iter().all(|&done| done) {
            return Err(WalkError::ContractViolation(format!(
                "release of generation {} with {}/{} particles arrived",
                state.epoch + 1,
                state.arrived,
                state.completion_flags.len()
            )));
        }
        state.completion_flags.fill(false);
        state.arrived = 0;
        state.epoch += 1;
        self.released.notify_all();
        Ok(state.epoch)
    }

    pub fn epoch(&self) -> WalkResult<u32> {
        Ok(self.lock()?.epoch)
    }

    pub fn arrived(&self) -> WalkResult<usize> {
        Ok(self.lock()?.arrived)
    }

    pub fn completion_flags(&self) -> WalkResult<Vec<bool>> {
        Ok(self.lock()?.completion_flags.clone())
    }
}
