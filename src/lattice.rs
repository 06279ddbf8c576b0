use std::sync::{Mutex, MutexGuard};

use crate::error::{WalkError, WalkResult};
use walk_common::RunParams;

/// The shared 1-D lattice: per-cell particle counts behind a single mutex.
///
/// Counts change only through [`Lattice::transfer`], which moves one particle
/// between two cells inside one critical section, so the total never drifts
/// from the particle count the lattice was built with.
#[derive(Debug)]
pub struct Lattice {
    length: usize,
    total_particles: u64,
    cell_counts: Mutex<Vec<u32>>,
}

impl Lattice {
    /// Creates a lattice of `length` cells with every particle stacked in cell 0.
    pub fn new(length: usize, particles: u32) -> WalkResult<Self> {
        if length == 0 {
            return Err(WalkError::ContractViolation(
                "lattice must have at least one cell".to_string(),
            ));
        }
        let mut cell_counts = vec![0u32; length];
        cell_counts[0] = particles;

        Ok(Self {
            length,
            total_particles: particles as u64,
            cell_counts: Mutex::new(cell_counts),
        })
    }

    pub fn from_params(params: &RunParams) -> WalkResult<Self> {
        let particles = u32::try_from(params.particle_count).map_err(|_| {
            WalkError::ContractViolation(format!(
                "particle count {} does not fit a cell counter",
                params.particle_count
            ))
        })?;
        Self::new(params.lattice_length, particles)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn total_particles(&self) -> u64 {
        self.total_particles
    }

    fn cells(&self) -> WalkResult<MutexGuard<'_, Vec<u32>>> {
        self.cell_counts
            .lock()
            .map_err(|_| WalkError::LockPoisoned("lattice"))
    }

    /// Moves one particle from cell `from` to cell `to`.
    ///
    /// Requires `from != to`, both in range and a particle present in `from`.
    /// A broken precondition is a [`WalkError::ContractViolation`] and leaves
    /// the counts untouched.
    pub fn transfer(&self, from: usize, to: usize) -> WalkResult<()> {
        if from == to {
            return Err(WalkError::ContractViolation(format!(
                "transfer from cell {} to itself",
                from
            )));
        }
        if from >= self.length || to >= self.length {
            return Err(WalkError::ContractViolation(format!(
                "transfer {} -> {} outside lattice of length {}",
                from, to, self.length
            )));
        }

        let mut cells = self.cells()?;
        if cells[from] == 0 {
            return Err(WalkError::ContractViolation(format!(
                "transfer {} -> {} from an empty cell",
                from, to
            )));
        }
        cells[from] -= 1;
        cells[to] += 1;
        Ok(())
    }

    /// Copies the current counts.
    pub fn snapshot(&self) -> WalkResult<Vec<u32>> {
        Ok(self.cells()?.clone())
    }

    /// Fails with an invariant violation if `cell_counts` does not sum to the particle count.
    pub fn verify_conservation(&self, generation: u32, cell_counts: &[u32]) -> WalkResult<()> {
        let sum: u64 = cell_counts.iter().map(|&c| c as u64).sum();
        if cell_counts.len() != self.length || sum != self.total_particles {
            return Err(WalkError::InvariantViolation {
                generation,
                detail: format!(
                    "{} cells hold {} particles, expected {} cells holding {}",
                    cell_counts.len(),
                    sum,
                    self.length,
                    self.total_particles
                ),
                cell_counts: cell_counts.to_vec(),
            });
        }
        Ok(())
    }

    /// Builds an invariant-violation error carrying the current lattice state.
    pub fn invariant_violation(&self, generation: u32, detail: String) -> WalkError {
        let cell_counts = self
            .cell_counts
            .lock()
            .map(|cells| cells.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        WalkError::InvariantViolation { generation, detail, cell_counts }
    }

    /// Overwrites one cell without keeping the total, to provoke conservation faults.
    #[cfg(test)]
    pub(crate) fn corrupt_cell(&self, cell: usize, value: u32) {
        self.cell_counts.lock().unwrap()[cell] = value;
    }
}
