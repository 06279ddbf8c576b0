use rand::Rng;
use rand_distr::{Bernoulli, Distribution};

use crate::error::{WalkError, WalkResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Applies `direction` to `position` on a lattice of `length` cells.
/// Moves that would leave `[0, length)` are discarded and the position is kept.
#[inline(always)]
pub fn reflect(position: usize, direction: Direction, length: usize) -> usize {
    match direction {
        Direction::Right if position + 1 < length => position + 1,
        Direction::Left if position > 0 => position - 1,
        _ => position,
    }
}

/// Per-particle step function: one Bernoulli trial picks the direction,
/// success meaning a move to the right.
#[derive(Debug, Clone, Copy)]
pub struct Stepper {
    length: usize,
    coin: Bernoulli,
}

impl Stepper {
    pub fn new(length: usize, move_probability: f64) -> WalkResult<Self> {
        let coin = Bernoulli::new(move_probability).map_err(|e| {
            WalkError::ContractViolation(format!("move probability {}: {}", move_probability, e))
        })?;
        Ok(Self { length, coin })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn draw_direction<R: Rng + ?Sized>(&self, rng: &mut R) -> Direction {
        if self.coin.sample(rng) {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    /// Returns the particle's next position. The result equals `position`
    /// when the drawn move hits a boundary.
    pub fn step<R: Rng + ?Sized>(&self, position: usize, rng: &mut R) -> usize {
        reflect(position, self.draw_direction(rng), self.length)
    }
}
