use serde::{Serialize, Deserialize};

/// Lattice occupancy after a completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// One-based index of the generation that just completed.
    pub generation: u32,
    /// Number of particles in each lattice cell.
    pub cell_counts: Vec<u32>,
    /// Sum of `cell_counts`. Always equals the run's particle count.
    pub total_particles: u64,
}

impl Snapshot {
    pub fn new(generation: u32, cell_counts: Vec<u32>) -> Self {
        let total_particles = cell_counts.iter().map(|&c| c as u64).sum();
        Snapshot { generation, cell_counts, total_particles }
    }
}

/// Terminal event emitted once the generation limit is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub final_cell_counts: Vec<u32>,
    pub generations: u32,
    pub elapsed_seconds: f64,
}
