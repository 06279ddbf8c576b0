use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use std::path::PathBuf;

use lattice_walk::output::{save_final_positions, save_run_record, RunRecord};
use lattice_walk::{LogSink, RecordingSink, TeeSink, WalkSimulation};
use walk_common::WalkConfig;

/// Command-line arguments for the walk engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Seed for the particle generators (overrides `run.seed`)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of generations to run (overrides the configured mode)
    #[arg(long)]
    generations: Option<u32>,

    /// Directory the output files are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Starting Lattice Walk...");

    // --- Load Configuration ---
    let config = WalkConfig::load(&args.config)?;
    let mut params = config.run_params()?;
    if let Some(generations) = args.generations {
        params = params.with_generation_limit(generations)?;
    }
    if let Some(seed) = args.seed {
        params = params.with_seed(seed);
    }
    debug!("Configuration: {:#?}", config);

    // --- Run ---
    let sim = WalkSimulation::new(params)?;
    let mut sink = TeeSink(LogSink, RecordingSink::new());
    let summary = match sim.run(&mut sink) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Walk failed: {}", e);
            return Err(e).context("Walk did not complete");
        }
    };
    info!(
        "Walk complete: {} generations, {} snapshots reported.",
        summary.report.generations,
        sink.1.snapshots().len()
    );

    // --- Save Recorded Data ---
    let output = &config.output;
    if output.save_stats {
        let record = RunRecord {
            params: sim.params().clone(),
            seed: summary.seed,
            snapshots: sink.1.snapshots().to_vec(),
            final_report: summary.report.clone(),
        };
        save_run_record(&args.output_dir, output, &record)?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output.save_positions {
        save_final_positions(&args.output_dir, output, &summary.final_positions)?;
    } else {
        info!("Skipping saving final positions as per config.");
    }

    Ok(())
}
