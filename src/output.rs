use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walk_common::{FinalReport, OutputConfig, RunParams, Snapshot};

/// Everything a run reported, as written to the stats file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub params: RunParams,
    pub seed: u64,
    pub snapshots: Vec<Snapshot>,
    pub final_report: FinalReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Bincode,
    MessagePack,
}

impl OutputFormat {
    /// Parses the configured format name. Unknown names fall back to JSON.
    pub fn from_config(format: Option<&str>) -> Self {
        match format.unwrap_or("json") {
            "json" => OutputFormat::Json,
            "bincode" => OutputFormat::Bincode,
            "messagepack" => OutputFormat::MessagePack,
            other => {
                warn!("Unknown output format: {}. Using JSON instead.", other);
                OutputFormat::Json
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Bincode => "bin",
            OutputFormat::MessagePack => "msgpack",
        }
    }
}

fn output_path(dir: &Path, output: &OutputConfig, suffix: &str) -> PathBuf {
    dir.join(format!("{}_{}", output.base_filename, suffix))
}

/// Writes the run record into `dir` in the configured format and returns the file path.
pub fn save_run_record(dir: &Path, output: &OutputConfig, record: &RunRecord) -> Result<PathBuf> {
    let format = OutputFormat::from_config(output.format.as_deref());
    let filename = output_path(dir, output, &format!("snapshots.{}", format.extension()));
    let file = File::create(&filename)
        .with_context(|| format!("Failed to create snapshot file '{}'", filename.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => serde_json::to_writer(&mut writer, record)
            .context("Failed to serialize snapshots to JSON")?,
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, record)
            .context("Failed to serialize snapshots to bincode")?,
        OutputFormat::MessagePack => rmp_serde::encode::write(&mut writer, record)
            .context("Failed to serialize snapshots to MessagePack")?,
    }
    writer.flush()?;

    info!("{} snapshots saved to {}", record.snapshots.len(), filename.display());
    Ok(filename)
}

/// Writes one CSV row per particle with its final cell.
pub fn save_final_positions(dir: &Path, output: &OutputConfig, positions: &[usize]) -> Result<PathBuf> {
    let filename = output_path(dir, output, "final_positions.csv");
    let mut writer = csv::Writer::from_path(&filename)
        .with_context(|| format!("Failed to create CSV file '{}'", filename.display()))?;

    writer.write_record(["particle", "cell"])?;
    for (particle, cell) in positions.iter().enumerate() {
        writer.write_record([particle.to_string(), cell.to_string()])?;
    }
    writer.flush()?;

    info!("Final positions saved to {}", filename.display());
    Ok(filename)
}
