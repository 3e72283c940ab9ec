//! Wattline CLI - Building Energy Waste Detection
//!
//! Runs the full detection pipeline over a merged long-format readings CSV
//! and writes the ranked anomaly report for the reporting layer.
//!
//! # Usage
//!
//! ```bash
//! # Detect against a merged readings export
//! wattline --input electricity_merged.csv --output anomalies.csv
//!
//! # With an explicit config file
//! wattline --input readings.csv --config energy_config.toml
//!
//! # Pipe synthetic data through the pipeline
//! simulation --buildings 20 --days 30 --output readings.csv
//! wattline --input readings.csv
//! ```
//!
//! # Environment Variables
//!
//! - `WATTLINE_CONFIG`: Path to pipeline config TOML (when `--config` unset)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wattline::{ingest, pipeline, report, PipelineConfig, RidgeOracle};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "wattline")]
#[command(about = "Wattline Building Energy Waste Detection Engine")]
#[command(version)]
struct CliArgs {
    /// Merged long-format readings CSV (building_id, timestamp,
    /// meter_reading + configured covariates)
    #[arg(short, long)]
    input: PathBuf,

    /// Destination for the ranked anomaly report CSV
    #[arg(short, long, default_value = "anomalies.csv")]
    output: PathBuf,

    /// Pipeline config TOML; overrides the WATTLINE_CONFIG search order
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines (for log shippers)
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::load(),
    };

    let table = ingest::load_readings(&args.input, &config.features)
        .with_context(|| format!("loading readings from {}", args.input.display()))?;

    let mut oracle = RidgeOracle::new(config.oracle.l2_penalty);
    let outcome = pipeline::run(&table, &mut oracle, &config).context("running pipeline")?;

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    report::write_csv(&outcome.report, &mut writer)
        .with_context(|| format!("writing report to {}", args.output.display()))?;

    let summary = &outcome.summary;
    info!(
        buildings = summary.entity_count,
        anomalies = summary.anomalies_detected,
        report_rows = summary.report_rows,
        total_wasted_cost_usd = summary.total_wasted_cost,
        output = %args.output.display(),
        "Detection complete"
    );

    Ok(())
}
