use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use storage_bench::config::Config;
use storage_bench::generator::generate;
use storage_bench::{dataset, runner};

#[derive(Debug, Parser)]
#[command(about = "Generate the synthetic readings file consumed by the storage benchmarks.")]
struct Args {
    /// Output path (defaults to BENCH_DATA_PATH, then data.json).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of readings (defaults to BENCH_ROW_COUNT, then 10).
    #[arg(long)]
    rows: Option<usize>,

    /// Length of the locations/values vectors (defaults to BENCH_VECTOR_LEN, then 30000).
    #[arg(long)]
    vector_len: Option<usize>,

    /// Asset type label stamped on every reading.
    #[arg(long)]
    asset_type: Option<String>,

    /// RNG seed for a reproducible file; entropy when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(output) = args.output {
        config.data_path = output;
    }
    if let Some(rows) = args.rows {
        config.rows = rows;
    }
    if let Some(vector_len) = args.vector_len {
        config.vector_len = vector_len;
    }
    if let Some(asset_type) = args.asset_type {
        config.asset_type = asset_type;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let mut rng = runner::rng_from_seed(config.seed);
    let readings = generate(&mut rng, &config.generator(), Utc::now());
    dataset::save(&config.data_path, &readings)
        .with_context(|| format!("failed to write {}", config.data_path.display()))?;

    tracing::info!(
        path = %config.data_path.display(),
        rows = readings.len(),
        vector_len = config.vector_len,
        "dataset written"
    );
    Ok(())
}
