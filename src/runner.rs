//! Process-level orchestration shared by the binaries.

use crate::config::{Backend, Config};
use crate::dataset;
use crate::driver::{BenchmarkDriver, BenchmarkResult, Stage, StageFailure};
use crate::error::BenchError;
use crate::generator::generate;
use crate::mongo::MongoAdapter;
use crate::postgres::PostgresAdapter;
use crate::reading::Reading;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seeded when `seed` is set, otherwise drawn from OS entropy.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Loads the interchange file, generating and saving it first when allowed.
pub fn load_or_generate(config: &Config) -> Result<Vec<Reading>> {
    if !config.data_path.exists() && config.generate_if_missing {
        tracing::info!(
            path = %config.data_path.display(),
            rows = config.rows,
            vector_len = config.vector_len,
            "dataset missing; generating"
        );
        let mut rng = rng_from_seed(config.seed);
        let readings = generate(&mut rng, &config.generator(), Utc::now());
        dataset::save(&config.data_path, &readings).context("failed to write dataset")?;
    }
    dataset::load(&config.data_path).context("failed to load dataset")
}

/// Runs every requested backend one after another. A failing backend is
/// reported and does not stop the ones after it; the call fails if any did.
pub async fn run_backends(config: &Config, backends: &[Backend]) -> Result<()> {
    let readings = load_or_generate(config)?;
    let driver = BenchmarkDriver::new(config.recency_query())
        .with_stage_timeout(config.stage_timeout());

    let mut failed = Vec::new();
    for backend in backends {
        match run_backend(config, &driver, *backend, &readings).await {
            Ok(result) => println!("{result}"),
            Err(failure) => {
                tracing::error!(
                    backend = failure.backend,
                    stage = %failure.stage,
                    error = %failure.source,
                    "benchmark aborted"
                );
                eprintln!("{failure}");
                failed.push(failure.backend);
            }
        }
    }

    if !failed.is_empty() {
        bail!("benchmark aborted for: {}", failed.join(", "));
    }
    Ok(())
}

async fn run_backend(
    config: &Config,
    driver: &BenchmarkDriver,
    backend: Backend,
    readings: &[Reading],
) -> Result<BenchmarkResult, StageFailure> {
    match backend {
        Backend::Postgres => {
            let adapter = PostgresAdapter::connect(&config.postgres)
                .await
                .map_err(|source| connect_failure("postgres", source))?;
            driver.run(&adapter, readings).await
        }
        Backend::Mongo => {
            let adapter = MongoAdapter::connect(&config.mongo)
                .await
                .map_err(|source| connect_failure("mongo", source))?;
            driver.run(&adapter, readings).await
        }
    }
}

fn connect_failure(backend: &'static str, source: BenchError) -> StageFailure {
    StageFailure {
        backend,
        stage: Stage::Connect,
        source,
    }
}
