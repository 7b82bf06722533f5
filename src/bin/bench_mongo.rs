use anyhow::Result;
use storage_bench::config::{Backend, Config};
use storage_bench::{logging, runner};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    logging::init_tracing(config.otlp_endpoint.as_deref())?;

    let result = runner::run_backends(&config, &[Backend::Mongo]).await;
    logging::shutdown_tracing();
    result
}
