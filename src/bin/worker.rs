//! Worker process entrypoint: consume tasks, run inference, reconcile.

use prediction_core::config::CoreConfig;
use prediction_core::logging::init_structured_logging;
use prediction_core::worker::WorkerRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = CoreConfig::from_env()?;
    let runner = WorkerRunner::new(config).await?;

    runner.run().await?;

    Ok(())
}
