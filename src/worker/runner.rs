//! # Worker Runner
//!
//! Process bootstrap for a worker: owns the broker connection lifecycle,
//! wires the consumer to the worker and result handler, and shuts down
//! gracefully on SIGINT/SIGTERM: the in-flight task always finishes before
//! the connection is released.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info};

use super::handler::ResultHandler;
use super::worker::{InferenceWorker, Process};
use crate::config::CoreConfig;
use crate::error::Result;
use crate::messaging::{
    BrokerConnection, QueueSettings, TaskConsumer, TaskHandler, TaskMessage, TaskPublisher,
    WorkerResult,
};
use crate::services::inference::InferenceClient;

/// Bridges the consumer's per-task callbacks onto the worker and handler.
struct WorkerTaskHandler {
    worker: Arc<InferenceWorker>,
    result_handler: ResultHandler,
    pool: PgPool,
}

#[async_trait]
impl TaskHandler for WorkerTaskHandler {
    async fn handle(&self, task: &TaskMessage) -> bool {
        self.worker.execute(task).await.success
    }

    /// Retry exhaustion is finalized like any other terminal failure, so the
    /// prediction ends Failed and refunded instead of stranding in
    /// Processing.
    async fn fail_permanently(&self, task: &TaskMessage, error: &str) {
        let result = WorkerResult::failed(task, error.to_string(), 0);
        if !self.result_handler.handle(&result, &self.pool).await {
            error!(
                prediction_id = %task.prediction_id,
                "Could not finalize exhausted task"
            );
        }
    }
}

/// Long-running worker process: consume, execute, reconcile.
pub struct WorkerRunner {
    config: CoreConfig,
    pool: PgPool,
    broker: Arc<BrokerConnection>,
    worker: Arc<InferenceWorker>,
}

impl WorkerRunner {
    pub async fn new(config: CoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        let inference = Arc::new(InferenceClient::new(
            &config.inference_url,
            &config.inference_model,
            config.inference_timeout_secs,
        )?);

        let broker = Arc::new(BrokerConnection::new(
            &config.amqp_url,
            config.prefetch_count,
        ));

        let worker = Arc::new(InferenceWorker::new(pool.clone(), inference, None));

        Ok(Self {
            config,
            pool,
            broker,
            worker,
        })
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(&self) -> Result<()> {
        let settings = QueueSettings::from_config(&self.config);
        let publisher = Arc::new(TaskPublisher::new(self.broker.clone(), settings.clone()));
        let handler = Arc::new(WorkerTaskHandler {
            worker: self.worker.clone(),
            result_handler: ResultHandler::new(),
            pool: self.pool.clone(),
        });
        let consumer = TaskConsumer::new(self.broker.clone(), settings, publisher, handler);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        });

        info!(worker_id = %self.worker.worker_id(), "Worker ready and consuming");

        let outcome = consumer.run(shutdown_rx).await;

        self.worker.log_summary();
        self.broker.close().await?;

        outcome.map_err(Into::into)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
