//! # Inference Worker
//!
//! Orchestrates one task's lifecycle: validate, claim the prediction, call
//! the inference backend, hand the outcome to the result handler. Every
//! outcome is a value; nothing raises past the worker boundary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::handler::ResultHandler;
use super::validators::{task_validator, CompositeValidator, Validate};
use crate::messaging::{TaskMessage, WorkerResult};
use crate::models::Prediction;
use crate::services::inference::InferenceClient;

/// Capability to execute one task to a result.
#[async_trait]
pub trait Process: Send + Sync {
    async fn execute(&self, task: &TaskMessage) -> WorkerResult;
}

/// Worker driving validation, inference and reconciliation for one task at
/// a time.
pub struct InferenceWorker {
    worker_id: String,
    pool: PgPool,
    inference: Arc<InferenceClient>,
    validator: CompositeValidator,
    result_handler: ResultHandler,
    // Instance-local observability counters; reset on restart.
    processed_count: AtomicU64,
    failed_count: AtomicU64,
}

impl InferenceWorker {
    pub fn new(pool: PgPool, inference: Arc<InferenceClient>, worker_id: Option<String>) -> Self {
        Self {
            worker_id: worker_id.unwrap_or_else(generate_worker_id),
            pool,
            inference,
            validator: task_validator(),
            result_handler: ResultHandler::new(),
            processed_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::Relaxed)
    }

    /// Fraction of executed tasks that succeeded; 0.0 before any work.
    pub fn success_rate(&self) -> f64 {
        let processed = self.processed_count() as f64;
        let total = processed + self.failed_count() as f64;
        if total == 0.0 {
            0.0
        } else {
            processed / total
        }
    }

    pub fn log_summary(&self) {
        info!(
            worker_id = %self.worker_id,
            processed = self.processed_count(),
            failed = self.failed_count(),
            "Worker shutting down"
        );
    }

    /// Claim the prediction and run the inference call, timing the attempt.
    async fn process(&self, task: &TaskMessage) -> WorkerResult {
        let started = Instant::now();

        match Prediction::mark_processing(&self.pool, task.prediction_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    worker_id = %self.worker_id,
                    prediction_id = %task.prediction_id,
                    "Prediction missing or already finalized before processing"
                );
            }
            Err(e) => {
                return WorkerResult::failed(
                    task,
                    format!("Failed to claim prediction: {e}"),
                    started.elapsed().as_millis() as u64,
                );
            }
        }

        let outcome = self
            .inference
            .chat(&task.model_id, &task.message, &task.conversation_history)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(reply) => WorkerResult::success(task, reply.content, elapsed_ms),
            Err(e) => WorkerResult::failed(task, e.to_string(), elapsed_ms),
        }
    }
}

#[async_trait]
impl Process for InferenceWorker {
    async fn execute(&self, task: &TaskMessage) -> WorkerResult {
        info!(
            worker_id = %self.worker_id,
            prediction_id = %task.prediction_id,
            "Processing task"
        );

        let report = self.validator.validate(task);
        let result = if report.is_valid {
            self.process(task).await
        } else {
            let detail = report.error_message().unwrap_or_default();
            warn!(
                worker_id = %self.worker_id,
                prediction_id = %task.prediction_id,
                errors = %detail,
                "Validation failed"
            );
            // The backend is never called for an invalid task; the failure
            // flows through the handler so the charge is refunded.
            WorkerResult::failed(task, format!("Validation error: {detail}"), 0)
        };

        if result.success {
            self.processed_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_count.fetch_add(1, Ordering::Relaxed);
        }

        if !self.result_handler.handle(&result, &self.pool).await {
            warn!(
                worker_id = %self.worker_id,
                prediction_id = %task.prediction_id,
                "Result not reconciled"
            );
        }

        info!(
            worker_id = %self.worker_id,
            prediction_id = %task.prediction_id,
            success = result.success,
            time_ms = result.processing_time_ms,
            "Task executed"
        );

        result
    }
}

fn generate_worker_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("worker-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_worker_ids_are_unique() {
        let a = generate_worker_id();
        let b = generate_worker_id();

        assert!(a.starts_with("worker-"));
        assert_eq!(a.len(), "worker-".len() + 8);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_success_rate_counters() {
        let pool = PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        let inference = Arc::new(InferenceClient::new("http://127.0.0.1:1", "llama3", 1).unwrap());
        let worker = InferenceWorker::new(pool, inference, Some("worker-test0001".to_string()));

        assert_eq!(worker.success_rate(), 0.0);

        worker.processed_count.fetch_add(3, Ordering::Relaxed);
        worker.failed_count.fetch_add(1, Ordering::Relaxed);

        assert_eq!(worker.processed_count(), 3);
        assert_eq!(worker.failed_count(), 1);
        assert!((worker.success_rate() - 0.75).abs() < f64::EPSILON);
    }
}
