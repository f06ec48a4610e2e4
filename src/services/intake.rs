//! # Request Intake
//!
//! Escrow-style request acceptance: the user's balance is debited at the
//! moment the Pending prediction is created, with a paired ledger row, all in
//! one database transaction. Dispatch to the queue happens after commit and
//! is deliberately non-fatal: a transient broker outage must not roll back an
//! already-debited, already-persisted prediction.

use std::sync::Arc;

use sqlx::types::BigDecimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::messaging::{MessagingError, Publish, TaskMessage, TaskPriority};
use crate::models::{NewPrediction, Prediction};
use crate::services::balance::{BalanceService, TransactionService};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Insufficient balance. Required: {required}, Available: {available}")]
    InsufficientBalance {
        required: BigDecimal,
        available: BigDecimal,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

/// Outcome of an accepted request.
#[derive(Debug)]
pub struct AcceptedRequest {
    pub prediction: Prediction,
    pub task: TaskMessage,
    /// `false` means the prediction stayed Pending without a queue entry and
    /// is left for out-of-band recovery.
    pub dispatched: bool,
}

/// Accepts user requests: debit, persist, dispatch.
pub struct RequestIntake {
    pool: PgPool,
    publisher: Arc<dyn Publish>,
    model_id: String,
    request_cost: BigDecimal,
}

impl RequestIntake {
    pub fn new(
        pool: PgPool,
        publisher: Arc<dyn Publish>,
        model_id: String,
        request_cost: BigDecimal,
    ) -> Self {
        Self {
            pool,
            publisher,
            model_id,
            request_cost,
        }
    }

    /// Accept one request: atomically {deduct, create Pending prediction,
    /// append MlRequest ledger row}, then publish the task message.
    pub async fn submit(
        &self,
        user_id: Uuid,
        message: &str,
        conversation_history: Vec<serde_json::Value>,
        priority: TaskPriority,
    ) -> Result<AcceptedRequest, IntakeError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(IntakeError::InvalidRequest(
                "Message cannot be empty".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let debited = BalanceService::deduct(&mut *tx, user_id, &self.request_cost).await?;
        if !debited {
            let available = BalanceService::get_balance(&mut *tx, user_id).await?;
            // Dropping the transaction rolls the (absent) changes back.
            return Err(IntakeError::InsufficientBalance {
                required: self.request_cost.clone(),
                available,
            });
        }

        let prediction = Prediction::create_pending(
            &mut *tx,
            NewPrediction {
                user_id,
                model_id: self.model_id.clone(),
                input_data: serde_json::json!({
                    "message": message,
                    "conversation_history": conversation_history,
                }),
                cost_charged: self.request_cost.clone(),
            },
        )
        .await?;

        let summary: String = message.chars().take(50).collect();
        TransactionService::create_ml_request_transaction(
            &mut *tx,
            user_id,
            &self.request_cost,
            format!("ML request: {summary}..."),
        )
        .await?;

        tx.commit().await?;

        let task = TaskMessage::new(
            prediction.id,
            user_id,
            message,
            conversation_history,
            self.model_id.clone(),
            priority,
        )?;

        let dispatched = self.publisher.publish(&task).await;
        if dispatched {
            info!(prediction_id = %prediction.id, user_id = %user_id, "Request accepted and dispatched");
        } else {
            error!(
                prediction_id = %prediction.id,
                "Failed to publish task; prediction remains pending"
            );
        }

        Ok(AcceptedRequest {
            prediction,
            task,
            dispatched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopPublisher;

    #[async_trait]
    impl Publish for NoopPublisher {
        async fn publish(&self, _task: &TaskMessage) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_blank_message_rejected_before_any_write() {
        let pool = PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        let intake = RequestIntake::new(
            pool,
            Arc::new(NoopPublisher),
            "llama3".to_string(),
            BigDecimal::from(10),
        );

        // A lazy pool never connects unless a query runs; reaching the
        // database here would fail the test.
        let result = intake
            .submit(Uuid::new_v4(), "   ", vec![], TaskPriority::Normal)
            .await;

        assert!(matches!(result, Err(IntakeError::InvalidRequest(_))));
    }
}
