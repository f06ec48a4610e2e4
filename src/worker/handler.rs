//! # Result Handler
//!
//! Reconciles a worker result with persisted prediction state and the
//! ledger. This is the only code path that issues refunds: the guarded
//! transition into Failed yields a row exactly once, so at-least-once
//! redelivery cannot double-refund a prediction.

use sqlx::types::BigDecimal;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::messaging::WorkerResult;
use crate::models::Prediction;
use crate::services::balance::{BalanceService, TransactionService};

/// Applies worker outcomes to predictions and the ledger.
#[derive(Debug, Default, Clone)]
pub struct ResultHandler;

impl ResultHandler {
    pub fn new() -> Self {
        Self
    }

    /// Reconcile one result. Returns `false` when the prediction does not
    /// exist or persistence failed; both are logged and left to the caller
    /// as non-fatal anomalies.
    pub async fn handle(&self, result: &WorkerResult, pool: &PgPool) -> bool {
        match self.apply(result, pool).await {
            Ok(applied) => applied,
            Err(e) => {
                error!(
                    prediction_id = %result.prediction_id,
                    error = %e,
                    "Failed to update prediction"
                );
                false
            }
        }
    }

    async fn apply(&self, result: &WorkerResult, pool: &PgPool) -> Result<bool, sqlx::Error> {
        if Prediction::find_by_id(pool, result.prediction_id).await?.is_none() {
            error!(prediction_id = %result.prediction_id, "Prediction not found");
            return Ok(false);
        }

        if result.success {
            self.apply_success(result, pool).await
        } else {
            self.apply_failure(result, pool).await
        }
    }

    async fn apply_success(
        &self,
        result: &WorkerResult,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        let payload = serde_json::json!({
            "response": result.response,
            "processing_time_ms": result.processing_time_ms,
        });

        let updated = Prediction::mark_completed(pool, result.prediction_id, payload).await?;
        match updated {
            Some(prediction) => {
                info!(
                    prediction_id = %prediction.id,
                    status = %prediction.status,
                    "Prediction updated"
                );
            }
            None => {
                debug!(
                    prediction_id = %result.prediction_id,
                    "Prediction already finalized; completion skipped"
                );
            }
        }

        Ok(true)
    }

    /// Failure reconciliation: {status transition, balance credit, refund
    /// row} commit as one unit or not at all.
    async fn apply_failure(
        &self,
        result: &WorkerResult,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        let error = result.error.as_deref().unwrap_or("Unknown error");

        let mut tx = pool.begin().await?;

        let transitioned = Prediction::mark_failed(&mut *tx, result.prediction_id, error).await?;

        match transitioned {
            Some(prediction) => {
                if prediction.cost_charged > BigDecimal::from(0) {
                    self.refund_user(&mut tx, &prediction).await?;
                }
                tx.commit().await?;
                info!(
                    prediction_id = %prediction.id,
                    status = %prediction.status,
                    "Prediction updated"
                );
            }
            None => {
                // Already terminal: redelivered or double-reported result.
                // No writes happened, so there is nothing to commit or refund.
                tx.commit().await?;
                debug!(
                    prediction_id = %result.prediction_id,
                    "Prediction already finalized; failure skipped"
                );
            }
        }

        Ok(true)
    }

    async fn refund_user(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        prediction: &Prediction,
    ) -> Result<(), sqlx::Error> {
        let refunded =
            BalanceService::refund(&mut **tx, prediction.user_id, &prediction.cost_charged)
                .await?;

        if !refunded {
            warn!(
                prediction_id = %prediction.id,
                user_id = %prediction.user_id,
                "No balance record for user; refund skipped"
            );
            return Ok(());
        }

        let id_prefix: String = prediction.id.to_string().chars().take(8).collect();
        TransactionService::create_refund_transaction(
            &mut **tx,
            prediction.user_id,
            &prediction.cost_charged,
            format!("Refund for failed ML request: {id_prefix}..."),
        )
        .await?;

        info!(
            prediction_id = %prediction.id,
            user_id = %prediction.user_id,
            amount = %prediction.cost_charged,
            "Refunded user for failed prediction"
        );

        Ok(())
    }
}
