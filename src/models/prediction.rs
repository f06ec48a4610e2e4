//! # Prediction Model
//!
//! A prediction is the persisted record of one inference request. It is
//! created Pending at the moment the user's balance is debited, claimed as
//! Processing by a worker, and terminates at Completed or Failed. Terminal
//! states are final: transitions into them are guarded conditional updates,
//! which is what makes reconciliation idempotent under redelivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "prediction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PredictionStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Prediction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub model_id: String,
    pub input_data: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub status: PredictionStatus,
    pub cost_charged: BigDecimal,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New prediction for creation (without generated fields).
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub user_id: Uuid,
    pub model_id: String,
    pub input_data: serde_json::Value,
    pub cost_charged: BigDecimal,
}

const PREDICTION_COLUMNS: &str = "id, user_id, model_id, input_data, result, status, \
     cost_charged, error_message, created_at, updated_at";

impl Prediction {
    /// Create a new pending prediction.
    pub async fn create_pending(
        executor: impl sqlx::PgExecutor<'_>,
        new_prediction: NewPrediction,
    ) -> Result<Prediction, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO predictions (id, user_id, model_id, input_data, status, cost_charged)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING {PREDICTION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Prediction>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_prediction.user_id)
            .bind(&new_prediction.model_id)
            .bind(&new_prediction.input_data)
            .bind(&new_prediction.cost_charged)
            .fetch_one(executor)
            .await
    }

    /// Find a prediction by ID.
    pub async fn find_by_id(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Prediction>, sqlx::Error> {
        let sql = format!("SELECT {PREDICTION_COLUMNS} FROM predictions WHERE id = $1");

        sqlx::query_as::<_, Prediction>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a prediction by ID scoped to its owner.
    pub async fn find_by_id_for_user(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Prediction>, sqlx::Error> {
        let sql = format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions WHERE id = $1 AND user_id = $2"
        );

        sqlx::query_as::<_, Prediction>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// List a user's predictions, newest first.
    pub async fn list_for_user(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Vec<Prediction>, sqlx::Error> {
        let sql = format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions \
             WHERE user_id = $1 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Prediction>(&sql)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Claim a prediction for processing.
    ///
    /// Guarded: terminal predictions are untouched. Returns whether the row
    /// is now Processing. A retried task finds the row already Processing,
    /// which also counts as claimed.
    pub async fn mark_processing(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE predictions
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition to Completed with the result payload, clearing any error.
    ///
    /// Guarded: only a non-terminal prediction transitions. Returns the
    /// updated row on the first application, `None` thereafter.
    pub async fn mark_completed(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        result: serde_json::Value,
    ) -> Result<Option<Prediction>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE predictions
            SET status = 'completed', result = $2, error_message = NULL, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING {PREDICTION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Prediction>(&sql)
            .bind(id)
            .bind(result)
            .fetch_optional(executor)
            .await
    }

    /// Transition to Failed with a human-readable error.
    ///
    /// Guarded like [`Self::mark_completed`]; the returned row is the
    /// caller's signal that this was the first transition (and that a refund
    /// may be owed).
    pub async fn mark_failed(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        error: &str,
    ) -> Result<Option<Prediction>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE predictions
            SET status = 'failed', error_message = $2,
                result = jsonb_build_object('error', $2::text), updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING {PREDICTION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Prediction>(&sql)
            .bind(id)
            .bind(error)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!PredictionStatus::Pending.is_terminal());
        assert!(!PredictionStatus::Processing.is_terminal());
        assert!(PredictionStatus::Completed.is_terminal());
        assert!(PredictionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_value(PredictionStatus::Processing).unwrap(),
            serde_json::json!("processing")
        );
        assert_eq!(PredictionStatus::Failed.to_string(), "failed");
    }
}
