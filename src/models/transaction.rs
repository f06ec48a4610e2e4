//! # Ledger Transaction Model
//!
//! Append-only ledger rows. A transaction is never mutated or deleted; the
//! signed sum of a user's amounts must always equal their current balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    MlRequest,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionType,
    /// Signed: negative for debits, positive for credits.
    pub amount: BigDecimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New ledger row for insertion (without generated fields).
#[derive(Debug, Clone)]
pub struct NewLedgerTransaction {
    pub user_id: Uuid,
    pub kind: TransactionType,
    pub amount: BigDecimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
}

const TRANSACTION_COLUMNS: &str = "id, user_id, kind, amount, status, description, created_at";

impl LedgerTransaction {
    /// Append a ledger row.
    pub async fn insert(
        executor: impl sqlx::PgExecutor<'_>,
        new_transaction: NewLedgerTransaction,
    ) -> Result<LedgerTransaction, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO transactions (id, user_id, kind, amount, status, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, LedgerTransaction>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_transaction.user_id)
            .bind(new_transaction.kind)
            .bind(&new_transaction.amount)
            .bind(new_transaction.status)
            .bind(&new_transaction.description)
            .fetch_one(executor)
            .await
    }

    /// List a user's ledger rows, newest first.
    pub async fn list_for_user(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Vec<LedgerTransaction>, sqlx::Error> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = $1 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, LedgerTransaction>(&sql)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// List a user's rows of one kind, newest first.
    pub async fn list_for_user_by_kind(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        kind: TransactionType,
    ) -> Result<Vec<LedgerTransaction>, sqlx::Error> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = $1 AND kind = $2 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, LedgerTransaction>(&sql)
            .bind(user_id)
            .bind(kind)
            .fetch_all(executor)
            .await
    }

    /// Signed sum of a user's ledger amounts. Equals the current balance when
    /// the ledger is consistent.
    pub async fn sum_for_user(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<BigDecimal, sqlx::Error> {
        let row: (BigDecimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(
            serde_json::to_value(TransactionType::MlRequest).unwrap(),
            serde_json::json!("ml_request")
        );
        assert_eq!(
            serde_json::to_value(TransactionType::Refund).unwrap(),
            serde_json::json!("refund")
        );
    }
}
