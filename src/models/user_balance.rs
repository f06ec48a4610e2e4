//! # User Balance Model
//!
//! One row per user. The balance is only ever written through the ledger
//! services; the debit is a single conditional update so two concurrent
//! requests cannot take the same credit twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserBalance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const BALANCE_COLUMNS: &str = "id, user_id, balance, created_at, updated_at";

impl UserBalance {
    /// Create the balance row for a user.
    pub async fn create_for_user(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        initial_balance: BigDecimal,
    ) -> Result<UserBalance, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO user_balances (id, user_id, balance)
            VALUES ($1, $2, $3)
            RETURNING {BALANCE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, UserBalance>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&initial_balance)
            .fetch_one(executor)
            .await
    }

    /// Find a user's balance row.
    pub async fn find_by_user(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Option<UserBalance>, sqlx::Error> {
        let sql = format!("SELECT {BALANCE_COLUMNS} FROM user_balances WHERE user_id = $1");

        sqlx::query_as::<_, UserBalance>(&sql)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Atomically debit a user's balance.
    ///
    /// The `balance >= amount` predicate runs inside the update, so the
    /// balance never goes below zero and concurrent debits serialize on the
    /// row. Returns whether the debit was applied.
    pub async fn try_debit(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE user_balances
            SET balance = balance - $2, updated_at = NOW()
            WHERE user_id = $1 AND balance >= $2
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Credit a user's balance. Returns `false` when no balance row exists.
    pub async fn credit(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE user_balances
            SET balance = balance + $2, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
