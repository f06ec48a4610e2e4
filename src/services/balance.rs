//! # Balance Ledger Services
//!
//! The only writers of user balance. Every balance mutation is paired with an
//! immutable ledger row by its caller, inside the caller's transaction, so
//! the signed ledger sum always equals the current balance.
//!
//! Operations take any Postgres executor: a pool for standalone reads, or the
//! open transaction of a reconciliation unit.

use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::models::{
    LedgerTransaction, NewLedgerTransaction, TransactionStatus, TransactionType, UserBalance,
};

/// User balance operations.
pub struct BalanceService;

impl BalanceService {
    /// Get a user's current balance; zero when no record exists.
    pub async fn get_balance(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<BigDecimal, sqlx::Error> {
        let record = UserBalance::find_by_user(executor, user_id).await?;
        Ok(record.map(|r| r.balance).unwrap_or_else(|| BigDecimal::from(0)))
    }

    /// Check whether a user can afford `amount`.
    pub async fn has_sufficient_balance(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<bool, sqlx::Error> {
        Ok(Self::get_balance(executor, user_id).await? >= *amount)
    }

    /// Deduct `amount` from the user's balance.
    ///
    /// A single conditional update: the balance only moves when it covers the
    /// amount, and never goes negative. Returns `false` without mutation when
    /// funds are insufficient or no record exists.
    pub async fn deduct(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<bool, sqlx::Error> {
        UserBalance::try_debit(executor, user_id, amount).await
    }

    /// Refund `amount` to the user's balance. Credits unconditionally as long
    /// as a balance record exists.
    pub async fn refund(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<bool, sqlx::Error> {
        UserBalance::credit(executor, user_id, amount).await
    }
}

/// Ledger row creation, paired with every balance mutation.
pub struct TransactionService;

impl TransactionService {
    /// Append the debit row for an accepted ML request. Stored negative.
    pub async fn create_ml_request_transaction(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        amount: &BigDecimal,
        description: String,
    ) -> Result<LedgerTransaction, sqlx::Error> {
        LedgerTransaction::insert(
            executor,
            NewLedgerTransaction {
                user_id,
                kind: TransactionType::MlRequest,
                amount: -amount.clone(),
                status: TransactionStatus::Completed,
                description: Some(description),
            },
        )
        .await
    }

    /// Append the credit row for a refunded request. Stored positive.
    pub async fn create_refund_transaction(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        amount: &BigDecimal,
        description: String,
    ) -> Result<LedgerTransaction, sqlx::Error> {
        LedgerTransaction::insert(
            executor,
            NewLedgerTransaction {
                user_id,
                kind: TransactionType::Refund,
                amount: amount.clone(),
                status: TransactionStatus::Completed,
                description: Some(description),
            },
        )
        .await
    }
}
