//! # Data Models
//!
//! Persisted entities for the prediction pipeline and credit ledger.

pub mod prediction;
pub mod transaction;
pub mod user_balance;

pub use prediction::{NewPrediction, Prediction, PredictionStatus};
pub use transaction::{
    LedgerTransaction, NewLedgerTransaction, TransactionStatus, TransactionType,
};
pub use user_balance::UserBalance;
