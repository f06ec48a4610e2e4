//! # Services
//!
//! The credit ledger, the inference backend client, and request intake.

pub mod balance;
pub mod inference;
pub mod intake;

pub use balance::{BalanceService, TransactionService};
pub use inference::{ChatReply, ChatTurn, InferenceClient, InferenceError};
pub use intake::{AcceptedRequest, IntakeError, RequestIntake};
