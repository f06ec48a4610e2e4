//! # Prediction Core
//!
//! Asynchronous task-dispatch and credit-ledger pipeline for metered ML
//! inference. A user's request is accepted escrow-style (balance debited,
//! Pending prediction persisted, task published to a durable queue), and a
//! worker process later validates it, calls the inference backend, and
//! reconciles the outcome: every request either completes and stays billed,
//! or fails and is refunded, exactly once.
//!
//! ## Architecture
//!
//! Delivery from the broker is at-least-once; exactly-once *effect* is
//! achieved at the application layer. Prediction status transitions are
//! guarded one-way updates, and the refund is issued only by the single
//! reconciliation path that wins the transition into Failed. Retries are
//! immutable message copies with an incremented counter, bounded by
//! `max_retries` and republished by the consumer; broker-native requeue is
//! disabled.
//!
//! ## Module Organization
//!
//! - [`messaging`] - wire schema, broker connection, publisher, consumer
//! - [`models`] - predictions, ledger transactions, user balances
//! - [`services`] - balance ledger, inference backend client, request intake
//! - [`worker`] - validators, task execution, reconciliation, process runner
//! - [`config`] - environment-driven configuration
//! - [`error`] - structured error handling
//! - [`logging`] - tracing setup

pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod services;
pub mod worker;

pub use config::CoreConfig;
pub use error::{CoreError, Result};
pub use messaging::{
    BrokerConnection, MessagingError, Publish, QueueSettings, TaskConsumer, TaskHandler,
    TaskMessage, TaskPriority, TaskPublisher, WorkerResult,
};
pub use models::{LedgerTransaction, Prediction, PredictionStatus, TransactionType, UserBalance};
pub use services::{BalanceService, InferenceClient, RequestIntake, TransactionService};
pub use worker::{InferenceWorker, ResultHandler, WorkerRunner};
