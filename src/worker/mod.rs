//! # Worker Pipeline
//!
//! Validation, task execution, result reconciliation, and the worker
//! process bootstrap.

pub mod handler;
pub mod runner;
pub mod validators;
pub mod worker;

pub use handler::ResultHandler;
pub use runner::WorkerRunner;
pub use validators::{
    task_validator, CompositeValidator, HistoryValidator, MessageValidator, Validate,
    ValidationReport,
};
pub use worker::{InferenceWorker, Process};
