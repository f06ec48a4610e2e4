//! Crate-level error types.
//!
//! Component boundaries (worker, result handler, consumer loop) express
//! outcomes as values; these errors cover the fallible plumbing underneath.

use thiserror::Error;

use crate::messaging::MessagingError;
use crate::services::inference::InferenceError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
