//! # Queue Messaging
//!
//! Wire schema and publish/consume protocol for the durable task queue.
//! Delivery is at-least-once; exactly-once *effect* is the application's job
//! (guarded status transitions and refund-once reconciliation live in
//! [`crate::worker`]).

pub mod connection;
pub mod consumer;
pub mod errors;
pub mod message;
pub mod publisher;
pub mod queue;

pub use connection::BrokerConnection;
pub use consumer::{failure_action, FailureAction, TaskConsumer, TaskHandler};
pub use errors::MessagingError;
pub use message::{TaskMessage, TaskPriority, WorkerResult, DEFAULT_MAX_RETRIES};
pub use publisher::{Publish, TaskPublisher};
pub use queue::QueueSettings;
