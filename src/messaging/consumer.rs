//! # Task Consumer
//!
//! Pulls task messages off the durable queue and drives them through a
//! handler. Broker-native requeue is disabled: every delivery is acknowledged
//! after the handler runs, and retries are modeled explicitly as new messages
//! with an incremented counter. One malformed or exploding message never
//! takes down the consumption loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions};
use lapin::types::FieldTable;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::connection::BrokerConnection;
use super::errors::MessagingError;
use super::message::TaskMessage;
use super::publisher::Publish;
use super::queue::{declare_task_queue, QueueSettings};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Per-task processing callback. The handler owns all persistence and ledger
/// effects for the task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Process one task. `false` signals failure and triggers the retry
    /// decision.
    async fn handle(&self, task: &TaskMessage) -> bool;

    /// Invoked when a failed task has exhausted its retries. Implementations
    /// finalize the task as a terminal failure so it cannot strand in a
    /// non-terminal state.
    async fn fail_permanently(&self, task: &TaskMessage, error: &str);
}

/// What the consumer does with a task whose handler reported failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureAction {
    /// Publish this incremented-retry copy; the original is consumed.
    Republish(TaskMessage),
    /// Retries exhausted; finalize as a permanent failure.
    Abandon,
}

/// Decide the retry disposition for a failed task.
pub fn failure_action(task: &TaskMessage) -> FailureAction {
    if task.can_retry() {
        FailureAction::Republish(task.increment_retry())
    } else {
        FailureAction::Abandon
    }
}

/// Consumer for the durable task queue.
pub struct TaskConsumer {
    broker: Arc<BrokerConnection>,
    settings: QueueSettings,
    publisher: Arc<dyn Publish>,
    handler: Arc<dyn TaskHandler>,
}

impl TaskConsumer {
    pub fn new(
        broker: Arc<BrokerConnection>,
        settings: QueueSettings,
        publisher: Arc<dyn Publish>,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        Self {
            broker,
            settings,
            publisher,
            handler,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.settings.name
    }

    /// Consume until the shutdown signal flips. The in-flight task always
    /// finishes before the loop exits; the channel is re-established if the
    /// broker drops it mid-stream.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), MessagingError> {
        while !*shutdown.borrow() {
            let channel = self.broker.channel().await?;
            declare_task_queue(&channel, &self.settings).await?;

            let mut consumer = channel
                .basic_consume(
                    &self.settings.name,
                    "",
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| MessagingError::consume(&self.settings.name, e.to_string()))?;

            info!(queue = %self.settings.name, "Started consuming");

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!(queue = %self.settings.name, "Stopped consuming");
                            return Ok(());
                        }
                    }
                    delivery = consumer.next() => {
                        match delivery {
                            Some(Ok(delivery)) => self.process_delivery(delivery).await,
                            Some(Err(e)) => {
                                error!(queue = %self.settings.name, error = %e, "Delivery stream error");
                                break;
                            }
                            None => {
                                warn!(queue = %self.settings.name, "Delivery stream ended");
                                break;
                            }
                        }
                    }
                }
            }

            tokio::time::sleep(RECONNECT_DELAY).await;
        }

        Ok(())
    }

    async fn process_delivery(&self, delivery: Delivery) {
        let task = match TaskMessage::from_bytes(&delivery.data) {
            Ok(task) => task,
            Err(e) => {
                error!(error = %e, "Dropping undecodable message");
                if let Err(e) = delivery
                    .acker
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    })
                    .await
                {
                    error!(error = %e, "Failed to nack undecodable message");
                }
                return;
            }
        };

        info!(
            prediction_id = %task.prediction_id,
            retry_count = task.retry_count,
            "Received task"
        );

        if self.handler.handle(&task).await {
            info!(prediction_id = %task.prediction_id, "Task completed");
        } else {
            self.handle_failure(&task).await;
        }

        if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
            error!(prediction_id = %task.prediction_id, error = %e, "Failed to ack delivery");
        }
    }

    async fn handle_failure(&self, task: &TaskMessage) {
        match failure_action(task) {
            FailureAction::Republish(retry) => {
                warn!(
                    prediction_id = %task.prediction_id,
                    retry_count = retry.retry_count,
                    max_retries = retry.max_retries,
                    "Task failed, scheduling retry"
                );
                if !self.publisher.publish(&retry).await {
                    error!(prediction_id = %task.prediction_id, "Failed to republish retry");
                }
            }
            FailureAction::Abandon => {
                error!(
                    prediction_id = %task.prediction_id,
                    max_retries = task.max_retries,
                    "Task failed after exhausting retries"
                );
                let reason = format!("Task failed after {} retries", task.max_retries);
                self.handler.fail_permanently(task, &reason).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::message::TaskPriority;
    use uuid::Uuid;

    fn task_with_retries(retry_count: u32, max_retries: u32) -> TaskMessage {
        let mut task = TaskMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "hello",
            vec![],
            "llama3".to_string(),
            TaskPriority::Normal,
        )
        .unwrap();
        task.retry_count = retry_count;
        task.max_retries = max_retries;
        task
    }

    #[test]
    fn test_failure_action_republishes_while_retries_remain() {
        let task = task_with_retries(0, 3);

        match failure_action(&task) {
            FailureAction::Republish(retry) => {
                assert_eq!(retry.retry_count, 1);
                assert_eq!(retry.prediction_id, task.prediction_id);
            }
            FailureAction::Abandon => panic!("expected republish"),
        }
    }

    #[test]
    fn test_failure_action_abandons_at_max_retries() {
        let task = task_with_retries(3, 3);
        assert_eq!(failure_action(&task), FailureAction::Abandon);
    }

    #[test]
    fn test_exhausted_task_is_never_republished_again() {
        // Walk a task through every failure: exactly max_retries republishes,
        // then a terminal abandon.
        let mut task = task_with_retries(0, 3);
        let mut republishes = 0;

        loop {
            match failure_action(&task) {
                FailureAction::Republish(retry) => {
                    republishes += 1;
                    task = retry;
                }
                FailureAction::Abandon => break,
            }
        }

        assert_eq!(republishes, 3);
        assert_eq!(task.retry_count, task.max_retries);
    }
}
