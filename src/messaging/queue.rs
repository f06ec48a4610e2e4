//! Durable task queue declaration shared by publisher and consumer.

use lapin::options::QueueDeclareOptions;
use lapin::types::{AMQPValue, FieldTable};
use lapin::Channel;

use super::errors::MessagingError;
use crate::config::CoreConfig;

/// Broker-side bounds for the task queue.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub name: String,
    /// Queued tasks older than this are expired by the broker.
    pub message_ttl_ms: u32,
    /// Depth bound; overflow handling is the broker's policy, not ours.
    pub max_length: u32,
    /// Highest priority the queue honors; must cover TaskPriority::High.
    pub max_priority: u8,
}

impl QueueSettings {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            name: config.queue_name.clone(),
            message_ttl_ms: config.queue_message_ttl_ms,
            max_length: config.queue_max_length,
            max_priority: 10,
        }
    }
}

/// Declare the durable, bounded, priority-aware task queue.
///
/// Queue declaration is idempotent as long as the arguments match, so both
/// sides declare before use.
pub(crate) async fn declare_task_queue(
    channel: &Channel,
    settings: &QueueSettings,
) -> Result<(), MessagingError> {
    let mut args = FieldTable::default();
    args.insert(
        "x-message-ttl".into(),
        AMQPValue::LongUInt(settings.message_ttl_ms),
    );
    args.insert(
        "x-max-length".into(),
        AMQPValue::LongUInt(settings.max_length),
    );
    args.insert(
        "x-max-priority".into(),
        AMQPValue::ShortShortUInt(settings.max_priority),
    );

    channel
        .queue_declare(
            &settings.name,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            args,
        )
        .await
        .map_err(|e| MessagingError::queue_declare(&settings.name, e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = CoreConfig::default();
        let settings = QueueSettings::from_config(&config);

        assert_eq!(settings.name, "ml_tasks");
        assert_eq!(settings.message_ttl_ms, 3_600_000);
        assert_eq!(settings.max_length, 10_000);
        assert_eq!(settings.max_priority, 10);
    }
}
