//! # Task Message Structures
//!
//! Wire formats for queue-based task dispatch. A `TaskMessage` is an immutable
//! value: a retry is a brand-new message with an incremented counter, never a
//! mutation of a shared record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::MessagingError;

/// Default number of republish attempts before a task is abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Broker message priority. Serialized as the bare number so the wire value
/// matches what is handed to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

impl TaskPriority {
    /// Numeric priority handed to the broker.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Normal => 5,
            Self::High => 10,
        }
    }
}

impl From<TaskPriority> for u8 {
    fn from(priority: TaskPriority) -> u8 {
        priority.as_u8()
    }
}

impl TryFrom<u8> for TaskPriority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            5 => Ok(Self::Normal),
            10 => Ok(Self::High),
            other => Err(format!("Invalid task priority: {other}")),
        }
    }
}

/// Message describing one unit of inference work.
///
/// Conversation history is carried as raw JSON turns; shape is enforced by the
/// worker-side validators rather than the deserializer, so a malformed entry
/// still reaches validation instead of poisoning the decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: Uuid,
    pub prediction_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<serde_json::Value>,
    pub model_id: String,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl TaskMessage {
    /// Create a new task message with a fresh task id and zero retries.
    ///
    /// The message text is trimmed; an empty message is rejected.
    pub fn new(
        prediction_id: Uuid,
        user_id: Uuid,
        message: &str,
        conversation_history: Vec<serde_json::Value>,
        model_id: String,
        priority: TaskPriority,
    ) -> Result<Self, MessagingError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(MessagingError::invalid_message("Message cannot be empty"));
        }

        Ok(Self {
            task_id: Uuid::new_v4(),
            prediction_id,
            user_id,
            message: trimmed.to_string(),
            conversation_history,
            model_id,
            priority,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Whether this message may still be republished.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Return a new message with the retry counter advanced by one.
    /// The original value is unchanged.
    pub fn increment_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }

    /// Serialize to the JSON wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    /// Deserialize from the JSON wire format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}

/// Outcome of one worker attempt, handed to the result handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub task_id: Uuid,
    pub prediction_id: Uuid,
    pub success: bool,
    pub response: Option<String>,
    pub error: Option<String>,
    pub processing_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl WorkerResult {
    /// Create a successful result.
    pub fn success(task: &TaskMessage, response: String, processing_time_ms: u64) -> Self {
        Self {
            task_id: task.task_id,
            prediction_id: task.prediction_id,
            success: true,
            response: Some(response),
            error: None,
            processing_time_ms,
            completed_at: Utc::now(),
        }
    }

    /// Create a failed result.
    pub fn failed(task: &TaskMessage, error: String, processing_time_ms: u64) -> Self {
        Self {
            task_id: task.task_id,
            prediction_id: task.prediction_id,
            success: false,
            response: None,
            error: Some(error),
            processing_time_ms,
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_task() -> TaskMessage {
        TaskMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "How many calories are in an avocado?",
            vec![serde_json::json!({"role": "user", "content": "hi"})],
            "llama3".to_string(),
            TaskPriority::Normal,
        )
        .unwrap()
    }

    #[test]
    fn test_new_trims_message() {
        let task = TaskMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "  hello  ",
            vec![],
            "llama3".to_string(),
            TaskPriority::Low,
        )
        .unwrap();

        assert_eq!(task.message, "hello");
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.max_retries, DEFAULT_MAX_RETRIES);
        assert!(task.can_retry());
    }

    #[test]
    fn test_new_rejects_blank_message() {
        let result = TaskMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "   ",
            vec![],
            "llama3".to_string(),
            TaskPriority::Normal,
        );

        assert!(matches!(
            result,
            Err(MessagingError::InvalidMessage { .. })
        ));
    }

    #[test]
    fn test_increment_retry_returns_new_value() {
        let task = sample_task();
        let retried = task.increment_retry();

        assert_eq!(task.retry_count, 0);
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.task_id, task.task_id);
        assert_eq!(retried.prediction_id, task.prediction_id);
    }

    #[test]
    fn test_can_retry_exhaustion() {
        let mut task = sample_task();
        for _ in 0..task.max_retries {
            assert!(task.can_retry());
            task = task.increment_retry();
        }
        assert_eq!(task.retry_count, task.max_retries);
        assert!(!task.can_retry());
    }

    #[test]
    fn test_wire_round_trip() {
        let task = sample_task();
        let bytes = task.to_bytes().unwrap();
        let decoded = TaskMessage::from_bytes(&bytes).unwrap();

        assert_eq!(task, decoded);
    }

    #[test]
    fn test_priority_wire_values() {
        let json = serde_json::to_value(TaskPriority::High).unwrap();
        assert_eq!(json, serde_json::json!(10));

        let low: TaskPriority = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(low, TaskPriority::Low);

        let invalid = serde_json::from_value::<TaskPriority>(serde_json::json!(7));
        assert!(invalid.is_err());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let result = TaskMessage::from_bytes(b"not json at all");
        assert!(matches!(
            result,
            Err(MessagingError::MessageDeserialization { .. })
        ));
    }

    #[test]
    fn test_worker_result_constructors() {
        let task = sample_task();

        let ok = WorkerResult::success(&task, "answer".to_string(), 1500);
        assert!(ok.success);
        assert_eq!(ok.response.as_deref(), Some("answer"));
        assert!(ok.error.is_none());
        assert_eq!(ok.processing_time_ms, 1500);

        let failed = WorkerResult::failed(&task, "Request timed out".to_string(), 300);
        assert!(!failed.success);
        assert!(failed.response.is_none());
        assert_eq!(failed.error.as_deref(), Some("Request timed out"));
    }

    proptest! {
        #[test]
        fn prop_retry_count_is_monotonic(steps in 0u32..DEFAULT_MAX_RETRIES) {
            let mut task = sample_task();
            for expected in 1..=steps {
                prop_assert!(task.can_retry());
                task = task.increment_retry();
                prop_assert_eq!(task.retry_count, expected);
            }
            prop_assert!(task.retry_count <= task.max_retries);
        }
    }
}
