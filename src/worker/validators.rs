//! # Task Validators
//!
//! Stateless rule-checkers composed into one pass/fail verdict. A failing
//! task is never processed: it is finalized as a failure, not retried.

use crate::messaging::TaskMessage;

/// Aggregate verdict of one or more validators.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }

    /// Combine two reports: valid only if both are, errors concatenated.
    pub fn merge(mut self, other: ValidationReport) -> ValidationReport {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self
    }

    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

/// Capability to judge a task's content.
pub trait Validate: Send + Sync {
    fn validate(&self, task: &TaskMessage) -> ValidationReport;
}

/// Bounds on the message text.
pub struct MessageValidator;

impl MessageValidator {
    pub const MAX_LENGTH: usize = 10_000;
}

impl Validate for MessageValidator {
    fn validate(&self, task: &TaskMessage) -> ValidationReport {
        let mut report = ValidationReport::valid();
        let message = task.message.trim();

        if message.is_empty() {
            report.add_error("Message cannot be empty");
            return report;
        }

        if message.chars().count() > Self::MAX_LENGTH {
            report.add_error(format!(
                "Message exceeds maximum length of {}",
                Self::MAX_LENGTH
            ));
        }

        report
    }
}

/// Shape rules for the conversation history.
pub struct HistoryValidator;

impl HistoryValidator {
    pub const MAX_HISTORY_LENGTH: usize = 100;
    pub const ALLOWED_ROLES: [&'static str; 3] = ["user", "assistant", "system"];
}

impl Validate for HistoryValidator {
    fn validate(&self, task: &TaskMessage) -> ValidationReport {
        let mut report = ValidationReport::valid();
        let history = &task.conversation_history;

        if history.len() > Self::MAX_HISTORY_LENGTH {
            report.add_error(format!(
                "Conversation history exceeds maximum length of {}",
                Self::MAX_HISTORY_LENGTH
            ));
            return report;
        }

        for (idx, entry) in history.iter().enumerate() {
            let Some(object) = entry.as_object() else {
                report.add_error(format!("History item {idx} must be an object"));
                continue;
            };

            match object.get("role").and_then(|r| r.as_str()) {
                None if !object.contains_key("role") => {
                    report.add_error(format!("History item {idx} missing 'role' field"));
                }
                Some(role) if Self::ALLOWED_ROLES.contains(&role) => {}
                _ => report.add_error(format!("History item {idx} has invalid role")),
            }

            if !object.contains_key("content") {
                report.add_error(format!("History item {idx} missing 'content' field"));
            }
        }

        report
    }
}

/// Runs every validator and merges the verdicts.
pub struct CompositeValidator {
    validators: Vec<Box<dyn Validate>>,
}

impl CompositeValidator {
    pub fn new(validators: Vec<Box<dyn Validate>>) -> Self {
        Self { validators }
    }
}

impl Validate for CompositeValidator {
    fn validate(&self, task: &TaskMessage) -> ValidationReport {
        self.validators
            .iter()
            .fold(ValidationReport::valid(), |report, validator| {
                report.merge(validator.validate(task))
            })
    }
}

/// The validator stack run before any inference call.
pub fn task_validator() -> CompositeValidator {
    CompositeValidator::new(vec![Box::new(MessageValidator), Box::new(HistoryValidator)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::TaskPriority;
    use uuid::Uuid;

    fn task_with(message: &str, history: Vec<serde_json::Value>) -> TaskMessage {
        let mut task = TaskMessage::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "placeholder",
            history,
            "llama3".to_string(),
            TaskPriority::Normal,
        )
        .unwrap();
        // Bypass constructor trimming to exercise the validators directly.
        task.message = message.to_string();
        task
    }

    #[test]
    fn test_valid_task_passes() {
        let task = task_with(
            "What should I eat for breakfast?",
            vec![serde_json::json!({"role": "user", "content": "hi"})],
        );

        let report = task_validator().validate(&task);
        assert!(report.is_valid);
        assert!(report.error_message().is_none());
    }

    #[test]
    fn test_empty_message_fails() {
        let task = task_with("   ", vec![]);
        let report = task_validator().validate(&task);

        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["Message cannot be empty"]);
    }

    #[test]
    fn test_oversized_message_fails() {
        let task = task_with(&"x".repeat(MessageValidator::MAX_LENGTH + 1), vec![]);
        let report = MessageValidator.validate(&task);

        assert!(!report.is_valid);
        assert!(report.errors[0].contains("maximum length"));
    }

    #[test]
    fn test_history_entry_missing_role_fails() {
        let task = task_with("hello", vec![serde_json::json!({"content": "orphaned"})]);
        let report = HistoryValidator.validate(&task);

        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["History item 0 missing 'role' field"]);
    }

    #[test]
    fn test_history_entry_with_unknown_role_fails() {
        let task = task_with(
            "hello",
            vec![serde_json::json!({"role": "narrator", "content": "..."})],
        );
        let report = HistoryValidator.validate(&task);

        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["History item 0 has invalid role"]);
    }

    #[test]
    fn test_history_entry_missing_content_fails() {
        let task = task_with("hello", vec![serde_json::json!({"role": "user"})]);
        let report = HistoryValidator.validate(&task);

        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["History item 0 missing 'content' field"]);
    }

    #[test]
    fn test_non_object_history_entry_fails() {
        let task = task_with("hello", vec![serde_json::json!("just a string")]);
        let report = HistoryValidator.validate(&task);

        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["History item 0 must be an object"]);
    }

    #[test]
    fn test_oversized_history_fails() {
        let entry = serde_json::json!({"role": "user", "content": "hi"});
        let task = task_with(
            "hello",
            vec![entry; HistoryValidator::MAX_HISTORY_LENGTH + 1],
        );
        let report = HistoryValidator.validate(&task);

        assert!(!report.is_valid);
        assert!(report.errors[0].contains("maximum length"));
    }

    #[test]
    fn test_composite_merges_errors_from_all_validators() {
        let task = task_with("", vec![serde_json::json!({"role": "user"})]);
        let report = task_validator().validate(&task);

        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
        let message = report.error_message().unwrap();
        assert!(message.contains("; "));
    }
}
