//! Execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use polyglot_common::Language;

/// Lifecycle state of a [`CodeExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Created, not yet dispatched.
    Pending,
    /// Dispatched to the execution context.
    Running,
    /// Completed successfully.
    Success,
    /// Completed with a failure.
    Error,
}

/// One run request and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExecution {
    /// Unique id, also used as the request correlation id.
    pub id: Uuid,
    /// Submitted source code.
    pub code: String,
    /// Target language.
    pub language: Language,
    /// When the request was created.
    pub timestamp: DateTime<Utc>,
    /// Current state.
    pub status: ExecutionStatus,
    /// Program output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Classified failure text on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration reported by the context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl CodeExecution {
    /// Create a pending record.
    pub fn new(code: impl Into<String>, language: Language) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            language,
            timestamp: Utc::now(),
            status: ExecutionStatus::Pending,
            output: None,
            error: None,
            execution_time_ms: None,
        }
    }

    /// Mark the record as dispatched.
    pub fn mark_running(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    /// Move to the `success` terminal state.
    pub fn complete(&mut self, output: String, execution_time_ms: u64) {
        self.status = ExecutionStatus::Success;
        self.output = Some(output);
        self.error = None;
        self.execution_time_ms = Some(execution_time_ms);
    }

    /// Move to the `error` terminal state.
    pub fn fail(&mut self, error: String, execution_time_ms: Option<u64>) {
        self.status = ExecutionStatus::Error;
        self.output = None;
        self.error = Some(error);
        self.execution_time_ms = execution_time_ms;
    }

    /// Returns `true` once the record reached `success` or `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Success | ExecutionStatus::Error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut execution = CodeExecution::new("print('hi')", Language::Python);
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert!(!execution.is_terminal());

        execution.mark_running();
        assert_eq!(execution.status, ExecutionStatus::Running);

        execution.complete("hi\n".into(), 12);
        assert!(execution.is_terminal());
        assert_eq!(execution.output.as_deref(), Some("hi\n"));
        assert_eq!(execution.execution_time_ms, Some(12));
    }

    #[test]
    fn test_fail_clears_output() {
        let mut execution = CodeExecution::new("1/0", Language::Python);
        execution.mark_running();
        execution.fail("ZeroDivisionError".into(), Some(3));

        assert_eq!(execution.status, ExecutionStatus::Error);
        assert!(execution.output.is_none());
        assert_eq!(execution.error.as_deref(), Some("ZeroDivisionError"));
    }

    #[test]
    fn test_serialization_shape() {
        let execution = CodeExecution::new("x", Language::Cpp);
        let json = serde_json::to_value(&execution).unwrap();

        assert_eq!(json["status"], "pending");
        assert_eq!(json["language"], "cpp");
        assert!(json.get("executionTimeMs").is_none());
    }
}
