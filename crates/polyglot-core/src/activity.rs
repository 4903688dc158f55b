//! Activity log collaborator.
//!
//! After every successful run the orchestrator appends one
//! [`ActivityRecord`] to an [`ActivityLog`]. The store itself lives outside
//! the orchestrator; two implementations are provided here.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use polyglot_common::{Language, RuntimeError};

use crate::CodeExecution;

/// One appended activity entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Record type, always `code_run` for executions.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short human-readable action.
    pub action: String,
    /// Execution details.
    pub details: ActivityDetails,
    /// When the record was created.
    pub timestamp: DateTime<Utc>,
}

/// Details of a `code_run` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetails {
    /// Language that ran.
    pub language: Language,
    /// Length of the submitted code in bytes.
    pub code_length: usize,
    /// Reported duration.
    pub execution_time_ms: Option<u64>,
}

impl ActivityRecord {
    /// Build the record for a completed execution.
    pub fn code_run(execution: &CodeExecution) -> Self {
        Self {
            kind: "code_run".to_string(),
            action: format!("Ran {} code", execution.language),
            details: ActivityDetails {
                language: execution.language,
                code_length: execution.code.len(),
                execution_time_ms: execution.execution_time_ms,
            },
            timestamp: Utc::now(),
        }
    }
}

/// Append-only activity store.
///
/// `append` may block on I/O; async callers run it on the blocking pool.
pub trait ActivityLog: Send + Sync {
    /// Append one record.
    fn append(&self, record: ActivityRecord) -> Result<(), RuntimeError>;
}

/// Activity log kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    records: Mutex<Vec<ActivityRecord>>,
}

impl InMemoryActivityLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the appended records, oldest first.
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().clone()
    }
}

impl ActivityLog for InMemoryActivityLog {
    fn append(&self, record: ActivityRecord) -> Result<(), RuntimeError> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Activity log appended as JSON lines to a file.
#[derive(Debug)]
pub struct JsonlActivityLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlActivityLog {
    /// Create a log that appends to `path`, creating it on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivityLog for JsonlActivityLog {
    fn append(&self, record: ActivityRecord) -> Result<(), RuntimeError> {
        let mut line = serde_json::to_string(&record).map_err(std::io::Error::other)?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_execution() -> CodeExecution {
        let mut execution = CodeExecution::new("print('hi')", Language::Python);
        execution.mark_running();
        execution.complete("hi\n".into(), 7);
        execution
    }

    #[test]
    fn test_code_run_record() {
        let record = ActivityRecord::code_run(&finished_execution());

        assert_eq!(record.kind, "code_run");
        assert_eq!(record.details.language, Language::Python);
        assert_eq!(record.details.code_length, 11);
        assert_eq!(record.details.execution_time_ms, Some(7));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "code_run");
        assert_eq!(json["details"]["codeLength"], 11);
    }

    #[test]
    fn test_in_memory_log() {
        let log = InMemoryActivityLog::new();
        log.append(ActivityRecord::code_run(&finished_execution()))
            .unwrap();
        log.append(ActivityRecord::code_run(&finished_execution()))
            .unwrap();

        assert_eq!(log.records().len(), 2);
    }

    #[test]
    fn test_jsonl_log_appends_lines() {
        let path = std::env::temp_dir().join(format!("activity-{}.jsonl", uuid::Uuid::new_v4()));
        let log = JsonlActivityLog::new(&path);

        log.append(ActivityRecord::code_run(&finished_execution()))
            .unwrap();
        log.append(ActivityRecord::code_run(&finished_execution()))
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: ActivityRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.kind, "code_run");

        std::fs::remove_file(&path).unwrap();
    }
}
