//! Most-recent-first execution history.

use std::collections::VecDeque;

use parking_lot::RwLock;
use uuid::Uuid;

use polyglot_common::Language;

use crate::CodeExecution;

/// Append-only log of executions, newest first.
///
/// Grows without bound until [`ExecutionHistory::clear`] is called.
#[derive(Debug, Default)]
pub struct ExecutionHistory {
    entries: RwLock<VecDeque<CodeExecution>>,
}

impl ExecutionHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a new record.
    pub fn record(&self, execution: CodeExecution) {
        self.entries.write().push_front(execution);
    }

    /// Replace the record with the same id in place.
    ///
    /// Returns `false` if the record is gone (history was cleared meanwhile).
    pub fn update(&self, execution: &CodeExecution) -> bool {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.id == execution.id) {
            Some(entry) => {
                entry.clone_from(execution);
                true
            }
            None => false,
        }
    }

    /// Look up one record.
    pub fn get(&self, id: Uuid) -> Option<CodeExecution> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    /// All records, newest first.
    pub fn all(&self) -> Vec<CodeExecution> {
        self.entries.read().iter().cloned().collect()
    }

    /// Records for one language, newest first.
    pub fn for_language(&self, language: Language) -> Vec<CodeExecution> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.language == language)
            .cloned()
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if there are no records.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutionStatus;

    #[test]
    fn test_newest_first() {
        let history = ExecutionHistory::new();
        history.record(CodeExecution::new("first", Language::Python));
        history.record(CodeExecution::new("second", Language::Cpp));

        let all = history.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].code, "second");
        assert_eq!(all[1].code, "first");
    }

    #[test]
    fn test_for_language() {
        let history = ExecutionHistory::new();
        history.record(CodeExecution::new("a", Language::Python));
        history.record(CodeExecution::new("b", Language::Wat));
        history.record(CodeExecution::new("c", Language::Python));

        let python = history.for_language(Language::Python);
        assert_eq!(python.len(), 2);
        assert_eq!(python[0].code, "c");
        assert!(history.for_language(Language::JavaScript).is_empty());
    }

    #[test]
    fn test_update_in_place() {
        let history = ExecutionHistory::new();
        let mut execution = CodeExecution::new("x", Language::Python);
        execution.mark_running();
        history.record(execution.clone());

        execution.complete("ok".into(), 1);
        assert!(history.update(&execution));

        let stored = history.get(execution.id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Success);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_update_after_clear() {
        let history = ExecutionHistory::new();
        let execution = CodeExecution::new("x", Language::Python);
        history.record(execution.clone());
        history.clear();

        assert!(history.is_empty());
        assert!(!history.update(&execution));
    }
}
