//! Per-language runtime status.

use serde::{Deserialize, Serialize};

/// Loading/ready/error snapshot of one language's runtime.
///
/// `is_loading` and `is_ready` are never both `true`; the transition
/// methods below are the only writers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    /// A boot is in progress.
    pub is_loading: bool,
    /// The runtime accepted `init` and can take runs.
    pub is_ready: bool,
    /// Failure text of the last boot, if it failed.
    pub error: Option<String>,
    /// Version reported by the runtime.
    pub version: Option<String>,
}

impl RuntimeStatus {
    /// Enter the loading state, clearing any previous error.
    pub fn begin_loading(&mut self) {
        self.is_loading = true;
        self.is_ready = false;
        self.error = None;
    }

    /// Record a successful boot.
    pub fn mark_ready(&mut self, version: String) {
        self.is_loading = false;
        self.is_ready = true;
        self.error = None;
        self.version = Some(version);
    }

    /// Record a failed boot or a lost context.
    pub fn mark_failed(&mut self, error: String) {
        self.is_loading = false;
        self.is_ready = false;
        self.error = Some(error);
    }

    /// Return to the initial all-false state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
