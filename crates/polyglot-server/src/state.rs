//! Shared application state.
//!
//! This module provides [`AppState`], which holds shared resources
//! across all HTTP request handlers.

use std::sync::Arc;

use polyglot_common::RuntimeConfig;
use polyglot_core::{ActivityLog, InMemoryActivityLog, RuntimeManager};
use polyglot_host::DefaultBackendFactory;

/// Shared state across all request handlers.
///
/// This struct is cloned for each request, so it uses `Arc` for shared data.
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator owning every language runtime.
    manager: Arc<RuntimeManager>,
}

impl AppState {
    /// Create application state with the default backends.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: &RuntimeConfig, activity: Arc<dyn ActivityLog>) -> Self {
        let factory = Arc::new(DefaultBackendFactory::new(config.clone()));
        let manager = RuntimeManager::builder(factory)
            .execution_config(config.execution.clone())
            .activity_log(activity)
            .build();

        Self::from_manager(Arc::new(manager))
    }

    /// Create application state with default backends and an in-memory activity log.
    pub fn with_defaults(config: &RuntimeConfig) -> Self {
        Self::new(config, Arc::new(InMemoryActivityLog::new()))
    }

    /// Wrap an existing manager.
    pub fn from_manager(manager: Arc<RuntimeManager>) -> Self {
        Self { manager }
    }

    /// Get the runtime manager.
    pub fn manager(&self) -> &RuntimeManager {
        &self.manager
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("manager", &self.manager)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_creation() {
        let state = AppState::with_defaults(&RuntimeConfig::default());

        let status = state.manager().get_runtime_status();
        assert_eq!(status.len(), 4);
        assert!(status.values().all(|s| !s.is_ready && !s.is_loading));
        assert!(state.manager().get_execution_history().is_empty());
    }
}
