//! Language backends driven by execution contexts.
//!
//! A [`LanguageBackend`] is the language-specific half of an execution
//! context: it knows how to boot a runtime and run code on it. The context
//! task owns the backend exclusively and drives it from the message loop,
//! so implementations never see concurrent calls.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use polyglot_common::{Language, RuntimeError};

use crate::protocol::{Envelope, Event};

/// Language-specific runtime driven by an execution context.
#[async_trait]
pub trait LanguageBackend: Send {
    /// Language served by this backend.
    fn language(&self) -> Language;

    /// Boot the runtime and return its version string.
    ///
    /// Called at most once per context unless it fails.
    async fn boot(&mut self) -> Result<String, RuntimeError>;

    /// Hook invoked once, right after the first successful boot.
    ///
    /// Must not block; background work is spawned from here.
    fn on_ready(&mut self) {}

    /// Execute one snippet and return its output.
    ///
    /// Output produced while running may additionally be streamed through
    /// `sink`.
    async fn execute(&mut self, code: &str, sink: &OutputSink) -> Result<String, RuntimeError>;

    /// Install a package into the runtime.
    async fn install(&mut self, package: &str) -> Result<String, RuntimeError> {
        let _ = package;
        Err(RuntimeError::unsupported(self.language(), "package install"))
    }

    /// Release every held resource. The backend is dropped afterwards.
    async fn shutdown(&mut self) {}
}

/// Creates a fresh backend for each new execution context.
pub trait BackendFactory: Send + Sync {
    /// Build an unbooted backend for `language`.
    fn create(&self, language: Language) -> Result<Box<dyn LanguageBackend>, RuntimeError>;
}

/// Streams `output` events for one request back to the orchestrator.
#[derive(Debug, Clone)]
pub struct OutputSink {
    language: Language,
    context_id: Uuid,
    request_id: Option<Uuid>,
    events: mpsc::UnboundedSender<Envelope>,
}

impl OutputSink {
    pub(crate) fn new(
        language: Language,
        context_id: Uuid,
        request_id: Option<Uuid>,
        events: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            language,
            context_id,
            request_id,
            events,
        }
    }

    /// A sink that drops everything, for driving a backend directly.
    pub fn detached(language: Language) -> Self {
        let (events, _) = mpsc::unbounded_channel();
        Self::new(language, Uuid::nil(), None, events)
    }

    /// Request that this sink reports for.
    pub fn request_id(&self) -> Option<Uuid> {
        self.request_id
    }

    /// Emit one chunk of output.
    pub fn emit(&self, text: impl Into<String>) {
        // The orchestrator may already be gone during shutdown.
        let _ = self.events.send(Envelope {
            language: self.language,
            context_id: self.context_id,
            event: Event::Output {
                request_id: self.request_id,
                text: text.into(),
            },
        });
    }
}
