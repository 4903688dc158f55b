//! Message protocol between the orchestrator and execution contexts.
//!
//! Every message is a variant of a tagged enum; serialized form is
//! `{"type": "<kind>", ...fields}` so the protocol can be logged or carried
//! over a wire unchanged.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use polyglot_common::Language;

/// Message sent from the orchestrator to an execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    /// Boot the language runtime.
    Init,
    /// Execute a snippet.
    Run {
        /// Correlation id of the request.
        request_id: Uuid,
        /// Source code to execute.
        code: String,
    },
    /// Install a package into the runtime.
    Install {
        /// Correlation id of the request.
        request_id: Uuid,
        /// Package name.
        package: String,
    },
    /// Release all resources and stop.
    Cleanup,
}

/// Message sent from an execution context back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// The runtime finished booting.
    Ready {
        /// Version string reported by the runtime.
        version: String,
    },
    /// A run or install completed.
    Result {
        /// Correlation id of the request.
        request_id: Uuid,
        /// Captured output.
        output: String,
        /// Wall-clock duration in milliseconds.
        execution_time_ms: u64,
    },
    /// A boot, run or install failed.
    ///
    /// `request_id` is `None` for boot failures.
    Error {
        /// Correlation id of the failed request, if any.
        request_id: Option<Uuid>,
        /// Human-readable failure text.
        message: String,
        /// Wall-clock duration in milliseconds, if a run was attempted.
        execution_time_ms: Option<u64>,
    },
    /// Streamed output produced while a request is in progress.
    Output {
        /// Request that produced the output.
        request_id: Option<Uuid>,
        /// Output text.
        text: String,
    },
    /// The context stopped without being asked to.
    Terminated {
        /// Why the context stopped.
        reason: String,
    },
}

impl Event {
    /// Short name of the event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Ready { .. } => "ready",
            Event::Result { .. } => "result",
            Event::Error { .. } => "error",
            Event::Output { .. } => "output",
            Event::Terminated { .. } => "terminated",
        }
    }
}

/// An [`Event`] tagged with the context that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Language of the producing context.
    pub language: Language,
    /// Identity of the producing context.
    pub context_id: Uuid,
    /// The event itself.
    pub event: Event,
}
