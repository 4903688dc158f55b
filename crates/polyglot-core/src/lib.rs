//! Execution orchestration for polyglot-runtime.
//!
//! This crate runs user code in several languages through one interface:
//! - [`RuntimeManager`]: Per-language lifecycle, init dedup, run queueing
//! - [`ContextHandle`]: Isolated execution context driven by messages
//! - [`LanguageBackend`]: Language-specific boot and execute
//! - [`ExecutionHistory`]: Newest-first record of every run
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    RuntimeManager                       │
//! │  - RuntimeStatus per language                           │
//! │  - Pending-call table (init / request ids)              │
//! │  - Execution history, activity log                      │
//! └─────────────────────────────────────────────────────────┘
//!          │ Command                          ▲ Envelope
//!          ▼                                  │
//! ┌─────────────────────────────────────────────────────────┐
//! │            Execution context (one per language)         │
//! │  - Owns a LanguageBackend                               │
//! │  - Processes commands in order                          │
//! │  - Supervised; a crash is reported as `terminated`      │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod activity;
pub mod backend;
pub mod classify;
pub mod context;
pub mod execution;
pub mod history;
pub mod manager;
pub mod protocol;
pub mod status;

pub use activity::{ActivityLog, ActivityRecord, InMemoryActivityLog, JsonlActivityLog};
pub use backend::{BackendFactory, LanguageBackend, OutputSink};
pub use classify::{ErrorClass, classify, describe};
pub use context::{ContextHandle, spawn_context};
pub use execution::{CodeExecution, ExecutionStatus};
pub use history::ExecutionHistory;
pub use manager::{OutputChunk, RuntimeManager, RuntimeManagerBuilder};
pub use protocol::{Command, Envelope, Event};
pub use status::RuntimeStatus;
