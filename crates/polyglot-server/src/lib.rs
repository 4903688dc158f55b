//! HTTP Server for polyglot-runtime.
//!
//! This crate exposes the runtime manager's host API over HTTP:
//!
//! - Running snippets and reading the execution history
//! - Runtime status and on-demand initialization
//! - Token-guarded admin operations (preload, cleanup, package install)
//! - Health and readiness checks
//!
//! # Quick Start
//!
//! ```ignore
//! use polyglot_common::RuntimeConfig;
//! use polyglot_server::{AppState, PolyglotServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::with_defaults(&RuntimeConfig::default());
//!     let server = PolyglotServer::new(state, ServerConfig::default());
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod handler;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use router::{AdminRouterConfig, build_router, build_router_with_admin};
pub use server::{PolyglotServer, ServerConfig, TestHandle};
pub use state::AppState;
