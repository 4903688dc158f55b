//! Common types, errors, and configuration for polyglot-runtime.
//!
//! This crate provides shared functionality used across the workspace:
//! - [`Language`]: The set of languages with an execution context
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for runtime and per-language settings

pub mod config;
pub mod config_file;
pub mod error;
pub mod language;

pub use config::{
    CompileServiceConfig, ExecutionConfig, InterpreterConfig, PoolConfig, RuntimeConfig,
    WasmConfig,
};
pub use config_file::{ActivityConfig, AdminConfig, ConfigFile, ConfigFileError, ServerConfigFile};
pub use error::RuntimeError;
pub use language::Language;
