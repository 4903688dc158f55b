//! Language backends for polyglot-runtime.
//!
//! Each supported language is served by one of three execution strategies:
//!
//! - [`interpreter`]: Local interpreter process fed through stdin (Python, JavaScript)
//! - [`compile_service`]: Remote compile-and-run HTTP service with a warmed
//!   [`pool::ConnectionPool`] (C++)
//! - [`wasm`]: In-process Wasmtime for WebAssembly text (WAT)
//!
//! [`DefaultBackendFactory`] maps a [`Language`] to the right backend.

pub mod compile_service;
pub mod interpreter;
pub mod pool;
pub mod wasm;

use polyglot_common::{Language, RuntimeConfig, RuntimeError};
use polyglot_core::{BackendFactory, LanguageBackend};

pub use compile_service::{CompileServiceBackend, CompileServiceClient};
pub use interpreter::InterpreterBackend;
pub use pool::{ConnectionPool, ConnectionSlot};
pub use wasm::WasmBackend;

/// Creates the configured backend for each language.
#[derive(Debug, Clone, Default)]
pub struct DefaultBackendFactory {
    config: RuntimeConfig,
}

impl DefaultBackendFactory {
    /// Create a factory from runtime configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// The configuration backends are created from.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create(&self, language: Language) -> Result<Box<dyn LanguageBackend>, RuntimeError> {
        let config = &self.config;
        Ok(match language {
            Language::Python => Box::new(InterpreterBackend::new(
                language,
                config.python.clone(),
                &config.execution,
            )),
            Language::JavaScript => Box::new(InterpreterBackend::new(
                language,
                config.javascript.clone(),
                &config.execution,
            )),
            Language::Cpp => Box::new(CompileServiceBackend::new(
                config.compile_service.clone(),
                config.pool.clone(),
            )?),
            Language::Wat => Box::new(WasmBackend::new(config.wasm.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_backend_per_language() {
        let factory = DefaultBackendFactory::default();
        for language in Language::ALL {
            let backend = factory.create(language).unwrap();
            assert_eq!(backend.language(), language);
        }
    }
}
