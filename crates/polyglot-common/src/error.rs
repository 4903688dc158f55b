//! Error types for polyglot-runtime.
//!
//! [`RuntimeError`] covers the whole lifecycle of a language runtime, from
//! booting an execution context to running a snippet on it. Its `Display`
//! text is what crosses the message channel, so variants keep the wording
//! that the error classifier keys on (`fetch`, `timeout`, `compiler_error`).

use std::io;

use thiserror::Error;

/// Top-level runtime errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The execution context for a language could not be booted.
    #[error("Failed to initialize {language} runtime: {reason}")]
    InitializationFailed {
        /// Language key of the runtime that failed to boot.
        language: String,
        /// Description of the failure.
        reason: String,
    },

    /// A snippet ran but did not complete successfully.
    #[error("Execution failed: {reason}")]
    ExecutionFailed {
        /// Description of the failure (usually the program's stderr).
        reason: String,
    },

    /// Execution exceeded the configured timeout.
    #[error("Execution timeout after {duration_ms}ms")]
    ExecutionTimeout {
        /// The timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// The compiler rejected the snippet.
    #[error("compiler_error:\n{diagnostic}")]
    CompilationFailed {
        /// Compiler diagnostic, passed through verbatim.
        diagnostic: String,
    },

    /// A request to a remote service could not be completed.
    #[error("Failed to fetch {url}: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// Description of the transport failure.
        reason: String,
    },

    /// The execution context went away before answering.
    #[error("{language} execution context is unavailable")]
    ContextUnavailable {
        /// Language key of the missing context.
        language: String,
    },

    /// The operation is not offered by this language's runtime.
    #[error("{operation} is not supported for {language}")]
    Unsupported {
        /// Language key.
        language: String,
        /// The operation that was requested.
        operation: String,
    },

    /// The language key does not name a supported language.
    #[error("Unknown language: {name}")]
    UnknownLanguage {
        /// The unrecognised key.
        name: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl RuntimeError {
    /// Create a new `InitializationFailed` error.
    pub fn initialization_failed(language: impl ToString, reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            language: language.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a new `ExecutionFailed` error.
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(diagnostic: impl Into<String>) -> Self {
        Self::CompilationFailed {
            diagnostic: diagnostic.into(),
        }
    }

    /// Create a new `Network` error.
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `ContextUnavailable` error.
    pub fn context_unavailable(language: impl ToString) -> Self {
        Self::ContextUnavailable {
            language: language.to_string(),
        }
    }

    /// Create a new `Unsupported` error.
    pub fn unsupported(language: impl ToString, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            language: language.to_string(),
            operation: operation.into(),
        }
    }

    /// Create a new `UnknownLanguage` error.
    pub fn unknown_language(name: impl Into<String>) -> Self {
        Self::UnknownLanguage { name: name.into() }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ExecutionTimeout { .. })
    }

    /// Returns `true` if the runtime never became ready.
    ///
    /// Callers of `run_code` only see these as hard failures; everything
    /// else is folded into the returned execution record.
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            Self::InitializationFailed { .. } | Self::ContextUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::initialization_failed("python", "python3 not found");
        assert_eq!(
            err.to_string(),
            "Failed to initialize python runtime: python3 not found"
        );

        let err = RuntimeError::ExecutionTimeout { duration_ms: 15_000 };
        assert_eq!(err.to_string(), "Execution timeout after 15000ms");
    }

    #[test]
    fn test_display_keeps_classifier_signals() {
        let err = RuntimeError::network("https://wandbox.org", "connection refused");
        assert!(err.to_string().contains("Failed to fetch"));

        let err = RuntimeError::compilation_failed("prog.cc:1:1: error: expected ';'");
        assert!(err.to_string().starts_with("compiler_error"));
        assert!(err.to_string().contains("expected ';'"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err: RuntimeError = io_err.into();
        assert!(matches!(err, RuntimeError::Io(_)));
    }

    #[test]
    fn test_predicates() {
        assert!(RuntimeError::ExecutionTimeout { duration_ms: 1 }.is_timeout());
        assert!(!RuntimeError::execution_failed("boom").is_timeout());
        assert!(RuntimeError::context_unavailable("cpp").is_initialization());
        assert!(RuntimeError::initialization_failed("cpp", "x").is_initialization());
        assert!(!RuntimeError::compilation_failed("x").is_initialization());
    }
}
