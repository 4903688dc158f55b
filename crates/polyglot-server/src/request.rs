//! HTTP request bodies and path parsing.

use serde::Deserialize;

use polyglot_common::{Language, RuntimeError};

/// Body of `POST /run`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    /// Source code to execute.
    pub code: String,
    /// Language key, aliases accepted (`py`, `js`, `c++`, ...).
    pub language: String,
}

/// Body of `POST /packages`.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallRequest {
    /// Package name passed to the installer.
    pub name: String,
    /// Target language; defaults to Python.
    #[serde(default)]
    pub language: Option<String>,
}

impl InstallRequest {
    /// Resolve the target language.
    pub fn language(&self) -> Result<Language, RuntimeError> {
        self.language
            .as_deref()
            .map_or(Ok(Language::Python), parse_language)
    }
}

/// Parse a language key from a path segment or body field.
pub fn parse_language(key: &str) -> Result<Language, RuntimeError> {
    key.parse()
}
