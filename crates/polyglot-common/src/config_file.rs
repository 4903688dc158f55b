//! Configuration file structures for polyglot-runtime.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ServerConfigFile`]: HTTP server settings
//! - [`AdminConfig`]: Admin API settings
//! - [`ActivityConfig`]: Where execution activity records are appended

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Language, RuntimeConfig};

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// preload = ["python", "cpp"]
///
/// [runtime.pool]
/// size = 3
/// warmup_delay_ms = 1000
///
/// [runtime.compile_service]
/// endpoint = "https://wandbox.org/api/compile.json"
/// compiler = "gcc-head"
///
/// [runtime.python]
/// program = "python3"
/// args = ["-u", "-"]
///
/// [server]
/// bind_addr = "0.0.0.0:8080"
/// request_timeout_secs = 30
///
/// [admin]
/// enabled = true
/// token = "your-secret-token"
/// prefix = "/admin"
///
/// [activity]
/// path = "./activity.jsonl"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (execution contexts, pool, compile service).
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfigFile,

    /// Admin API configuration.
    #[serde(default)]
    pub admin: AdminConfig,

    /// Activity log configuration.
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Languages to boot in the background at startup.
    #[serde(default)]
    pub preload: Vec<Language>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// HTTP server configuration from config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfigFile {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: String,

    /// Request timeout in seconds.
    ///
    /// Must exceed the compile service timeout or slow C++ runs are cut off
    /// by the HTTP layer before the orchestrator can classify them.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Enable graceful shutdown.
    #[serde(default = "defaults::graceful_shutdown")]
    pub graceful_shutdown: bool,
}

impl Default for ServerConfigFile {
    fn default() -> Self {
        Self {
            bind_addr: defaults::bind_addr(),
            request_timeout_secs: defaults::request_timeout_secs(),
            graceful_shutdown: defaults::graceful_shutdown(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    /// Enable Admin API.
    #[serde(default)]
    pub enabled: bool,

    /// Authentication token (required when enabled).
    ///
    /// Clients must include this token in the `X-Admin-Token` header.
    pub token: Option<String>,

    /// URL prefix for Admin API endpoints.
    #[serde(default = "defaults::admin_prefix")]
    pub prefix: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: None,
            prefix: defaults::admin_prefix(),
        }
    }
}

impl AdminConfig {
    /// Check if Admin API is properly configured.
    ///
    /// Returns `true` if enabled and token is set.
    pub fn is_configured(&self) -> bool {
        self.enabled && self.token.is_some()
    }
}

/// Activity log configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActivityConfig {
    /// Append records as JSON lines to this file.
    ///
    /// When unset, records are kept in memory for the life of the process.
    pub path: Option<String>,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

/// Default value functions for serde.
mod defaults {
    pub fn bind_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    pub const fn request_timeout_secs() -> u64 {
        30
    }

    pub const fn graceful_shutdown() -> bool {
        true
    }

    pub fn admin_prefix() -> String {
        "/admin".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert!(config.server.graceful_shutdown);
        assert!(!config.admin.enabled);
        assert!(config.admin.token.is_none());
        assert_eq!(config.admin.prefix, "/admin");
        assert!(config.activity.path.is_none());
        assert!(config.preload.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [server]
            bind_addr = "127.0.0.1:3000"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:3000");
        // Defaults applied
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.runtime.pool.size, 3);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            preload = ["python", "cpp"]

            [runtime.execution]
            timeout_ms = 5000

            [runtime.pool]
            size = 4
            warmup_enabled = false

            [runtime.compile_service]
            endpoint = "http://127.0.0.1:9999/compile"
            compiler = "clang-head"

            [runtime.javascript]
            program = "deno"
            args = ["run", "-"]

            [server]
            bind_addr = "0.0.0.0:9000"
            request_timeout_secs = 60
            graceful_shutdown = false

            [admin]
            enabled = true
            token = "secret-token"
            prefix = "/api/admin"

            [activity]
            path = "/tmp/activity.jsonl"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.preload, vec![Language::Python, Language::Cpp]);
        assert_eq!(config.runtime.execution.timeout_ms, 5000);
        assert_eq!(config.runtime.pool.size, 4);
        assert!(!config.runtime.pool.warmup_enabled);
        assert_eq!(config.runtime.compile_service.compiler, "clang-head");
        assert_eq!(config.runtime.javascript.program, "deno");
        assert_eq!(config.runtime.javascript.args, vec!["run", "-"]);
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert!(!config.server.graceful_shutdown);
        assert!(config.admin.is_configured());
        assert_eq!(config.admin.prefix, "/api/admin");
        assert_eq!(
            config.activity.path.as_deref(),
            Some("/tmp/activity.jsonl")
        );
    }

    #[test]
    fn test_admin_config_is_configured() {
        let mut admin = AdminConfig::default();
        assert!(!admin.is_configured());

        admin.enabled = true;
        assert!(!admin.is_configured());

        admin.token = Some("token".to_string());
        assert!(admin.is_configured());
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = ConfigFile::from_toml(invalid);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_unknown_preload_language() {
        let result = ConfigFile::from_toml(r#"preload = ["cobol"]"#);
        assert!(result.is_err());
    }
}
