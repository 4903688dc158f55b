//! Network-backed execution through a remote compile service.
//!
//! C++ snippets are compiled and run by a Wandbox-compatible HTTP service.
//! Each run holds a [`ConnectionPool`] slot for the duration of the call, and
//! once the context is ready a background warmup request primes the service
//! so the first user run does not pay the cold-start cost.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use polyglot_common::{CompileServiceConfig, Language, PoolConfig, RuntimeError};
use polyglot_core::{LanguageBackend, OutputSink};

use crate::pool::ConnectionPool;

/// Program used to prime the service.
const WARMUP_PROGRAM: &str = "int main() { return 0; }";

/// Request body accepted by the compile service.
#[derive(Debug, Clone, Serialize)]
pub struct CompileRequest<'a> {
    /// Compiler identifier, e.g. `gcc-head`.
    pub compiler: &'a str,
    /// Source code.
    pub code: &'a str,
    /// Comma-separated compiler option keys.
    pub options: &'a str,
    /// Ask the service not to keep a permalink.
    pub save: bool,
}

/// Response body returned by the compile service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompileResponse {
    /// Exit status of the program, as a decimal string.
    #[serde(default)]
    pub status: String,
    /// Signal that terminated the program, if any.
    #[serde(default)]
    pub signal: Option<String>,
    /// Program stdout.
    #[serde(default)]
    pub program_output: Option<String>,
    /// Program stderr.
    #[serde(default)]
    pub program_error: Option<String>,
    /// Program stdout and stderr interleaved.
    #[serde(default)]
    pub program_message: Option<String>,
    /// Compiler stderr.
    #[serde(default)]
    pub compiler_error: Option<String>,
    /// Compiler stdout and stderr interleaved.
    #[serde(default)]
    pub compiler_message: Option<String>,
}

impl CompileResponse {
    /// Turn the service's answer into program output or a typed error.
    pub fn into_output(self) -> Result<String, RuntimeError> {
        if self.status == "0" {
            return Ok(self.program_output.unwrap_or_default());
        }

        if let Some(diagnostic) = non_empty(self.compiler_error) {
            return Err(RuntimeError::compilation_failed(diagnostic));
        }

        let reason = non_empty(self.program_error)
            .or_else(|| non_empty(self.program_message))
            .or_else(|| self.signal.map(|signal| format!("terminated by {signal}")))
            .unwrap_or_else(|| format!("program exited with status {}", self.status));
        Err(RuntimeError::execution_failed(reason))
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.trim().is_empty())
}

/// HTTP client for the compile service.
#[derive(Debug, Clone)]
pub struct CompileServiceClient {
    client: Client,
    config: CompileServiceConfig,
}

impl CompileServiceClient {
    /// Create a client for the configured endpoint.
    pub fn new(config: CompileServiceConfig) -> Result<Self, RuntimeError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("polyglot-runtime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Service configuration.
    pub fn config(&self) -> &CompileServiceConfig {
        &self.config
    }

    /// Compile and run `code`, aborting the call after `timeout`.
    #[instrument(skip(self, code), fields(endpoint = %self.config.endpoint, code_len = code.len()))]
    pub async fn compile(
        &self,
        code: &str,
        timeout: Duration,
    ) -> Result<CompileResponse, RuntimeError> {
        let endpoint = &self.config.endpoint;
        let request = CompileRequest {
            compiler: &self.config.compiler,
            code,
            options: &self.config.options,
            save: false,
        };

        let response = self
            .client
            .post(endpoint)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, timeout, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::network(
                endpoint.clone(),
                format!("service answered {status}"),
            ));
        }

        response
            .json::<CompileResponse>()
            .await
            .map_err(|e| transport_error(endpoint, timeout, &e))
    }
}

fn transport_error(endpoint: &str, timeout: Duration, error: &reqwest::Error) -> RuntimeError {
    if error.is_timeout() {
        RuntimeError::ExecutionTimeout {
            duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else if error.is_decode() {
        RuntimeError::execution_failed(format!("Malformed compile service response: {error}"))
    } else {
        RuntimeError::network(endpoint, error.to_string())
    }
}

/// Execution backend for C++ through the compile service.
pub struct CompileServiceBackend {
    client: CompileServiceClient,
    pool_config: PoolConfig,
    pool: Arc<Mutex<ConnectionPool>>,
    warmup: Option<JoinHandle<()>>,
}

impl CompileServiceBackend {
    /// Create an unbooted backend.
    pub fn new(
        service: CompileServiceConfig,
        pool_config: PoolConfig,
    ) -> Result<Self, RuntimeError> {
        Ok(Self {
            client: CompileServiceClient::new(service)?,
            pool: Arc::new(Mutex::new(ConnectionPool::new(pool_config.size))),
            pool_config,
            warmup: None,
        })
    }

    /// Shared handle to the connection pool.
    pub fn pool(&self) -> Arc<Mutex<ConnectionPool>> {
        Arc::clone(&self.pool)
    }

    fn stop_warmup(&mut self) {
        if let Some(warmup) = self.warmup.take() {
            warmup.abort();
        }
    }
}

#[async_trait]
impl LanguageBackend for CompileServiceBackend {
    fn language(&self) -> Language {
        Language::Cpp
    }

    async fn boot(&mut self) -> Result<String, RuntimeError> {
        *self.pool.lock() = ConnectionPool::new(self.pool_config.size);

        let config = self.client.config();
        debug!(
            endpoint = %config.endpoint,
            pool_size = self.pool_config.size,
            "Connection pool initialized"
        );
        Ok(format!("{} via {}", config.compiler, config.endpoint))
    }

    fn on_ready(&mut self) {
        if !self.pool_config.warmup_enabled || self.warmup.is_some() {
            return;
        }

        let client = self.client.clone();
        let pool = Arc::clone(&self.pool);
        let delay = self.pool_config.warmup_delay();
        let timeout = self.pool_config.warmup_timeout();

        self.warmup = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let start = Instant::now();
            match client.compile(WARMUP_PROGRAM, timeout).await {
                Ok(_) => {
                    pool.lock().mark_all_warmed();
                    info!(
                        duration_ms = start.elapsed().as_millis(),
                        "Compile service warmed up"
                    );
                }
                Err(e) => warn!(error = %e, "Compile service warmup failed"),
            }
        }));
    }

    async fn execute(&mut self, code: &str, sink: &OutputSink) -> Result<String, RuntimeError> {
        let slot = self.pool.lock().acquire();
        let result = self
            .client
            .compile(code, self.client.config().run_timeout())
            .await;
        self.pool.lock().release(slot);

        let output = result?.into_output()?;
        if !output.is_empty() {
            sink.emit(output.clone());
        }
        Ok(output)
    }

    async fn shutdown(&mut self) {
        self.stop_warmup();
        *self.pool.lock() = ConnectionPool::new(self.pool_config.size);
    }
}

impl Drop for CompileServiceBackend {
    fn drop(&mut self) {
        self.stop_warmup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> CompileResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_successful_run_returns_program_output() {
        let output = response(r#"{"status":"0","program_output":"hi\n","program_message":"hi\n"}"#)
            .into_output()
            .unwrap();
        assert_eq!(output, "hi\n");
    }

    #[test]
    fn test_compiler_error_is_compilation_failure() {
        let err = response(
            r#"{"status":"1","compiler_error":"prog.cc:1:1: error: expected ';'","compiler_message":"prog.cc:1:1: error: expected ';'"}"#,
        )
        .into_output()
        .unwrap_err();

        assert!(matches!(err, RuntimeError::CompilationFailed { .. }));
        assert!(err.to_string().starts_with("compiler_error:\n"));
    }

    #[test]
    fn test_runtime_failure_uses_program_error() {
        let err = response(r#"{"status":"139","signal":"Segmentation fault","program_error":"boom"}"#)
            .into_output()
            .unwrap_err();
        assert_eq!(err.to_string(), "Execution failed: boom");

        let err = response(r#"{"status":"","signal":"Killed"}"#)
            .into_output()
            .unwrap_err();
        assert!(err.to_string().contains("terminated by Killed"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(CompileRequest {
            compiler: "gcc-head",
            code: "int main(){}",
            options: "warning,c++17",
            save: false,
        })
        .unwrap();

        assert_eq!(body["compiler"], "gcc-head");
        assert_eq!(body["save"], false);
    }

    #[tokio::test]
    async fn test_boot_reports_compiler_and_endpoint() {
        let mut backend = CompileServiceBackend::new(
            CompileServiceConfig::default(),
            PoolConfig {
                warmup_enabled: false,
                ..PoolConfig::default()
            },
        )
        .unwrap();

        let version = backend.boot().await.unwrap();
        assert!(version.starts_with("gcc-head via "));
        assert_eq!(backend.pool().lock().capacity(), 3);
    }
}
