//! Configuration structures for polyglot-runtime.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`ExecutionConfig`]: Orchestrator-level limits (run, boot and shutdown timeouts)
//! - [`PoolConfig`]: Connection pool and warmup for the network-backed context
//! - [`CompileServiceConfig`]: Remote compile service endpoint and limits
//! - [`InterpreterConfig`]: External interpreter process per interpreted language
//! - [`WasmConfig`]: In-process Wasmtime settings for WAT snippets

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// This structure contains all configuration options for the orchestrator
/// and its execution contexts. It can be loaded from TOML or JSON.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Orchestrator-level execution limits.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Connection pool for the network-backed context.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Remote compile service used for C++.
    #[serde(default)]
    pub compile_service: CompileServiceConfig,

    /// Python interpreter process.
    #[serde(default = "defaults::python")]
    pub python: InterpreterConfig,

    /// JavaScript interpreter process.
    #[serde(default = "defaults::javascript")]
    pub javascript: InterpreterConfig,

    /// Wasmtime settings for WAT snippets.
    #[serde(default)]
    pub wasm: WasmConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            pool: PoolConfig::default(),
            compile_service: CompileServiceConfig::default(),
            python: defaults::python(),
            javascript: defaults::javascript(),
            wasm: WasmConfig::default(),
        }
    }
}

/// Orchestrator-level execution limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Wall-clock limit for one interpreter run in milliseconds.
    ///
    /// The child process is killed when it is exceeded.
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// Limit for a context boot in milliseconds.
    ///
    /// A boot that exceeds it is reported as an initialization failure.
    #[serde(default = "defaults::init_timeout_ms")]
    pub init_timeout_ms: u64,

    /// How long a context may take to release its resources on cleanup
    /// before its task is aborted, in milliseconds.
    #[serde(default = "defaults::shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::timeout_ms(),
            init_timeout_ms: defaults::init_timeout_ms(),
            shutdown_grace_ms: defaults::shutdown_grace_ms(),
        }
    }
}

impl ExecutionConfig {
    /// Get the run timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the boot timeout as a `Duration`.
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    /// Get the shutdown grace period as a `Duration`.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Number of logical connection slots.
    #[serde(default = "defaults::pool_size")]
    pub size: usize,

    /// Enable the one-time warmup request after the context is ready.
    #[serde(default = "defaults::warmup_enabled")]
    pub warmup_enabled: bool,

    /// Delay between `ready` and the warmup request in milliseconds.
    #[serde(default = "defaults::warmup_delay_ms")]
    pub warmup_delay_ms: u64,

    /// Timeout of the warmup request in milliseconds.
    #[serde(default = "defaults::warmup_timeout_ms")]
    pub warmup_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: defaults::pool_size(),
            warmup_enabled: defaults::warmup_enabled(),
            warmup_delay_ms: defaults::warmup_delay_ms(),
            warmup_timeout_ms: defaults::warmup_timeout_ms(),
        }
    }
}

impl PoolConfig {
    /// Get the warmup delay as a `Duration`.
    pub fn warmup_delay(&self) -> Duration {
        Duration::from_millis(self.warmup_delay_ms)
    }

    /// Get the warmup timeout as a `Duration`.
    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }
}

/// Remote compile service configuration.
///
/// The service speaks the Wandbox JSON API: a `POST` of
/// `{compiler, code, options, save}` answered by
/// `{status, program_output, program_message, compiler_error, ...}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompileServiceConfig {
    /// Compile endpoint URL.
    #[serde(default = "defaults::compile_endpoint")]
    pub endpoint: String,

    /// Compiler identifier understood by the service.
    #[serde(default = "defaults::compiler")]
    pub compiler: String,

    /// Comma-separated compiler options.
    #[serde(default = "defaults::compiler_options")]
    pub options: String,

    /// Timeout of one compile-and-run request in milliseconds.
    #[serde(default = "defaults::compile_timeout_ms")]
    pub run_timeout_ms: u64,
}

impl Default for CompileServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::compile_endpoint(),
            compiler: defaults::compiler(),
            options: defaults::compiler_options(),
            run_timeout_ms: defaults::compile_timeout_ms(),
        }
    }
}

impl CompileServiceConfig {
    /// Get the run timeout as a `Duration`.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

/// External interpreter process configuration.
///
/// Code is written to the child's stdin, so `args` must make the
/// interpreter read its program from there.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterpreterConfig {
    /// Interpreter executable.
    pub program: String,

    /// Arguments used for a run.
    #[serde(default = "defaults::stdin_args")]
    pub args: Vec<String>,

    /// Arguments that print the interpreter version.
    #[serde(default = "defaults::version_args")]
    pub version_args: Vec<String>,

    /// Arguments that install a package (the package name is appended).
    ///
    /// `None` means the interpreter does not support package installs.
    #[serde(default)]
    pub install_args: Option<Vec<String>>,
}

/// Wasmtime configuration for WAT snippets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WasmConfig {
    /// Maximum fuel (CPU instructions) per run.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,

    /// Exported function invoked for a run.
    #[serde(default = "defaults::entry_point")]
    pub entry_point: String,
}

impl Default for WasmConfig {
    fn default() -> Self {
        Self {
            max_fuel: defaults::max_fuel(),
            entry_point: defaults::entry_point(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    use super::InterpreterConfig;

    pub const fn timeout_ms() -> u64 {
        10_000
    }

    pub const fn init_timeout_ms() -> u64 {
        60_000
    }

    pub const fn shutdown_grace_ms() -> u64 {
        1_000
    }

    pub const fn pool_size() -> usize {
        3
    }

    pub const fn warmup_enabled() -> bool {
        true
    }

    pub const fn warmup_delay_ms() -> u64 {
        1_000
    }

    pub const fn warmup_timeout_ms() -> u64 {
        10_000
    }

    pub fn compile_endpoint() -> String {
        "https://wandbox.org/api/compile.json".to_string()
    }

    pub fn compiler() -> String {
        "gcc-head".to_string()
    }

    pub fn compiler_options() -> String {
        "warning,c++17".to_string()
    }

    pub const fn compile_timeout_ms() -> u64 {
        15_000
    }

    pub fn stdin_args() -> Vec<String> {
        vec!["-".to_string()]
    }

    pub fn version_args() -> Vec<String> {
        vec!["--version".to_string()]
    }

    pub fn python() -> InterpreterConfig {
        InterpreterConfig {
            program: "python3".to_string(),
            args: vec!["-u".to_string(), "-".to_string()],
            version_args: version_args(),
            install_args: Some(vec![
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                "--quiet".to_string(),
            ]),
        }
    }

    pub fn javascript() -> InterpreterConfig {
        InterpreterConfig {
            program: "node".to_string(),
            args: stdin_args(),
            version_args: version_args(),
            install_args: None,
        }
    }

    pub const fn max_fuel() -> u64 {
        10_000_000
    }

    pub fn entry_point() -> String {
        "_start".to_string()
    }
}
