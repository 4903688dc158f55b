//! Polyglot Runtime CLI entry point.
//!
//! `serve` runs the HTTP host API; `run` executes a single snippet and exits.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use polyglot_common::{ConfigFile, Language};
use polyglot_core::{ActivityLog, ExecutionStatus, InMemoryActivityLog, JsonlActivityLog};
use polyglot_server::{AppState, PolyglotServer, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "polyglot-runtime", version, about)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, short, global = true, env = "POLYGLOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the HTTP API.
    Serve {
        /// Bind address, overriding the config file.
        #[arg(long, env = "POLYGLOT_BIND_ADDR")]
        bind: Option<String>,
    },
    /// Run one snippet and print its output.
    Run {
        /// Target language (python, javascript, cpp, wat).
        #[arg(long, short)]
        language: Language,

        /// Read the snippet from a file.
        #[arg(long, short, conflicts_with = "code")]
        file: Option<PathBuf>,

        /// Snippet text. Read from stdin when neither this nor --file is given.
        code: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,polyglot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    match cli.command {
        Commands::Serve { bind } => serve(config, bind).await.map(|()| ExitCode::SUCCESS),
        Commands::Run {
            language,
            file,
            code,
        } => run(config, language, file, code).await,
    }
}

fn activity_log(config: &ConfigFile) -> Arc<dyn ActivityLog> {
    match &config.activity.path {
        Some(path) => Arc::new(JsonlActivityLog::new(path)),
        None => Arc::new(InMemoryActivityLog::new()),
    }
}

async fn serve(config: ConfigFile, bind: Option<String>) -> anyhow::Result<()> {
    info!("Starting Polyglot Runtime");

    let bind_addr: SocketAddr = bind
        .unwrap_or_else(|| config.server.bind_addr.clone())
        .parse()
        .context("Invalid bind address. Expected format: 'host:port' (e.g., '0.0.0.0:8080')")?;

    let mut server_config = ServerConfig::default()
        .with_bind_addr(bind_addr)
        .with_timeout(config.server.request_timeout_secs);
    server_config.graceful_shutdown = config.server.graceful_shutdown;

    if config.admin.is_configured() {
        if let Some(token) = &config.admin.token {
            server_config = server_config.with_admin(config.admin.prefix.clone(), token.clone());
        }
    } else if config.admin.enabled {
        tracing::warn!("Admin API enabled without a token; not mounting it");
    }

    let state = AppState::new(&config.runtime, activity_log(&config));

    for language in config.preload.iter().copied() {
        let state = state.clone();
        tokio::spawn(async move {
            state.manager().preload_runtime(language).await;
        });
    }

    info!(bind_addr = %bind_addr, preload = ?config.preload, "Configuration loaded");
    info!("Available endpoints:");
    info!("  GET  /health                    - Health check");
    info!("  GET  /ready                     - Readiness check");
    info!("  POST /run                       - Run a snippet");
    info!("  GET  /runtimes                  - Runtime status");
    info!("  POST /runtimes/:language/init   - Boot a runtime");
    info!("  GET  /history                   - Execution history");
    info!("  GET  /history/:language         - Per-language history");

    PolyglotServer::new(state, server_config).run().await?;

    Ok(())
}

async fn run(
    config: ConfigFile,
    language: Language,
    file: Option<PathBuf>,
    code: Option<String>,
) -> anyhow::Result<ExitCode> {
    let code = match (file, code) {
        (Some(path), _) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(code)) => code,
        (None, None) => {
            let mut code = String::new();
            std::io::stdin()
                .read_to_string(&mut code)
                .context("Failed to read snippet from stdin")?;
            code
        }
    };

    let state = AppState::new(&config.runtime, activity_log(&config));
    let manager = state.manager();

    let outcome = manager.run_code(&code, language).await;
    manager.close().await;
    let execution = outcome?;

    if let Some(output) = &execution.output {
        print!("{output}");
    }

    if execution.status == ExecutionStatus::Error {
        eprintln!(
            "error: {}",
            execution.error.as_deref().unwrap_or("execution failed")
        );
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
