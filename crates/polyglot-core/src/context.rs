//! Execution context actor.
//!
//! Each execution context is a tokio task that exclusively owns one
//! [`LanguageBackend`] and processes [`Command`]s from its channel strictly
//! in order. A supervisor task watches it and reports a crash as
//! [`Event::Terminated`].
//!
//! ```text
//!  RuntimeManager ──Command──▶ [ context task ] ──Envelope──▶ router
//!                                    ▲
//!                              supervisor (join / panic report)
//! ```

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use polyglot_common::{Language, RuntimeError};

use crate::backend::{LanguageBackend, OutputSink};
use crate::protocol::{Command, Envelope, Event};

/// Owning handle of one running execution context.
///
/// Dropping the handle closes the command channel, which makes the context
/// shut its backend down and exit.
#[derive(Debug)]
pub struct ContextHandle {
    id: Uuid,
    language: Language,
    commands: mpsc::UnboundedSender<Command>,
    worker: AbortHandle,
    supervisor: JoinHandle<()>,
}

impl ContextHandle {
    /// Unique identity of this context.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Language served by this context.
    pub fn language(&self) -> Language {
        self.language
    }

    /// A sender for the context's command channel.
    pub fn sender(&self) -> mpsc::UnboundedSender<Command> {
        self.commands.clone()
    }

    /// Queue a command behind everything already sent.
    pub fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands
            .send(command)
            .map_err(|_| RuntimeError::context_unavailable(self.language))
    }

    /// Returns `true` while the context task is still running.
    pub fn is_alive(&self) -> bool {
        !self.supervisor.is_finished()
    }

    /// Ask the context to clean up and wait for it, aborting after `grace`.
    pub async fn terminate(mut self, grace: Duration) {
        let _ = self.commands.send(Command::Cleanup);

        if tokio::time::timeout(grace, &mut self.supervisor).await.is_err() {
            warn!(
                language = %self.language,
                context_id = %self.id,
                grace_ms = grace.as_millis(),
                "Execution context did not stop in time, aborting"
            );
            self.worker.abort();
            let _ = (&mut self.supervisor).await;
        }

        debug!(language = %self.language, context_id = %self.id, "Execution context terminated");
    }
}

/// Why a context loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextExit {
    Cleanup,
    ChannelClosed,
}

/// Spawn a new execution context for `backend`.
///
/// Every event it produces is sent to `events` wrapped in an [`Envelope`].
pub fn spawn_context(
    backend: Box<dyn LanguageBackend>,
    events: mpsc::UnboundedSender<Envelope>,
) -> ContextHandle {
    let id = Uuid::new_v4();
    let language = backend.language();
    let (commands, receiver) = mpsc::unbounded_channel();

    let worker = ContextWorker {
        id,
        language,
        backend,
        events: events.clone(),
        version: None,
    };
    let task = tokio::spawn(worker.run(receiver));
    let abort = task.abort_handle();

    let supervisor = tokio::spawn(async move {
        match task.await {
            Ok(exit) => debug!(%language, context_id = %id, ?exit, "Execution context exited"),
            Err(e) if e.is_cancelled() => {
                debug!(%language, context_id = %id, "Execution context aborted");
            }
            Err(e) => {
                error!(%language, context_id = %id, error = %e, "Execution context crashed");
                let _ = events.send(Envelope {
                    language,
                    context_id: id,
                    event: Event::Terminated {
                        reason: format!("{language} execution context crashed: {e}"),
                    },
                });
            }
        }
    });

    info!(%language, context_id = %id, "Execution context spawned");

    ContextHandle {
        id,
        language,
        commands,
        worker: abort,
        supervisor,
    }
}

struct ContextWorker {
    id: Uuid,
    language: Language,
    backend: Box<dyn LanguageBackend>,
    events: mpsc::UnboundedSender<Envelope>,
    version: Option<String>,
}

impl ContextWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> ContextExit {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Init => self.handle_init().await,
                Command::Run { request_id, code } => self.handle_run(request_id, &code).await,
                Command::Install {
                    request_id,
                    package,
                } => self.handle_install(request_id, &package).await,
                Command::Cleanup => {
                    self.backend.shutdown().await;
                    return ContextExit::Cleanup;
                }
            }
        }

        self.backend.shutdown().await;
        ContextExit::ChannelClosed
    }

    async fn handle_init(&mut self) {
        match self.ensure_booted().await {
            Ok(version) => self.emit(Event::Ready { version }),
            Err(e) => self.emit(Event::Error {
                request_id: None,
                message: e.to_string(),
                execution_time_ms: None,
            }),
        }
    }

    async fn handle_run(&mut self, request_id: Uuid, code: &str) {
        // A run may arrive before init; boot first in that case.
        if let Err(e) = self.ensure_booted().await {
            self.emit(Event::Error {
                request_id: Some(request_id),
                message: e.to_string(),
                execution_time_ms: None,
            });
            return;
        }

        let sink = OutputSink::new(
            self.language,
            self.id,
            Some(request_id),
            self.events.clone(),
        );
        let start = Instant::now();
        let result = self.backend.execute(code, &sink).await;
        let execution_time_ms = elapsed_ms(start);

        match result {
            Ok(output) => {
                debug!(
                    language = %self.language,
                    %request_id,
                    execution_time_ms,
                    "Run completed"
                );
                self.emit(Event::Result {
                    request_id,
                    output,
                    execution_time_ms,
                });
            }
            Err(e) => {
                debug!(
                    language = %self.language,
                    %request_id,
                    execution_time_ms,
                    error = %e,
                    "Run failed"
                );
                self.emit(Event::Error {
                    request_id: Some(request_id),
                    message: e.to_string(),
                    execution_time_ms: Some(execution_time_ms),
                });
            }
        }
    }

    async fn handle_install(&mut self, request_id: Uuid, package: &str) {
        let start = Instant::now();
        let result = match self.ensure_booted().await {
            Ok(_) => self.backend.install(package).await,
            Err(e) => Err(e),
        };
        let execution_time_ms = elapsed_ms(start);

        match result {
            Ok(output) => {
                info!(language = %self.language, package, "Package installed");
                self.emit(Event::Result {
                    request_id,
                    output,
                    execution_time_ms,
                });
            }
            Err(e) => self.emit(Event::Error {
                request_id: Some(request_id),
                message: e.to_string(),
                execution_time_ms: Some(execution_time_ms),
            }),
        }
    }

    async fn ensure_booted(&mut self) -> Result<String, RuntimeError> {
        if let Some(version) = &self.version {
            return Ok(version.clone());
        }

        let start = Instant::now();
        let version = self.backend.boot().await?;
        info!(
            language = %self.language,
            context_id = %self.id,
            version = %version,
            duration_ms = start.elapsed().as_millis(),
            "Runtime booted"
        );

        self.version = Some(version.clone());
        self.backend.on_ready();
        Ok(version)
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(Envelope {
            language: self.language,
            context_id: self.id,
            event,
        });
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
