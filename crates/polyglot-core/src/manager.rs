//! Runtime manager (orchestrator).
//!
//! [`RuntimeManager`] owns one execution context and one [`RuntimeStatus`]
//! per language. It boots contexts lazily, shares a single in-flight boot
//! between concurrent callers, queues runs per language, and correlates
//! responses to callers through a pending-call table keyed by unique ids.
//!
//! # Routing
//!
//! Every context sends its events into one channel drained by a single
//! routing task:
//!
//! - `ready` resolves the boot waiting on that context
//! - `result` / `error` resolve the request with the matching id
//!   (an `error` without id fails the boot)
//! - `output` is republished to [`RuntimeManager::subscribe_output`]
//! - `terminated` fails everything pending on the context and marks the
//!   runtime not ready, so the next call boots a fresh one

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use polyglot_common::{ExecutionConfig, Language, RuntimeError};

use crate::activity::{ActivityLog, ActivityRecord, InMemoryActivityLog};
use crate::backend::BackendFactory;
use crate::classify;
use crate::context::{ContextHandle, spawn_context};
use crate::execution::{CodeExecution, ExecutionStatus};
use crate::history::ExecutionHistory;
use crate::protocol::{Command, Envelope, Event};
use crate::status::RuntimeStatus;

const OUTPUT_CHANNEL_CAPACITY: usize = 256;

type SharedBoot = Shared<BoxFuture<'static, Result<(), String>>>;

/// One chunk of streamed output from a running request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Language that produced the output.
    pub language: Language,
    /// Request that produced the output.
    pub request_id: Option<Uuid>,
    /// Output text.
    pub text: String,
}

/// Correlation key of a pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PendingKey {
    /// Boot of the context with this id.
    Init(Uuid),
    /// Run or install with this request id.
    Request(Uuid),
}

/// Response delivered to a pending caller.
#[derive(Debug)]
enum Reply {
    Ready {
        version: String,
    },
    Completed {
        output: String,
        execution_time_ms: u64,
    },
    Failed {
        message: String,
        execution_time_ms: Option<u64>,
    },
}

#[derive(Debug)]
struct PendingCall {
    language: Language,
    context_id: Uuid,
    reply: oneshot::Sender<Reply>,
}

/// Per-language records.
struct LanguageSlot {
    status: Mutex<RuntimeStatus>,
    context: Mutex<Option<ContextHandle>>,
    /// In-flight boot, tagged with its generation.
    boot: Mutex<Option<(Uuid, SharedBoot)>>,
    /// Serializes runs and installs for this language.
    queue: Arc<tokio::sync::Mutex<()>>,
}

impl LanguageSlot {
    fn new() -> Self {
        Self {
            status: Mutex::new(RuntimeStatus::default()),
            context: Mutex::new(None),
            boot: Mutex::new(None),
            queue: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn is_current_boot(&self, generation: Uuid) -> bool {
        self.boot
            .lock()
            .as_ref()
            .is_some_and(|(current, _)| *current == generation)
    }

    fn take_context_if(&self, context_id: Uuid) -> Option<ContextHandle> {
        self.context
            .lock()
            .take_if(|handle| handle.id() == context_id)
    }
}

struct Inner {
    factory: Arc<dyn BackendFactory>,
    config: ExecutionConfig,
    slots: BTreeMap<Language, LanguageSlot>,
    pending: Mutex<HashMap<PendingKey, PendingCall>>,
    history: ExecutionHistory,
    activity: Arc<dyn ActivityLog>,
    events: mpsc::UnboundedSender<Envelope>,
    output: broadcast::Sender<OutputChunk>,
}

/// Builder for [`RuntimeManager`].
pub struct RuntimeManagerBuilder {
    factory: Arc<dyn BackendFactory>,
    config: ExecutionConfig,
    activity: Arc<dyn ActivityLog>,
    languages: Vec<Language>,
}

impl RuntimeManagerBuilder {
    /// Set orchestrator-level limits.
    pub fn execution_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the activity log that successful runs are appended to.
    pub fn activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = activity;
        self
    }

    /// Restrict the manager to a subset of languages.
    pub fn languages(mut self, languages: impl IntoIterator<Item = Language>) -> Self {
        self.languages = languages.into_iter().collect();
        self
    }

    /// Build the manager and start its routing task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn build(self) -> RuntimeManager {
        let (events, receiver) = mpsc::unbounded_channel();
        let (output, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);

        let inner = Arc::new(Inner {
            factory: self.factory,
            config: self.config,
            slots: self
                .languages
                .into_iter()
                .map(|language| (language, LanguageSlot::new()))
                .collect(),
            pending: Mutex::new(HashMap::new()),
            history: ExecutionHistory::new(),
            activity: self.activity,
            events,
            output,
        });

        let router = tokio::spawn(route(Arc::clone(&inner), receiver));

        RuntimeManager { inner, router }
    }
}

/// Orchestrator for all per-language execution contexts.
pub struct RuntimeManager {
    inner: Arc<Inner>,
    router: JoinHandle<()>,
}

impl RuntimeManager {
    /// Start building a manager whose backends come from `factory`.
    pub fn builder(factory: Arc<dyn BackendFactory>) -> RuntimeManagerBuilder {
        RuntimeManagerBuilder {
            factory,
            config: ExecutionConfig::default(),
            activity: Arc::new(InMemoryActivityLog::new()),
            languages: Language::ALL.to_vec(),
        }
    }

    /// Create a manager for every language with default limits.
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self::builder(factory).build()
    }

    /// Languages this manager serves.
    pub fn languages(&self) -> Vec<Language> {
        self.inner.slots.keys().copied().collect()
    }

    /// Boot the runtime for `language` if it is not ready yet.
    ///
    /// Concurrent callers share one boot. A failed boot is forgotten so the
    /// next call retries from scratch.
    #[instrument(skip(self), fields(language = %language))]
    pub async fn init_runtime(&self, language: Language) -> Result<(), RuntimeError> {
        let slot = self.inner.slot(language)?;
        if slot.status.lock().is_ready {
            return Ok(());
        }

        let boot = {
            let mut boot = slot.boot.lock();
            match boot.as_ref() {
                Some((_, shared)) => {
                    debug!("Joining in-flight initialization");
                    shared.clone()
                }
                // A boot may have finished since the check above.
                None if slot.status.lock().is_ready => return Ok(()),
                None => {
                    let generation = Uuid::new_v4();
                    let inner = Arc::clone(&self.inner);
                    // Spawned so that a cancelled caller cannot stall the boot.
                    let task = tokio::spawn(async move { inner.boot(language, generation).await });
                    let shared = async move {
                        task.await
                            .unwrap_or_else(|e| Err(format!("initialization task failed: {e}")))
                    }
                    .boxed()
                    .shared();
                    *boot = Some((generation, shared.clone()));
                    shared
                }
            }
        };

        boot.await
            .map_err(|reason| RuntimeError::initialization_failed(language, reason))
    }

    /// Run `code` on the runtime for `language`, booting it first if needed.
    ///
    /// Execution failures come back as an `Ok` record with
    /// [`ExecutionStatus::Error`]; `Err` means the runtime could not be
    /// reached at all.
    #[instrument(skip(self, code), fields(language = %language, code_len = code.len()))]
    pub async fn run_code(
        &self,
        code: &str,
        language: Language,
    ) -> Result<CodeExecution, RuntimeError> {
        let slot = self.inner.slot(language)?;
        let turn = Arc::clone(&slot.queue).lock_owned().await;

        self.init_runtime(language).await?;
        let context_id = self.inner.current_context(language)?;

        let mut execution = CodeExecution::new(code, language);
        execution.mark_running();
        self.inner.history.record(execution.clone());

        // The record reaches a terminal state, and the turn is held until
        // then, even if this caller goes away.
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let execution = inner.finish_run(context_id, execution).await;
            drop(turn);
            execution
        });
        task.await
            .map_err(|e| RuntimeError::execution_failed(format!("run task failed: {e}")))
    }

    /// Install a package into the runtime for `language`.
    ///
    /// Only languages whose runtime supports packages accept this.
    #[instrument(skip(self), fields(language = %language))]
    pub async fn install_package(
        &self,
        language: Language,
        package: &str,
    ) -> Result<String, RuntimeError> {
        if !language.supports_packages() {
            return Err(RuntimeError::unsupported(language, "package install"));
        }

        let slot = self.inner.slot(language)?;
        let _turn = slot.queue.lock().await;

        self.init_runtime(language).await?;
        let context_id = self.inner.current_context(language)?;

        let request_id = Uuid::new_v4();
        let command = Command::Install {
            request_id,
            package: package.to_string(),
        };
        match self
            .inner
            .request(language, context_id, request_id, command)
            .await
        {
            Some(Reply::Completed { output, .. }) => Ok(output),
            Some(Reply::Failed { message, .. }) => Err(RuntimeError::execution_failed(message)),
            Some(Reply::Ready { .. }) | None => Err(RuntimeError::context_unavailable(language)),
        }
    }

    /// Boot a runtime ahead of use, logging instead of returning failures.
    pub async fn preload_runtime(&self, language: Language) {
        match self.init_runtime(language).await {
            Ok(()) => debug!(%language, "Runtime preloaded"),
            Err(e) => warn!(%language, error = %e, "Runtime preload failed"),
        }
    }

    /// Boot every runtime concurrently and wait until all have settled.
    pub async fn preload_all_runtimes(&self) {
        join_all(
            self.inner
                .slots
                .keys()
                .map(|language| self.preload_runtime(*language)),
        )
        .await;
    }

    /// Independent snapshot of every runtime status.
    pub fn get_runtime_status(&self) -> BTreeMap<Language, RuntimeStatus> {
        self.inner
            .slots
            .iter()
            .map(|(language, slot)| (*language, slot.status.lock().clone()))
            .collect()
    }

    /// All executions, newest first.
    pub fn get_execution_history(&self) -> Vec<CodeExecution> {
        self.inner.history.all()
    }

    /// Executions for one language, newest first.
    pub fn get_language_execution_history(&self, language: Language) -> Vec<CodeExecution> {
        self.inner.history.for_language(language)
    }

    /// Forget every recorded execution.
    pub fn clear_execution_history(&self) {
        self.inner.history.clear();
    }

    /// Receive streamed output from every runtime.
    pub fn subscribe_output(&self) -> broadcast::Receiver<OutputChunk> {
        self.inner.output.subscribe()
    }

    /// Tear down the runtime for `language` and reset its status.
    ///
    /// Callers waiting on it are released with a failure. Calling this on a
    /// runtime that was never booted changes nothing.
    #[instrument(skip(self), fields(language = %language))]
    pub async fn cleanup_language(&self, language: Language) {
        let Ok(slot) = self.inner.slot(language) else {
            return;
        };

        slot.boot.lock().take();
        let handle = slot.context.lock().take();
        let dropped = self.inner.drop_pending(|call| call.language == language);
        slot.status.lock().reset();

        if let Some(handle) = handle {
            handle.terminate(self.inner.config.shutdown_grace()).await;
            info!(dropped_calls = dropped, "Runtime cleaned up");
        }
    }

    /// Tear down every runtime and clear the execution history.
    pub async fn cleanup(&self) {
        join_all(
            self.inner
                .slots
                .keys()
                .map(|language| self.cleanup_language(*language)),
        )
        .await;
        self.inner.history.clear();
    }

    /// Tear everything down and stop routing.
    ///
    /// The manager must not be used afterwards.
    pub async fn close(&self) {
        self.cleanup().await;
        self.router.abort();
    }
}

impl Drop for RuntimeManager {
    fn drop(&mut self) {
        self.router.abort();
    }
}

impl std::fmt::Debug for RuntimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeManager")
            .field("languages", &self.languages())
            .field("history_len", &self.inner.history.len())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn slot(&self, language: Language) -> Result<&LanguageSlot, RuntimeError> {
        self.slots
            .get(&language)
            .ok_or_else(|| RuntimeError::unsupported(language, "execution"))
    }

    fn current_context(&self, language: Language) -> Result<Uuid, RuntimeError> {
        self.slot(language)?
            .context
            .lock()
            .as_ref()
            .filter(|handle| handle.is_alive())
            .map(ContextHandle::id)
            .ok_or_else(|| RuntimeError::context_unavailable(language))
    }

    /// Boot a fresh context. Runs inside the shared boot future.
    async fn boot(&self, language: Language, generation: Uuid) -> Result<(), String> {
        let slot = self.slot(language).map_err(|e| e.to_string())?;
        slot.status.lock().begin_loading();

        let stale = slot.context.lock().take();
        if let Some(stale) = stale {
            debug!(%language, context_id = %stale.id(), "Replacing stale execution context");
            let stale_id = stale.id();
            self.drop_pending(|call| call.context_id == stale_id);
            stale.terminate(self.config.shutdown_grace()).await;
        }

        let outcome = self.start_context(language, generation).await;

        // Only the boot that still owns the slot may publish its outcome.
        let mut boot = slot.boot.lock();
        if !boot
            .as_ref()
            .is_some_and(|(current, _)| *current == generation)
        {
            return Err("initialization was cancelled by cleanup".to_string());
        }
        match &outcome {
            Ok(version) => {
                slot.status.lock().mark_ready(version.clone());
                info!(%language, %version, "Runtime ready");
            }
            Err(message) => {
                slot.status.lock().mark_failed(message.clone());
                warn!(%language, error = %message, "Runtime initialization failed");
            }
        }
        *boot = None;

        outcome.map(|_| ())
    }

    async fn start_context(&self, language: Language, generation: Uuid) -> Result<String, String> {
        let slot = self.slot(language).map_err(|e| e.to_string())?;
        let backend = self.factory.create(language).map_err(|e| e.to_string())?;

        let handle = spawn_context(backend, self.events.clone());
        let context_id = handle.id();

        let (reply, receiver) = oneshot::channel();
        self.pending.lock().insert(
            PendingKey::Init(context_id),
            PendingCall {
                language,
                context_id,
                reply,
            },
        );

        let sent = handle.send(Command::Init);
        let orphan = {
            let mut context = slot.context.lock();
            if slot.is_current_boot(generation) {
                *context = Some(handle);
                None
            } else {
                Some(handle)
            }
        };
        if let Some(orphan) = orphan {
            self.pending.lock().remove(&PendingKey::Init(context_id));
            orphan.terminate(self.config.shutdown_grace()).await;
            return Err("initialization was cancelled by cleanup".to_string());
        }

        let outcome = match sent {
            Err(e) => Err(e.to_string()),
            Ok(()) => match tokio::time::timeout(self.config.init_timeout(), receiver).await {
                Ok(Ok(Reply::Ready { version })) => Ok(version),
                Ok(Ok(Reply::Failed { message, .. })) => Err(message),
                Ok(Ok(Reply::Completed { .. })) => {
                    Err("execution context answered init with a run result".to_string())
                }
                Ok(Err(_)) => Err(RuntimeError::context_unavailable(language).to_string()),
                Err(_) => {
                    self.pending.lock().remove(&PendingKey::Init(context_id));
                    Err(format!(
                        "initialization timed out after {}ms",
                        self.config.init_timeout_ms
                    ))
                }
            },
        };

        if outcome.is_err() {
            if let Some(failed) = slot.take_context_if(context_id) {
                failed.terminate(self.config.shutdown_grace()).await;
            }
        }

        outcome
    }

    /// Send a run to the context and settle its history record.
    async fn finish_run(
        self: Arc<Self>,
        context_id: Uuid,
        mut execution: CodeExecution,
    ) -> CodeExecution {
        let language = execution.language;
        let command = Command::Run {
            request_id: execution.id,
            code: execution.code.clone(),
        };
        match self.request(language, context_id, execution.id, command).await {
            Some(Reply::Completed {
                output,
                execution_time_ms,
            }) => execution.complete(output, execution_time_ms),
            Some(Reply::Failed {
                message,
                execution_time_ms,
            }) => execution.fail(classify::describe(&message), execution_time_ms),
            Some(Reply::Ready { .. }) | None => {
                let message = RuntimeError::context_unavailable(language).to_string();
                execution.fail(classify::describe(&message), None);
            }
        }

        self.history.update(&execution);

        if execution.status == ExecutionStatus::Success {
            let activity = Arc::clone(&self.activity);
            let record = ActivityRecord::code_run(&execution);
            match tokio::task::spawn_blocking(move || activity.append(record)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Failed to append activity record"),
                Err(e) => warn!(error = %e, "Activity append task failed"),
            }
        }

        info!(
            %language,
            execution_id = %execution.id,
            status = ?execution.status,
            execution_time_ms = execution.execution_time_ms,
            "Run finished"
        );

        execution
    }

    /// Send a correlated request and wait for its reply.
    ///
    /// Returns `None` if the context went away without answering.
    async fn request(
        &self,
        language: Language,
        context_id: Uuid,
        request_id: Uuid,
        command: Command,
    ) -> Option<Reply> {
        let sender = self
            .slot(language)
            .ok()?
            .context
            .lock()
            .as_ref()
            .filter(|handle| handle.id() == context_id)
            .map(ContextHandle::sender)?;

        let (reply, receiver) = oneshot::channel();
        self.pending.lock().insert(
            PendingKey::Request(request_id),
            PendingCall {
                language,
                context_id,
                reply,
            },
        );

        if sender.send(command).is_err() {
            self.pending.lock().remove(&PendingKey::Request(request_id));
            return None;
        }

        receiver.await.ok()
    }

    /// Remove matching pending calls; their callers observe a closed channel.
    fn drop_pending(&self, matches: impl Fn(&PendingCall) -> bool) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, call| !matches(call));
        before - pending.len()
    }

    fn resolve(&self, key: PendingKey, reply: Reply) {
        let call = self.pending.lock().remove(&key);
        match call {
            Some(call) => {
                let _ = call.reply.send(reply);
            }
            None => warn!(?key, "Response without a pending call"),
        }
    }

    fn dispatch(&self, envelope: Envelope) {
        let Envelope {
            language,
            context_id,
            event,
        } = envelope;
        debug!(%language, %context_id, kind = event.kind(), "Routing event");

        match event {
            Event::Ready { version } => {
                self.resolve(PendingKey::Init(context_id), Reply::Ready { version });
            }
            Event::Result {
                request_id,
                output,
                execution_time_ms,
            } => self.resolve(
                PendingKey::Request(request_id),
                Reply::Completed {
                    output,
                    execution_time_ms,
                },
            ),
            Event::Error {
                request_id: Some(request_id),
                message,
                execution_time_ms,
            } => self.resolve(
                PendingKey::Request(request_id),
                Reply::Failed {
                    message,
                    execution_time_ms,
                },
            ),
            Event::Error {
                request_id: None,
                message,
                ..
            } => self.resolve(
                PendingKey::Init(context_id),
                Reply::Failed {
                    message,
                    execution_time_ms: None,
                },
            ),
            Event::Output { request_id, text } => {
                // No subscribers is fine; output is advisory.
                let _ = self.output.send(OutputChunk {
                    language,
                    request_id,
                    text,
                });
            }
            Event::Terminated { reason } => self.handle_terminated(language, context_id, &reason),
        }
    }

    fn handle_terminated(&self, language: Language, context_id: Uuid, reason: &str) {
        let failed: Vec<PendingCall> = {
            let mut pending = self.pending.lock();
            let keys: Vec<PendingKey> = pending
                .iter()
                .filter(|(_, call)| call.context_id == context_id)
                .map(|(key, _)| *key)
                .collect();
            keys.iter().filter_map(|key| pending.remove(key)).collect()
        };
        // Status first, so a released caller that retries sees a dead runtime.
        if let Ok(slot) = self.slot(language) {
            if slot.take_context_if(context_id).is_some() {
                slot.status.lock().mark_failed(reason.to_string());
            }
        }

        let failed_calls = failed.len();
        for call in failed {
            let _ = call.reply.send(Reply::Failed {
                message: reason.to_string(),
                execution_time_ms: None,
            });
        }

        warn!(%language, %context_id, failed_calls, reason, "Execution context terminated");
    }
}

async fn route(inner: Arc<Inner>, mut events: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = events.recv().await {
        inner.dispatch(envelope);
    }
}
