//! In-process WebAssembly text execution.
//!
//! WAT snippets are compiled by Wasmtime and run on a fresh [`Store`] per
//! run. Guests write output through one host import:
//!
//! ```text
//! (import "env" "print" (func $print (param i32 i32)))   ;; ptr, len
//! ```
//!
//! CPU use is bounded by fuel, so a runaway loop traps instead of hanging
//! the context.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use wasmtime::{Caller, Config, Engine, Linker, Module, OptLevel, Store, Trap};

use polyglot_common::{Language, RuntimeError, WasmConfig};
use polyglot_core::{LanguageBackend, OutputSink};

const WASMTIME_MAJOR: &str = "28";

/// Per-run guest state.
struct GuestState {
    output: String,
    sink: OutputSink,
}

impl GuestState {
    fn print(&mut self, text: &str) {
        self.output.push_str(text);
        self.sink.emit(text);
    }
}

/// Backend running WAT modules on Wasmtime.
pub struct WasmBackend {
    config: WasmConfig,
    runtime: Option<(Engine, Linker<GuestState>)>,
}

impl WasmBackend {
    /// Create an unbooted backend.
    pub fn new(config: WasmConfig) -> Self {
        Self {
            config,
            runtime: None,
        }
    }
}

fn create_engine() -> Result<Engine, RuntimeError> {
    let mut config = Config::new();
    config.async_support(true);
    config.consume_fuel(true);
    config.cranelift_opt_level(OptLevel::Speed);

    Engine::new(&config).map_err(|e| {
        RuntimeError::invalid_config(format!("Failed to create Wasmtime engine: {e}"))
    })
}

/// Register `env::print(ptr: i32, len: i32)`.
fn register_print(linker: &mut Linker<GuestState>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            "env",
            "print",
            |mut caller: Caller<'_, GuestState>, ptr: i32, len: i32| {
                let (Ok(start), Ok(len)) = (usize::try_from(ptr), usize::try_from(len)) else {
                    warn!(ptr, len, "Invalid pointer or length (negative value)");
                    return;
                };

                let Some(memory) = caller
                    .get_export("memory")
                    .and_then(wasmtime::Extern::into_memory)
                else {
                    warn!("Memory export not found in guest module");
                    return;
                };

                // Copy out before touching the store mutably.
                let text = {
                    let data = memory.data(&caller);
                    let Some(bytes) = start
                        .checked_add(len)
                        .and_then(|end| data.get(start..end))
                    else {
                        warn!(start, len, memory_size = data.len(), "Memory access out of bounds");
                        return;
                    };
                    String::from_utf8_lossy(bytes).into_owned()
                };

                caller.data_mut().print(&text);
            },
        )
        .map_err(|e| {
            RuntimeError::invalid_config(format!("Failed to register print function: {e}"))
        })?;

    Ok(())
}

fn is_out_of_fuel(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::OutOfFuel)
}

#[async_trait]
impl LanguageBackend for WasmBackend {
    fn language(&self) -> Language {
        Language::Wat
    }

    async fn boot(&mut self) -> Result<String, RuntimeError> {
        let engine = create_engine()?;
        let mut linker = Linker::new(&engine);
        register_print(&mut linker)?;

        self.runtime = Some((engine, linker));
        info!(max_fuel = self.config.max_fuel, "Wasmtime engine initialized");
        Ok(format!("wasmtime {WASMTIME_MAJOR}"))
    }

    async fn execute(&mut self, code: &str, sink: &OutputSink) -> Result<String, RuntimeError> {
        let Some((engine, linker)) = &self.runtime else {
            return Err(RuntimeError::context_unavailable(Language::Wat));
        };

        let module = Module::new(engine, code)
            .map_err(|e| RuntimeError::compilation_failed(format!("{e:#}")))?;

        let mut store = Store::new(
            engine,
            GuestState {
                output: String::new(),
                sink: sink.clone(),
            },
        );
        store
            .set_fuel(self.config.max_fuel)
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to set fuel: {e}")))?;

        let instance = linker
            .instantiate_async(&mut store, &module)
            .await
            .map_err(|e| RuntimeError::execution_failed(format!("Instantiation failed: {e}")))?;

        let entry_point = &self.config.entry_point;
        let func = instance
            .get_typed_func::<(), ()>(&mut store, entry_point)
            .map_err(|_| {
                RuntimeError::execution_failed(format!("Entry point '{entry_point}' not found"))
            })?;

        match func.call_async(&mut store, ()).await {
            Ok(()) => {
                let consumed = self
                    .config
                    .max_fuel
                    .saturating_sub(store.get_fuel().unwrap_or(0));
                debug!(fuel_consumed = consumed, "WAT module finished");
                Ok(store.into_data().output)
            }
            Err(e) if is_out_of_fuel(&e) => Err(RuntimeError::execution_failed(format!(
                "fuel exhausted after {} units",
                self.config.max_fuel
            ))),
            Err(e) => Err(RuntimeError::execution_failed(format!("trap: {e}"))),
        }
    }

    async fn shutdown(&mut self) {
        self.runtime = None;
    }
}
