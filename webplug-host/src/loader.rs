//! Plugin loader using wasmtime
//!
//! Every module is instantiated into its own [`Store`], which is the
//! isolation context of one plugin: guests share nothing but the host
//! import module, so identically named internals never collide.

use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use wasmtime::*;
use webplug_api::{GuestRequest, GuestResponse, RouteSpec, API_VERSION, HOST_IMPORT_MODULE};

/// Default fuel granted to each guest call
pub const DEFAULT_FUEL_LIMIT: u64 = 10_000_000;

/// Errors that can occur during plugin loading and guest calls
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Engine creation failed: {0}")]
    EngineCreation(#[source] anyhow::Error),

    #[error("Failed to read module {path}: {source}")]
    ReadModule {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Module compilation failed: {0}")]
    ModuleCompilation(#[source] anyhow::Error),

    #[error("Instantiation failed: {0}")]
    Instantiation(#[source] anyhow::Error),

    #[error("Export not found: {0}")]
    ExportNotFound(&'static str),

    #[error("Function call failed: {function} - {source}")]
    FunctionCall {
        function: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("API version mismatch: expected {expected}, got {actual}")]
    ApiVersionMismatch { expected: u32, actual: i64 },

    #[error("Deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    #[error("Memory access error: {0}")]
    MemoryAccess(String),

    #[error("Fuel exhausted in {0} (CPU limit exceeded)")]
    FuelExhausted(&'static str),

    #[error("Plugin instance is unusable after an earlier panic")]
    Poisoned,
}

/// Per-store data visible to host imports
pub struct GuestState {
    plugin_id: String,
}

/// Plugin loader with a shared wasmtime engine
pub struct PluginLoader {
    engine: Engine,
    linker: Linker<GuestState>,
    fuel_limit: u64,
}

/// Unpack ptr and len from a packed i64
#[inline]
fn unpack_ptr_len(packed: i64) -> (i32, i32) {
    let ptr = (packed >> 32) as i32;
    let len = (packed & 0xFFFFFFFF) as i32;
    (ptr, len)
}

impl PluginLoader {
    /// Create a new plugin loader
    pub fn new() -> Result<Self, LoaderError> {
        Self::with_fuel_limit(DEFAULT_FUEL_LIMIT)
    }

    /// Create a loader granting `fuel_limit` units per guest call
    pub fn with_fuel_limit(fuel_limit: u64) -> Result<Self, LoaderError> {
        let mut config = Config::new();
        config.consume_fuel(true);
        config.wasm_memory64(false);

        let engine = Engine::new(&config).map_err(LoaderError::EngineCreation)?;
        let linker = host_linker(&engine)?;

        Ok(Self {
            engine,
            linker,
            fuel_limit,
        })
    }

    /// Read and load a module file
    pub fn load_file(
        &self,
        plugin_id: &str,
        path: &Path,
    ) -> Result<ExtensionInstance, LoaderError> {
        let wasm_bytes = std::fs::read(path).map_err(|source| LoaderError::ReadModule {
            path: path.display().to_string(),
            source,
        })?;
        self.load(plugin_id, path.display().to_string(), &wasm_bytes)
    }

    /// Load a plugin from Wasm bytes (binary or text format)
    pub fn load(
        &self,
        plugin_id: &str,
        origin: impl Into<String>,
        wasm_bytes: &[u8],
    ) -> Result<ExtensionInstance, LoaderError> {
        // 1. Compile module
        let module =
            Module::new(&self.engine, wasm_bytes).map_err(LoaderError::ModuleCompilation)?;

        // 2. Fresh store: this is the plugin's isolation context
        let mut store = Store::new(
            &self.engine,
            GuestState {
                plugin_id: plugin_id.to_string(),
            },
        );
        store
            .set_fuel(self.fuel_limit)
            .map_err(LoaderError::EngineCreation)?;

        // 3. Instantiate against the host import module only
        let instance = self
            .linker
            .instantiate(&mut store, &module)
            .map_err(LoaderError::Instantiation)?;

        // 4. Resolve the capability contract
        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or(LoaderError::ExportNotFound("memory"))?;

        let mut guest = Guest {
            memory,
            alloc_fn: typed(&instance, &mut store, "plugin_alloc")?,
            dealloc_fn: typed(&instance, &mut store, "plugin_dealloc")?,
            config_fn: typed(&instance, &mut store, "plugin_config")?,
            routes_fn: typed(&instance, &mut store, "plugin_routes")?,
            handle_fn: typed(&instance, &mut store, "plugin_handle")?,
            display_name_fn: instance
                .get_typed_func::<(), i64>(&mut store, "plugin_display_name")
                .ok(),
            store,
            fuel_limit: self.fuel_limit,
        };

        // 5. Validate API version
        let version_fn: TypedFunc<(), i32> =
            typed(&instance, &mut guest.store, "plugin_api_version")?;
        guest.refuel()?;
        let actual = version_fn
            .call(&mut guest.store, ())
            .map_err(|e| call_error("plugin_api_version", e))?;
        if actual as i64 != API_VERSION as i64 {
            return Err(LoaderError::ApiVersionMismatch {
                expected: API_VERSION,
                actual: actual as i64,
            });
        }

        tracing::debug!(plugin = %plugin_id, "Module instantiated");

        Ok(ExtensionInstance {
            plugin_id: plugin_id.to_string(),
            origin: origin.into(),
            guest: Mutex::new(guest),
        })
    }
}

fn typed<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<GuestState>,
    name: &'static str,
) -> Result<TypedFunc<P, R>, LoaderError> {
    instance
        .get_typed_func::<P, R>(store, name)
        .map_err(|_| LoaderError::ExportNotFound(name))
}

fn call_error(function: &'static str, error: anyhow::Error) -> LoaderError {
    if matches!(error.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
        LoaderError::FuelExhausted(function)
    } else {
        LoaderError::FunctionCall {
            function,
            source: error,
        }
    }
}

/// Byte range named by a guest pointer and length; `None` when negative or overflowing
fn guest_range(ptr: i32, len: i32) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(ptr).ok()?;
    let end = start.checked_add(usize::try_from(len).ok()?)?;
    Some(start..end)
}

/// Linker exposing the `webplug` import module
fn host_linker(engine: &Engine) -> Result<Linker<GuestState>, LoaderError> {
    let mut linker = Linker::new(engine);
    linker
        .func_wrap(
            HOST_IMPORT_MODULE,
            "log",
            |mut caller: Caller<'_, GuestState>, level: i32, ptr: i32, len: i32| {
                let Some(memory) = caller.get_export("memory").and_then(Extern::into_memory) else {
                    return;
                };
                let data = memory.data(&caller);
                let Some(bytes) = guest_range(ptr, len).and_then(|range| data.get(range)) else {
                    return;
                };
                let message = String::from_utf8_lossy(bytes).into_owned();
                let plugin = caller.data().plugin_id.as_str();
                match level {
                    0 => tracing::error!(plugin = %plugin, "{message}"),
                    1 => tracing::warn!(plugin = %plugin, "{message}"),
                    2 => tracing::info!(plugin = %plugin, "{message}"),
                    3 => tracing::debug!(plugin = %plugin, "{message}"),
                    _ => tracing::trace!(plugin = %plugin, "{message}"),
                }
            },
        )
        .map_err(LoaderError::EngineCreation)?;
    Ok(linker)
}

/// Guest handles; only reachable through the instance mutex
struct Guest {
    store: Store<GuestState>,
    memory: Memory,
    alloc_fn: TypedFunc<i32, i32>,
    dealloc_fn: TypedFunc<(i32, i32), ()>,
    config_fn: TypedFunc<(), i64>,
    routes_fn: TypedFunc<(), i64>,
    handle_fn: TypedFunc<(i32, i32), i64>,
    display_name_fn: Option<TypedFunc<(), i64>>,
    fuel_limit: u64,
}

impl Guest {
    fn refuel(&mut self) -> Result<(), LoaderError> {
        self.store
            .set_fuel(self.fuel_limit)
            .map_err(LoaderError::EngineCreation)
    }

    /// Call a `() -> packed` export and take ownership of the returned buffer
    fn call_returning_bytes(
        &mut self,
        function: &'static str,
        func: TypedFunc<(), i64>,
    ) -> Result<Vec<u8>, LoaderError> {
        self.refuel()?;
        let packed = func
            .call(&mut self.store, ())
            .map_err(|e| call_error(function, e))?;
        self.take_buffer(packed)
    }

    fn take_buffer(&mut self, packed: i64) -> Result<Vec<u8>, LoaderError> {
        let (ptr, len) = unpack_ptr_len(packed);
        if ptr == 0 || len <= 0 {
            return Ok(Vec::new());
        }
        let bytes = self.read_memory(ptr, len)?;
        self.dealloc_fn.call(&mut self.store, (ptr, len)).ok();
        Ok(bytes)
    }

    fn read_memory(&self, ptr: i32, len: i32) -> Result<Vec<u8>, LoaderError> {
        let data = self.memory.data(&self.store);
        match guest_range(ptr, len).and_then(|range| data.get(range)) {
            Some(bytes) => Ok(bytes.to_vec()),
            None => Err(LoaderError::MemoryAccess(format!(
                "Out of bounds: ptr={}, len={}, memory_size={}",
                ptr,
                len,
                data.len()
            ))),
        }
    }

    fn write_buffer(&mut self, bytes: &[u8]) -> Result<(i32, i32), LoaderError> {
        let len = bytes.len() as i32;
        let ptr = self
            .alloc_fn
            .call(&mut self.store, len)
            .map_err(|e| call_error("plugin_alloc", e))?;
        self.memory
            .write(&mut self.store, ptr as usize, bytes)
            .map_err(|e| LoaderError::MemoryAccess(format!("Failed to write request: {}", e)))?;
        Ok((ptr, len))
    }
}

/// One instantiated plugin module
///
/// Guest calls are serialized by an internal mutex, so a shared
/// `Arc<ExtensionInstance>` can be used from any number of request tasks.
pub struct ExtensionInstance {
    plugin_id: String,
    origin: String,
    guest: Mutex<Guest>,
}

impl std::fmt::Debug for ExtensionInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionInstance")
            .field("plugin_id", &self.plugin_id)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl ExtensionInstance {
    fn guest(&self) -> Result<std::sync::MutexGuard<'_, Guest>, LoaderError> {
        self.guest.lock().map_err(|_| LoaderError::Poisoned)
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Where this module was loaded from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Raw embedded module config
    pub fn config_bytes(&self) -> Result<Vec<u8>, LoaderError> {
        let mut guest = self.guest()?;
        let func = guest.config_fn.clone();
        guest.call_returning_bytes("plugin_config", func)
    }

    /// Guest override of the display name, if it exports one
    pub fn display_name(&self) -> Result<Option<String>, LoaderError> {
        let mut guest = self.guest()?;
        let Some(func) = guest.display_name_fn.clone() else {
            return Ok(None);
        };
        let bytes = guest.call_returning_bytes("plugin_display_name", func)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| LoaderError::MemoryAccess("display name is not UTF-8".to_string()))
    }

    /// Routes contributed by the guest
    pub fn route_specs(&self) -> Result<Vec<RouteSpec>, LoaderError> {
        let mut guest = self.guest()?;
        let func = guest.routes_fn.clone();
        let bytes = guest.call_returning_bytes("plugin_routes", func)?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        rmp_serde::from_slice(&bytes).map_err(LoaderError::Deserialization)
    }

    /// Execute a request inside the guest
    pub fn handle(&self, request: &GuestRequest) -> Result<GuestResponse, LoaderError> {
        let request_bytes = rmp_serde::to_vec(request).map_err(LoaderError::Serialization)?;

        let mut guard = self.guest()?;
        let guest = &mut *guard;
        guest.refuel()?;
        let (req_ptr, req_len) = guest.write_buffer(&request_bytes)?;

        let handle_fn = guest.handle_fn.clone();
        let packed = handle_fn
            .call(&mut guest.store, (req_ptr, req_len))
            .map_err(|e| call_error("plugin_handle", e));

        guest
            .dealloc_fn
            .call(&mut guest.store, (req_ptr, req_len))
            .ok();
        let response_bytes = guest.take_buffer(packed?)?;

        rmp_serde::from_slice(&response_bytes).map_err(LoaderError::Deserialization)
    }
}
