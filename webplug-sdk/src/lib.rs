//! webplug-sdk: SDK for creating webplug Wasm plugins
//!
//! This SDK provides utilities and helpers for creating plugins that
//! contribute routes to a webplug host with minimal boilerplate.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use webplug_sdk::prelude::*;
//!
//! struct MyPlugin;
//!
//! impl Plugin for MyPlugin {
//!     fn config() -> &'static str {
//!         include_str!("../server.module.toml")
//!     }
//!
//!     fn routes() -> Vec<RouteSpec> {
//!         vec![
//!             RouteSpec::get("/api/hello"),
//!             SpaSpec::new("/app", "dist").into(),
//!         ]
//!     }
//!
//!     fn handle(request: GuestRequest) -> GuestResponse {
//!         GuestResponse::text(format!("Hello from {}!", request.path))
//!     }
//! }
//!
//! // Generate all required exports
//! export_plugin!(MyPlugin);
//! ```

use std::alloc::{alloc, dealloc, Layout};

// Re-export everything from webplug-api
pub use webplug_api::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{export_plugin, host, memory, Plugin};
    pub use webplug_api::{
        GuestRequest, GuestResponse, IgnoreRule, Method, Precompressed, RouteSpec, SpaSpec,
        API_VERSION,
    };
}

/// Trait that plugins must implement
pub trait Plugin {
    /// Embedded module config (TOML with `name` and `hostname`)
    fn config() -> &'static str;

    /// Routes contributed under `/plugins/{hostname}/`
    fn routes() -> Vec<RouteSpec>;

    /// Handles a request matched by one of the `RouteSpec::Handler` routes
    fn handle(request: GuestRequest) -> GuestResponse;

    /// Display name shown in the host listing; `None` uses the config `name`
    fn display_name() -> Option<String> {
        None
    }
}

/// Memory utilities for Wasm plugin development
pub mod memory {
    use super::*;

    /// Allocate memory in the Wasm linear memory
    #[inline]
    pub fn plugin_alloc(size: i32) -> i32 {
        if size <= 0 {
            return 0;
        }
        match Layout::from_size_align(size as usize, 1) {
            Ok(layout) => unsafe { alloc(layout) as i32 },
            Err(_) => 0,
        }
    }

    /// Deallocate memory in the Wasm linear memory
    ///
    /// # Safety
    /// The ptr must have been allocated by `plugin_alloc` with the same size.
    #[inline]
    pub fn plugin_dealloc(ptr: i32, size: i32) {
        if ptr == 0 || size <= 0 {
            return;
        }
        if let Ok(layout) = Layout::from_size_align(size as usize, 1) {
            unsafe { dealloc(ptr as *mut u8, layout) }
        }
    }

    /// Pack a pointer and length into a single i64 value
    ///
    /// wasm32-unknown-unknown doesn't support multi-value returns.
    #[inline]
    pub fn pack_ptr_len(ptr: i32, len: i32) -> i64 {
        ((ptr as i64) << 32) | (len as i64 & 0xFFFFFFFF)
    }

    /// Copy raw bytes into a fresh guest buffer and return it packed
    pub fn return_bytes(bytes: &[u8]) -> i64 {
        let len = bytes.len() as i32;
        let ptr = plugin_alloc(len);

        if ptr != 0 && len > 0 {
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, len as usize);
            }
        }

        pack_ptr_len(ptr, len)
    }

    /// Serialize data and return it as an allocated buffer
    pub fn serialize_and_return<T: serde::Serialize>(data: &T) -> i64 {
        let bytes = rmp_serde::to_vec(data).unwrap_or_default();
        return_bytes(&bytes)
    }

    /// Deserialize data from a raw pointer and length
    ///
    /// # Safety
    /// The pointer must be valid and point to `len` bytes of valid MessagePack data.
    pub unsafe fn deserialize_from_ptr<T: serde::de::DeserializeOwned>(
        ptr: i32,
        len: i32,
    ) -> Option<T> {
        if ptr == 0 || len <= 0 {
            return None;
        }
        let slice = std::slice::from_raw_parts(ptr as *const u8, len as usize);
        rmp_serde::from_slice(slice).ok()
    }
}

/// Functions imported from the host
pub mod host {
    /// Log levels understood by the host's `log` import
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Level {
        Error = 0,
        Warn = 1,
        Info = 2,
        Debug = 3,
        Trace = 4,
    }

    #[cfg(target_arch = "wasm32")]
    #[link(wasm_import_module = "webplug")]
    extern "C" {
        #[link_name = "log"]
        fn host_log(level: i32, ptr: i32, len: i32);
    }

    /// Emit a log line through the host's tracing subscriber
    pub fn log(level: Level, message: &str) {
        #[cfg(target_arch = "wasm32")]
        unsafe {
            host_log(level as i32, message.as_ptr() as i32, message.len() as i32);
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (level, message);
        }
    }
}

/// Macro to export all required plugin functions
///
/// Generates `plugin_api_version`, `plugin_config`, `plugin_routes`,
/// `plugin_handle`, `plugin_display_name`, `plugin_alloc` and `plugin_dealloc`.
#[macro_export]
macro_rules! export_plugin {
    ($plugin:ty) => {
        #[no_mangle]
        pub extern "C" fn plugin_api_version() -> i32 {
            $crate::API_VERSION as i32
        }

        #[no_mangle]
        pub extern "C" fn plugin_config() -> i64 {
            let config = <$plugin as $crate::Plugin>::config();
            $crate::memory::return_bytes(config.as_bytes())
        }

        #[no_mangle]
        pub extern "C" fn plugin_routes() -> i64 {
            let routes = <$plugin as $crate::Plugin>::routes();
            $crate::memory::serialize_and_return(&routes)
        }

        #[no_mangle]
        pub extern "C" fn plugin_handle(req_ptr: i32, req_len: i32) -> i64 {
            let request: Option<$crate::GuestRequest> =
                unsafe { $crate::memory::deserialize_from_ptr(req_ptr, req_len) };
            let response = match request {
                Some(request) => <$plugin as $crate::Plugin>::handle(request),
                None => $crate::GuestResponse::status(400),
            };
            $crate::memory::serialize_and_return(&response)
        }

        #[no_mangle]
        pub extern "C" fn plugin_display_name() -> i64 {
            match <$plugin as $crate::Plugin>::display_name() {
                Some(name) => $crate::memory::return_bytes(name.as_bytes()),
                None => 0,
            }
        }

        #[no_mangle]
        pub extern "C" fn plugin_alloc(size: i32) -> i32 {
            $crate::memory::plugin_alloc(size)
        }

        #[no_mangle]
        pub extern "C" fn plugin_dealloc(ptr: i32, size: i32) {
            $crate::memory::plugin_dealloc(ptr, size)
        }
    };
}
