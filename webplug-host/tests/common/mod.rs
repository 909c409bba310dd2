//! Guest module fixtures
//!
//! Builds plugin modules as WebAssembly text so tests need no wasm toolchain.
//! Every export returns a constant buffer laid out in a data segment; the
//! allocator is a bump pointer and `plugin_dealloc` is a no-op, so constant
//! buffers stay valid across calls.

#![allow(dead_code)]

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use webplug_api::{GuestResponse, RouteSpec, SpaSpec};

/// What `plugin_display_name` does
#[derive(Debug, Clone)]
pub enum DisplayName {
    Absent,
    Name(String),
    Trap,
}

/// What `plugin_handle` does
#[derive(Debug, Clone)]
pub enum Handler {
    Respond(GuestResponse),
    /// Return this packed pointer/length as-is
    Packed(i64),
    Trap,
    Spin,
}

#[derive(Debug, Clone)]
pub struct GuestModule {
    pub config: String,
    /// Packed value `plugin_config` returns instead of the config buffer
    pub config_packed: Option<i64>,
    /// `(ptr, len)` passed to the host `log` import before returning the config
    pub config_log: Option<(i32, i32)>,
    pub routes: Vec<RouteSpec>,
    pub display_name: DisplayName,
    pub handler: Handler,
    pub api_version: u32,
}

impl GuestModule {
    /// Module with `name`/`hostname` config, serving `dist/` at its root
    pub fn new(name: &str, hostname: &str) -> Self {
        Self {
            config: format!("name = \"{}\"\nhostname = \"{}\"\n", name, hostname),
            config_packed: None,
            config_log: None,
            routes: vec![SpaSpec::new("/", "dist").into()],
            display_name: DisplayName::Absent,
            handler: Handler::Respond(GuestResponse::status(404)),
            api_version: webplug_api::API_VERSION,
        }
    }

    pub fn with_config(mut self, config: &str) -> Self {
        self.config = config.to_string();
        self
    }

    pub fn with_config_packed(mut self, packed: i64) -> Self {
        self.config_packed = Some(packed);
        self
    }

    pub fn with_config_log(mut self, ptr: i32, len: i32) -> Self {
        self.config_log = Some((ptr, len));
        self
    }

    pub fn with_routes(mut self, routes: Vec<RouteSpec>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_display_name(mut self, display_name: DisplayName) -> Self {
        self.display_name = display_name;
        self
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Render the module as WebAssembly text
    pub fn to_wat(&self) -> String {
        let mut data = DataLayout::new(1024);

        let config = data.push(self.config.as_bytes());
        let config = self.config_packed.unwrap_or(config);
        let config_log = match self.config_log {
            Some((ptr, len)) => format!(
                "i32.const 2\n    i32.const {}\n    i32.const {}\n    call $log\n    ",
                ptr, len
            ),
            None => String::new(),
        };
        let routes = data.push(&rmp_serde::to_vec(&self.routes).expect("Failed to encode routes"));

        let handle_body = match &self.handler {
            Handler::Respond(response) => {
                let bytes = rmp_serde::to_vec(response).expect("Failed to encode response");
                format!("i64.const {}", data.push(&bytes))
            }
            Handler::Packed(packed) => format!("i64.const {}", packed),
            Handler::Trap => "unreachable".to_string(),
            Handler::Spin => "(loop $spin (br $spin))\n    i64.const 0".to_string(),
        };

        let display_name = match &self.display_name {
            DisplayName::Absent => String::new(),
            DisplayName::Name(name) => format!(
                "  (func (export \"plugin_display_name\") (result i64)\n    i64.const {})\n",
                data.push(name.as_bytes())
            ),
            DisplayName::Trap => {
                "  (func (export \"plugin_display_name\") (result i64)\n    unreachable)\n"
                    .to_string()
            }
        };

        format!(
            r#"(module
  (import "webplug" "log" (func $log (param i32 i32 i32)))
  (memory (export "memory") 4)
  (global $next (mut i32) (i32.const 131072))
{segments}
  (func (export "plugin_alloc") (param $size i32) (result i32)
    (local $ptr i32)
    global.get $next
    local.set $ptr
    global.get $next
    local.get $size
    i32.add
    global.set $next
    local.get $ptr)
  (func (export "plugin_dealloc") (param i32 i32))
  (func (export "plugin_api_version") (result i32)
    i32.const {version})
  (func (export "plugin_config") (result i64)
    {config_log}i64.const {config})
  (func (export "plugin_routes") (result i64)
    i64.const {routes})
  (func (export "plugin_handle") (param i32 i32) (result i64)
    {handle_body})
{display_name})
"#,
            segments = data.segments,
            version = self.api_version,
        )
    }
}

struct DataLayout {
    offset: usize,
    segments: String,
}

impl DataLayout {
    fn new(offset: usize) -> Self {
        Self {
            offset,
            segments: String::new(),
        }
    }

    /// Place `bytes` in a data segment and return the packed `(ptr << 32) | len`
    fn push(&mut self, bytes: &[u8]) -> i64 {
        let ptr = self.offset;
        let mut escaped = String::with_capacity(bytes.len() * 3);
        for byte in bytes {
            write!(escaped, "\\{:02x}", byte).expect("Failed to escape data");
        }
        writeln!(
            self.segments,
            "  (data (i32.const {}) \"{}\")",
            ptr, escaped
        )
        .expect("Failed to write segment");

        self.offset += bytes.len().max(1);
        assert!(self.offset < 131072, "fixture data overlaps the heap");
        ((ptr as i64) << 32) | bytes.len() as i64
    }
}

/// Packed `(ptr << 32) | len`, for returning pointers outside guest memory
pub fn pack(ptr: i32, len: i32) -> i64 {
    ((ptr as i64) << 32) | (len as i64 & 0xFFFF_FFFF)
}

/// Write an artifact directory holding `modules` and its manifest
pub fn write_artifact(
    plugins_dir: &Path,
    name: &str,
    modules: &[(&str, &GuestModule)],
) -> PathBuf {
    let artifact = plugins_dir.join(name);
    fs::create_dir_all(&artifact).expect("Failed to create artifact dir");

    let mut listed = Vec::new();
    for (file, module) in modules {
        fs::write(artifact.join(file), module.to_wat()).expect("Failed to write module");
        listed.push(format!("\"{}\"", file));
    }

    fs::write(
        artifact.join("plugin.toml"),
        format!(
            "[provides]\n\"webplug.routes/1\" = [{}]\n",
            listed.join(", ")
        ),
    )
    .expect("Failed to write manifest");

    artifact
}

/// Write a single-module artifact with a `dist/index.html` bundle
pub fn write_plugin(plugins_dir: &Path, name: &str, module: &GuestModule) -> PathBuf {
    let file = format!("{}.wasm", name);
    let artifact = write_artifact(plugins_dir, name, &[(file.as_str(), module)]);
    write_bundle(
        &artifact,
        "dist",
        &[("index.html", &format!("<h1>{} index</h1>", name))],
    );
    artifact
}

/// Write files below `artifact/dir`
pub fn write_bundle(artifact: &Path, dir: &str, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let target = artifact.join(dir).join(path);
        fs::create_dir_all(target.parent().expect("bundle file has a parent"))
            .expect("Failed to create bundle dir");
        fs::write(target, contents).expect("Failed to write bundle file");
    }
}
