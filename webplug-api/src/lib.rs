//! webplug-api: Shared types for the webplug plugin system
//!
//! This crate defines the protocol between host and guest (wasm plugin).
//! Structured payloads use MessagePack serialization; the embedded module
//! config is passed through as raw TOML text.

use serde::{Deserialize, Serialize};

/// API version for compatibility checking
pub const API_VERSION: u32 = 1;

/// Capability id a plugin manifest maps to its route-providing modules
pub const ROUTES_CAPABILITY: &str = "webplug.routes/1";

/// Import module name under which the host exposes its functions to guests
pub const HOST_IMPORT_MODULE: &str = "webplug";

/// HTTP method understood by plugin routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One route contributed by a plugin, relative to the plugin's namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouteSpec {
    /// Requests matching `method` and `path` are executed inside the guest.
    ///
    /// A path ending in `/*` matches every request below that prefix.
    Handler { method: Method, path: String },

    /// A bundled single-page application served by the host
    SinglePageApp(SpaSpec),
}

impl RouteSpec {
    /// GET handler executed by the guest
    pub fn get(path: impl Into<String>) -> Self {
        Self::Handler {
            method: Method::Get,
            path: path.into(),
        }
    }

    /// POST handler executed by the guest
    pub fn post(path: impl Into<String>) -> Self {
        Self::Handler {
            method: Method::Post,
            path: path.into(),
        }
    }

    /// Handler for an arbitrary method
    pub fn handler(method: Method, path: impl Into<String>) -> Self {
        Self::Handler {
            method,
            path: path.into(),
        }
    }
}

impl From<SpaSpec> for RouteSpec {
    fn from(spec: SpaSpec) -> Self {
        Self::SinglePageApp(spec)
    }
}

/// Single-page application served from a directory inside the plugin artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaSpec {
    /// Route under the plugin namespace, e.g. `/app`
    pub application_route: String,

    /// Bundle directory relative to the artifact root, e.g. `dist`
    pub files_path: String,

    /// Served for directory requests and for unmatched paths
    pub default_page: String,

    /// Files that must never be served (answered with 403)
    #[serde(default)]
    pub ignored: Vec<IgnoreRule>,

    /// Extension fallbacks tried in order when a path is not found
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Precompressed variants in priority order
    #[serde(default)]
    pub pre_compressed: Vec<Precompressed>,

    /// `Cache-Control: max-age` for served assets
    #[serde(default)]
    pub max_age: Option<u32>,

    /// Answer HEAD requests from the same resolution as GET
    #[serde(default = "default_true")]
    pub auto_head: bool,
}

fn default_true() -> bool {
    true
}

impl SpaSpec {
    /// Create a spec serving `files_path` at `application_route` with `index.html`
    pub fn new(application_route: impl Into<String>, files_path: impl Into<String>) -> Self {
        Self {
            application_route: application_route.into(),
            files_path: files_path.into(),
            default_page: "index.html".to_string(),
            ignored: Vec::new(),
            extensions: Vec::new(),
            pre_compressed: Vec::new(),
            max_age: None,
            auto_head: true,
        }
    }

    /// Set the default page
    pub fn default_page(mut self, page: impl Into<String>) -> Self {
        self.default_page = page.into();
        self
    }

    /// Add an ignore rule
    pub fn ignore(mut self, rule: IgnoreRule) -> Self {
        self.ignored.push(rule);
        self
    }

    /// Add an extension fallback
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    /// Add a precompressed variant (earlier calls win)
    pub fn pre_compressed(mut self, kind: Precompressed) -> Self {
        self.pre_compressed.push(kind);
        self
    }

    /// Set the cache max-age in seconds
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }
}

/// Rule matched against the bundle-relative path (`/`-separated) of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreRule {
    /// Path ends with the given text, e.g. `.map`
    Suffix(String),
    /// Path starts with the given text, e.g. `private/`
    Prefix(String),
    /// Any path segment equals the given text, e.g. `.git`
    Segment(String),
}

impl IgnoreRule {
    pub fn matches(&self, relative_path: &str) -> bool {
        match self {
            IgnoreRule::Suffix(suffix) => relative_path.ends_with(suffix.as_str()),
            IgnoreRule::Prefix(prefix) => relative_path.starts_with(prefix.as_str()),
            IgnoreRule::Segment(segment) => relative_path.split('/').any(|s| s == segment),
        }
    }
}

/// Precompressed file variants a bundle may ship next to an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precompressed {
    /// `asset.br`
    Brotli,
    /// `asset.gz`
    Gzip,
    /// `asset.zst`
    Zstd,
}

/// Request forwarded to a guest handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestRequest {
    pub method: Method,

    /// Path relative to the plugin namespace, always starting with `/`
    pub path: String,

    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub headers: Vec<(String, String)>,

    #[serde(default)]
    pub body: Vec<u8>,
}

/// Response produced by a guest handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestResponse {
    pub status: u16,

    #[serde(default)]
    pub headers: Vec<(String, String)>,

    #[serde(default)]
    pub body: Vec<u8>,
}

impl GuestResponse {
    /// 200 with a `text/plain` body
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.into().into_bytes(),
        }
    }

    /// 200 with an `application/json` body
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.into().into_bytes(),
        }
    }

    /// Empty response with the given status
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Override the status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Append a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
