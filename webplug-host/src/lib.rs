//! webplug-host: plugin runtime for the webplug web host
//!
//! Loads wasm plugins from a directory, mounts each under
//! `/plugins/{hostname}/`, and serves their bundled single-page apps.
//!
//! ```text
//! HostConfig ──► ExtensionRegistry ──► RouteComposer ──► RoutingTable
//!                (one Store per module)  (first wins)     (Arc, read-only)
//! ```

pub mod config;
pub mod descriptor;
pub mod host;
pub mod introspection;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod routing;
pub mod static_content;

pub use config::{ConfigError, HostConfig};
pub use descriptor::{DescriptorError, ModuleConfig, PluginDescriptor};
pub use host::{BootError, Host};
pub use loader::{ExtensionInstance, LoaderError, PluginLoader};
pub use manifest::{ArtifactManifest, ManifestError};
pub use registry::{DiscoveryError, DiscoveryResult, ExtensionRegistry, LoadedPlugin};
pub use routing::{
    Composition, HostBoundary, HttpRequest, HttpResponse, NamespaceConflict, RequestHandler,
    RouteComposer, RoutingTable,
};
pub use static_content::{
    Resolution, ResolvedAsset, StaticAssetRequest, StaticContentConfig, StaticResourceResolver,
};
pub use webplug_api::{GuestRequest, GuestResponse, Method, RouteSpec, SpaSpec};
