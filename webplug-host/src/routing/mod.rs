//! Route composition and dispatch
//!
//! ```text
//! /                      landing page
//! /plugins/              listing (HTML or JSON)
//! /plugins/{ns}          308 → /plugins/{ns}/
//! /plugins/{ns}/**       PluginRoutes of the plugin owning {ns}
//! ```

pub mod composer;
pub mod handler;
pub mod http;
pub mod pages;
pub mod plugin_routes;
pub mod table;

pub use composer::{Composition, NamespaceConflict, RouteComposer};
pub use handler::{GuestHandler, RequestHandler};
pub use http::{HttpRequest, HttpResponse};
pub use pages::{LandingPage, ListingEntry, PluginListing};
pub use plugin_routes::{PluginRoutes, RouteBuildError};
pub use table::{HostBoundary, MountError, RoutingTable, PLUGINS_PREFIX};
