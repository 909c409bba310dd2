//! Route composition
//!
//! Mounts every loaded plugin under `/plugins/{hostname}/`. Namespaces are
//! claimed first-come-first-served in discovery order; a later plugin asking
//! for a taken namespace is rejected, never merged.

use super::handler::RequestHandler;
use super::pages::{LandingPage, ListingEntry, PluginListing};
use super::plugin_routes::{PluginRoutes, RouteBuildError};
use super::table::{HostBoundary, MountError};
use crate::registry::LoadedPlugin;
use std::collections::HashMap;
use std::sync::Arc;
use webplug_api::Method;

/// A plugin that lost its namespace to an earlier one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConflict {
    pub namespace: String,
    /// Id of the plugin that keeps the namespace
    pub kept: String,
    /// Id of the rejected plugin
    pub rejected: String,
    pub rejected_origin: String,
}

/// Outcome of composing the routing table
#[derive(Debug, Default)]
pub struct Composition {
    /// Mounted plugins in discovery order; the listing shows exactly these
    pub mounted: Vec<ListingEntry>,
    pub conflicts: Vec<NamespaceConflict>,
    /// Routes left out of an otherwise mounted plugin, keyed by plugin id
    pub route_errors: Vec<(String, RouteBuildError)>,
}

pub struct RouteComposer;

impl RouteComposer {
    /// Mount `plugins` plus the landing page and listing into `boundary`
    pub fn compose<B: HostBoundary>(plugins: &[LoadedPlugin], boundary: &mut B) -> Composition {
        let mut composition = Composition::default();
        let mut owners: HashMap<String, String> = HashMap::new();

        for plugin in plugins {
            let id = plugin.descriptor.id();
            let namespace = plugin.descriptor.route_namespace();

            let owner = match owners.get(namespace) {
                Some(kept) => Some(kept.clone()),
                None => boundary.is_mounted(namespace).then(|| "<host>".to_string()),
            };
            if let Some(kept) = owner {
                composition
                    .conflicts
                    .push(Self::conflict(plugin, namespace, kept));
                continue;
            }

            let (routes, errors) = PluginRoutes::build(plugin);
            for error in errors {
                tracing::warn!(
                    plugin = %id,
                    namespace = %namespace,
                    error = %error,
                    "Route left out"
                );
                composition.route_errors.push((id.to_string(), error));
            }

            if let Err(MountError::AlreadyMounted(_)) = boundary.mount(routes) {
                composition
                    .conflicts
                    .push(Self::conflict(plugin, namespace, "<host>".to_string()));
                continue;
            }

            owners.insert(namespace.to_string(), id.to_string());
            let entry = ListingEntry::for_plugin(plugin);
            tracing::info!(
                plugin = %id,
                name = %entry.display_name,
                path = %entry.link,
                "Plugin mounted"
            );
            composition.mounted.push(entry);
        }

        let landing: Arc<dyn RequestHandler> =
            Arc::new(LandingPage::new(composition.mounted.len()));
        let listing: Arc<dyn RequestHandler> =
            Arc::new(PluginListing::new(composition.mounted.clone()));
        boundary.route(Method::Get, "/", landing);
        boundary.route(Method::Get, "/plugins/", listing);

        composition
    }

    fn conflict(plugin: &LoadedPlugin, namespace: &str, kept: String) -> NamespaceConflict {
        tracing::error!(
            plugin = %plugin.descriptor.id(),
            origin = %plugin.descriptor.origin_location(),
            namespace = %namespace,
            kept = %kept,
            "Namespace conflict: plugin not mounted"
        );
        NamespaceConflict {
            namespace: namespace.to_string(),
            kept,
            rejected: plugin.descriptor.id().to_string(),
            rejected_origin: plugin.descriptor.origin_location().to_string(),
        }
    }
}
