//! Startup: discover plugins, compose routes, freeze the table

use crate::config::HostConfig;
use crate::loader::{LoaderError, PluginLoader};
use crate::registry::{DiscoveryError, DiscoveryResult, ExtensionRegistry, LoadedPlugin};
use crate::routing::{Composition, HttpRequest, HttpResponse, RouteComposer, RoutingTable};
use std::sync::Arc;
use thiserror::Error;

/// Fatal startup errors
#[derive(Debug, Error)]
pub enum BootError {
    #[error("Failed to initialize wasm runtime: {0}")]
    Runtime(#[from] LoaderError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// A booted host: loaded plugins plus the immutable routing table
#[derive(Debug)]
pub struct Host {
    table: Arc<RoutingTable>,
    composition: Composition,
    discovery: DiscoveryResult,
}

impl Host {
    pub fn boot(config: &HostConfig) -> Result<Self, BootError> {
        tracing::info!(
            plugins_dir = %config.plugins_dir.display(),
            fuel_limit = config.fuel_limit,
            "Booting host"
        );

        let registry =
            ExtensionRegistry::with_loader(PluginLoader::with_fuel_limit(config.fuel_limit)?);
        let discovery = registry.discover(&config.plugins_dir)?;

        let mut table = RoutingTable::new();
        let composition = RouteComposer::compose(&discovery.plugins, &mut table);

        tracing::info!(
            mounted = composition.mounted.len(),
            conflicts = composition.conflicts.len(),
            skipped = discovery.skipped(),
            "Routes composed"
        );

        Ok(Self {
            table: Arc::new(table),
            composition,
            discovery,
        })
    }

    /// Shared handle for the serving layer
    pub fn table(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.table)
    }

    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        self.table.dispatch(request).await
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn discovery(&self) -> &DiscoveryResult {
        &self.discovery
    }

    /// Every plugin that passed discovery, including ones that lost a namespace
    pub fn plugins(&self) -> &[LoadedPlugin] {
        &self.discovery.plugins
    }
}
