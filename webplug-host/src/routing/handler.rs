//! Request handlers
//!
//! Everything mounted in the routing table is a [`RequestHandler`]: guest
//! endpoints, bundled applications and the host's own pages.

use super::http::{HttpRequest, HttpResponse};
use crate::loader::{ExtensionInstance, LoaderError};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: HttpRequest) -> HttpResponse;
}

/// Executes requests inside a plugin's wasm instance.
///
/// Guest calls are CPU-bound and serialized per instance, so they run on the
/// blocking pool. Any guest failure becomes a 500 for this request only.
pub struct GuestHandler {
    instance: Arc<ExtensionInstance>,
}

impl GuestHandler {
    pub fn new(instance: Arc<ExtensionInstance>) -> Self {
        Self { instance }
    }
}

#[async_trait]
impl RequestHandler for GuestHandler {
    async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let instance = Arc::clone(&self.instance);
        let path = request.path.clone();
        let guest_request = request.into_guest();

        let outcome = tokio::task::spawn_blocking(move || instance.handle(&guest_request)).await;

        match outcome {
            Ok(Ok(response)) => response.into(),
            Ok(Err(e)) => {
                log_guest_failure(self.instance.plugin_id(), &path, &e);
                HttpResponse::internal_error()
            }
            Err(e) => {
                tracing::error!(
                    plugin = %self.instance.plugin_id(),
                    path = %path,
                    error = %e,
                    "Guest call did not complete"
                );
                HttpResponse::internal_error()
            }
        }
    }
}

fn log_guest_failure(plugin: &str, path: &str, error: &LoaderError) {
    match error {
        LoaderError::FuelExhausted(_) => tracing::warn!(
            plugin = %plugin,
            path = %path,
            error = %error,
            "Guest exceeded its CPU budget"
        ),
        _ => tracing::error!(
            plugin = %plugin,
            path = %path,
            error = %error,
            "Guest request failed"
        ),
    }
}
