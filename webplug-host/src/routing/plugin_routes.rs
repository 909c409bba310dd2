//! Route tree of one plugin, relative to its namespace

use super::handler::{GuestHandler, RequestHandler};
use super::http::{HttpRequest, HttpResponse};
use crate::loader::LoaderError;
use crate::registry::LoadedPlugin;
use crate::static_content::{SinglePageApplication, StaticContentError};
use std::sync::Arc;
use thiserror::Error;
use webplug_api::{Method, RouteSpec};

/// A declared route that could not be installed.
///
/// These never unmount the plugin; the offending route is left out.
#[derive(Debug, Error)]
pub enum RouteBuildError {
    #[error("Failed to read routes from guest: {0}")]
    Guest(#[source] LoaderError),

    #[error("Invalid route path '{0}': must start with '/'")]
    InvalidPath(String),

    #[error("Cannot serve bundle for route '{route}': {source}")]
    Bundle {
        route: String,
        #[source]
        source: StaticContentError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Exact(String),
    /// `/api/*`, stored as `/api/`
    Prefix(String),
}

impl PathPattern {
    fn parse(path: &str) -> Result<Self, RouteBuildError> {
        if !path.starts_with('/') {
            return Err(RouteBuildError::InvalidPath(path.to_string()));
        }
        Ok(match path.strip_suffix('*') {
            Some(prefix) if prefix.ends_with('/') => PathPattern::Prefix(prefix.to_string()),
            _ => PathPattern::Exact(path.to_string()),
        })
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => exact == path,
            PathPattern::Prefix(prefix) => {
                path.starts_with(prefix.as_str()) || path == prefix.trim_end_matches('/')
            }
        }
    }
}

struct Endpoint {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn RequestHandler>,
}

struct Mount {
    /// Without trailing slash; empty for the namespace root
    prefix: String,
    handler: Arc<dyn RequestHandler>,
}

impl Mount {
    /// Remaining path below this mount, or `None` if it does not apply
    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }
}

/// Everything one plugin serves below `/plugins/{namespace}/`
pub struct PluginRoutes {
    namespace: String,
    endpoints: Vec<Endpoint>,
    mounts: Vec<Mount>,
}

impl std::fmt::Debug for PluginRoutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRoutes")
            .field("namespace", &self.namespace)
            .field("endpoints", &self.endpoints.len())
            .field("mounts", &self.mounts.len())
            .finish()
    }
}

impl PluginRoutes {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            endpoints: Vec::new(),
            mounts: Vec::new(),
        }
    }

    /// Ask the guest for its routes and build handlers for them.
    ///
    /// Routes that cannot be installed are returned as errors next to the
    /// (possibly empty) route tree.
    pub fn build(plugin: &LoadedPlugin) -> (Self, Vec<RouteBuildError>) {
        let mut routes = Self::new(plugin.descriptor.route_namespace());
        let mut errors = Vec::new();

        let specs = match plugin.instance.route_specs() {
            Ok(specs) => specs,
            Err(e) => {
                errors.push(RouteBuildError::Guest(e));
                return (routes, errors);
            }
        };

        let guest: Arc<dyn RequestHandler> =
            Arc::new(GuestHandler::new(Arc::clone(&plugin.instance)));

        for spec in specs {
            let installed = match spec {
                RouteSpec::Handler { method, path } => {
                    routes.endpoint(method, &path, Arc::clone(&guest))
                }
                RouteSpec::SinglePageApp(spa) => {
                    SinglePageApplication::from_spec(&plugin.artifact_dir, &spa)
                        .map_err(|source| RouteBuildError::Bundle {
                            route: spa.application_route.clone(),
                            source,
                        })
                        .and_then(|app| routes.mount(&spa.application_route, Arc::new(app)))
                }
            };
            if let Err(e) = installed {
                errors.push(e);
            }
        }

        (routes, errors)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Handle `method path` exactly (or below a `/*` prefix)
    pub fn endpoint(
        &mut self,
        method: Method,
        path: &str,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), RouteBuildError> {
        let pattern = PathPattern::parse(path)?;
        self.endpoints.push(Endpoint {
            method,
            pattern,
            handler,
        });
        Ok(())
    }

    /// Hand everything below `prefix` to `handler`, with the prefix stripped
    pub fn mount(
        &mut self,
        prefix: &str,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), RouteBuildError> {
        if !prefix.starts_with('/') {
            return Err(RouteBuildError::InvalidPath(prefix.to_string()));
        }
        self.mounts.push(Mount {
            prefix: prefix.trim_end_matches('/').to_string(),
            handler,
        });
        // Most specific mount first
        self.mounts.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Ok(())
    }

    /// Dispatch a request whose path is relative to the namespace
    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let matching: Vec<&Endpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.pattern.matches(&request.path))
            .collect();

        let fallback = (request.method == Method::Head).then_some(Method::Get);
        let endpoint = matching
            .iter()
            .find(|e| e.method == request.method)
            .or_else(|| matching.iter().find(|e| Some(e.method) == fallback));
        if let Some(endpoint) = endpoint {
            return endpoint.handler.handle(request).await;
        }

        for mount in &self.mounts {
            if let Some(rest) = mount.strip(&request.path) {
                let rest = rest.to_string();
                return mount.handler.handle(request.with_path(rest)).await;
            }
        }

        if matching.is_empty() {
            return HttpResponse::not_found();
        }

        let mut allowed: Vec<&str> = matching.iter().map(|e| e.method.as_str()).collect();
        allowed.sort_unstable();
        allowed.dedup();
        HttpResponse::method_not_allowed(&allowed.join(", "))
    }
}
