//! The composed routing table

use super::handler::RequestHandler;
use super::http::{HttpRequest, HttpResponse};
use super::plugin_routes::PluginRoutes;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use webplug_api::Method;

/// Path prefix under which plugin namespaces are mounted
pub const PLUGINS_PREFIX: &str = "/plugins/";

#[derive(Debug, Error)]
pub enum MountError {
    #[error("Namespace '{0}' is already mounted")]
    AlreadyMounted(String),
}

/// What the composer needs from the web server it mounts into
pub trait HostBoundary {
    /// Register a host-level route (exact path)
    fn route(&mut self, method: Method, path: &str, handler: Arc<dyn RequestHandler>);

    /// Mount a plugin's routes under `/plugins/{namespace}/`
    fn mount(&mut self, routes: PluginRoutes) -> Result<(), MountError>;

    fn is_mounted(&self, namespace: &str) -> bool;
}

struct HostRoute {
    method: Method,
    path: String,
    handler: Arc<dyn RequestHandler>,
}

/// In-process dispatcher for the host's routes and plugin namespaces.
///
/// Filled once during composition, then shared read-only.
#[derive(Default)]
pub struct RoutingTable {
    routes: Vec<HostRoute>,
    namespaces: HashMap<String, PluginRoutes>,
}

impl std::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<String> = self
            .routes
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        f.debug_struct("RoutingTable")
            .field("routes", &routes)
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounted namespaces, sorted
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self.namespaces.keys().map(String::as_str).collect();
        namespaces.sort_unstable();
        namespaces
    }

    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let head = request.method == Method::Head;
        let response = self.dispatch_inner(request).await;
        if head {
            response.into_head()
        } else {
            response
        }
    }

    async fn dispatch_inner(&self, request: HttpRequest) -> HttpResponse {
        if let Some((namespace, rest)) = split_namespace(&request.path) {
            if let Some(routes) = self.namespaces.get(namespace) {
                return match rest {
                    Some(rest) => {
                        let rest = rest.to_string();
                        routes.dispatch(request.with_path(rest)).await
                    }
                    None => {
                        let mut location = format!("{}{}/", PLUGINS_PREFIX, namespace);
                        if let Some(query) = &request.query {
                            location.push('?');
                            location.push_str(query);
                        }
                        HttpResponse::permanent_redirect(location)
                    }
                };
            }
        }

        let matching: Vec<&HostRoute> = self
            .routes
            .iter()
            .filter(|r| r.path == request.path)
            .collect();

        let fallback = (request.method == Method::Head).then_some(Method::Get);
        let chosen = matching
            .iter()
            .find(|r| r.method == request.method)
            .or_else(|| matching.iter().find(|r| Some(r.method) == fallback));

        match chosen {
            Some(route) => route.handler.handle(request).await,
            None if matching.is_empty() => HttpResponse::not_found(),
            None => {
                let mut allowed: Vec<&str> = matching.iter().map(|r| r.method.as_str()).collect();
                allowed.dedup();
                HttpResponse::method_not_allowed(&allowed.join(", "))
            }
        }
    }
}

impl HostBoundary for RoutingTable {
    fn route(&mut self, method: Method, path: &str, handler: Arc<dyn RequestHandler>) {
        self.routes.push(HostRoute {
            method,
            path: path.to_string(),
            handler,
        });
    }

    fn mount(&mut self, routes: PluginRoutes) -> Result<(), MountError> {
        let namespace = routes.namespace().to_string();
        if self.namespaces.contains_key(&namespace) {
            return Err(MountError::AlreadyMounted(namespace));
        }
        self.namespaces.insert(namespace, routes);
        Ok(())
    }

    fn is_mounted(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }
}

/// `/plugins/a/x` → `("a", Some("/x"))`, `/plugins/a` → `("a", None)`
fn split_namespace(path: &str) -> Option<(&str, Option<&str>)> {
    let rest = path.strip_prefix(PLUGINS_PREFIX)?;
    let split = match rest.find('/') {
        Some(i) => (&rest[..i], Some(&rest[i..])),
        None => (rest, None),
    };
    (!split.0.is_empty()).then_some(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl RequestHandler for Fixed {
        async fn handle(&self, request: HttpRequest) -> HttpResponse {
            HttpResponse::text(200, format!("{} {}", self.0, request.path))
        }
    }

    fn table() -> RoutingTable {
        let mut table = RoutingTable::new();
        table.route(Method::Get, "/", Arc::new(Fixed("landing")));

        let mut routes = PluginRoutes::new("a");
        routes.mount("/", Arc::new(Fixed("a"))).unwrap();
        table.mount(routes).unwrap();
        table
    }

    #[test]
    fn test_split_namespace() {
        assert_eq!(split_namespace("/plugins/a/x/y"), Some(("a", Some("/x/y"))));
        assert_eq!(split_namespace("/plugins/a/"), Some(("a", Some("/"))));
        assert_eq!(split_namespace("/plugins/a"), Some(("a", None)));
        assert_eq!(split_namespace("/plugins/"), None);
        assert_eq!(split_namespace("/other"), None);
    }

    #[tokio::test]
    async fn test_namespace_dispatch() {
        let response = table().dispatch(HttpRequest::get("/plugins/a/page")).await;
        assert_eq!(response.body_text(), "a /page");
    }

    #[tokio::test]
    async fn test_missing_trailing_slash_redirects() {
        let response = table().dispatch(HttpRequest::get("/plugins/a?x=1")).await;
        assert_eq!(response.status, 308);
        assert_eq!(response.header("location"), Some("/plugins/a/?x=1"));
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_not_found() {
        let response = table().dispatch(HttpRequest::get("/plugins/zzz/")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_head_on_host_route() {
        let response = table().dispatch(HttpRequest::head("/")).await;
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        assert_eq!(response.header("content-length"), Some("9"));
    }

    #[tokio::test]
    async fn test_host_route_wrong_method() {
        let response = table().dispatch(HttpRequest::new(Method::Post, "/")).await;
        assert_eq!(response.status, 405);
    }

    #[test]
    fn test_duplicate_mount_rejected() {
        let mut table = table();
        let err = table.mount(PluginRoutes::new("a")).unwrap_err();
        assert!(matches!(err, MountError::AlreadyMounted(ns) if ns == "a"));
        assert!(table.is_mounted("a"));
        assert!(!table.is_mounted("b"));
    }
}
