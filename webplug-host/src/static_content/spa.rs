//! Bundled single-page applications

use super::compressed::AcceptEncoding;
use super::config::{StaticContentConfig, StaticContentError};
use super::resolver::{Resolution, StaticAssetRequest, StaticResourceResolver};
use crate::routing::{HttpRequest, HttpResponse, RequestHandler};
use async_trait::async_trait;
use std::path::Path;
use webplug_api::{Method, SpaSpec};

/// Serves a plugin's bundle directory; unknown paths get the default page
/// so client-side routes work on reload.
#[derive(Debug, Clone)]
pub struct SinglePageApplication {
    resolver: StaticResourceResolver,
}

impl SinglePageApplication {
    /// Build from a guest-declared spec; `files_path` is relative to the artifact
    pub fn from_spec(artifact_dir: &Path, spec: &SpaSpec) -> Result<Self, StaticContentError> {
        let files_path = spec.files_path.trim_matches('/');
        let root = if files_path.is_empty() || files_path == "." {
            artifact_dir.to_path_buf()
        } else {
            crate::manifest::resolve_within(artifact_dir, files_path)
                .map_err(|_| StaticContentError::OutsideParent(spec.files_path.clone()))?
        };

        let mut config = StaticContentConfig::new(&root)?
            .index(Some(&spec.default_page))?
            .default_path(Some(&spec.default_page))?
            .extensions(spec.extensions.iter().cloned())
            .pre_compressed(spec.pre_compressed.iter().map(|&kind| kind.into()))
            .auto_head(spec.auto_head);

        // The bundle itself may be a symlink; it still has to live in the artifact
        let artifact_root = artifact_dir
            .canonicalize()
            .map_err(|source| StaticContentError::RootResolution {
                path: artifact_dir.to_path_buf(),
                source,
            })?;
        if !config.bundle_root().starts_with(&artifact_root) {
            return Err(StaticContentError::OutsideParent(spec.files_path.clone()));
        }

        if !spec.ignored.is_empty() {
            let rules = spec.ignored.clone();
            config = config.exclude(move |path| rules.iter().any(|rule| rule.matches(path)));
        }
        if let Some(seconds) = spec.max_age {
            config = config.cache_control(move |_| vec![format!("max-age={}", seconds)]);
        }

        Ok(Self::new(config))
    }

    pub fn new(config: StaticContentConfig) -> Self {
        Self {
            resolver: StaticResourceResolver::new(config),
        }
    }
}

#[async_trait]
impl RequestHandler for SinglePageApplication {
    async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let auto_head = self.resolver.config().auto_head_enabled();
        let head = match request.method {
            Method::Get => false,
            Method::Head if auto_head => true,
            _ if auto_head => return HttpResponse::method_not_allowed("GET, HEAD"),
            _ => return HttpResponse::method_not_allowed("GET"),
        };

        let accept = request
            .header("accept-encoding")
            .map(AcceptEncoding::parse)
            .unwrap_or_default();
        let asset_request = StaticAssetRequest::from_path(&request.path, accept);

        let asset = match self.resolver.resolve(&asset_request) {
            Resolution::Found(asset) => asset,
            Resolution::Forbidden => return HttpResponse::forbidden(),
            Resolution::NotFound => return HttpResponse::not_found(),
        };

        let mut response = HttpResponse::new(200);
        response.headers = asset.headers();

        if head {
            return match tokio::fs::metadata(&asset.path).await {
                Ok(meta) => response.with_header("content-length", meta.len().to_string()),
                Err(e) => {
                    tracing::warn!(
                        path = %asset.path.display(),
                        error = %e,
                        "Failed to stat asset"
                    );
                    HttpResponse::internal_error()
                }
            };
        }

        match tokio::fs::read(&asset.path).await {
            Ok(body) => {
                let len = body.len().to_string();
                response.with_header("content-length", len).with_body(body)
            }
            Err(e) => {
                tracing::warn!(
                    path = %asset.path.display(),
                    error = %e,
                    "Failed to read asset"
                );
                HttpResponse::internal_error()
            }
        }
    }
}
