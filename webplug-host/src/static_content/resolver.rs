//! Static resource resolution
//!
//! Maps one request path onto a file inside a bundle root. Candidates are
//! evaluated in a fixed order and the first hit wins:
//!
//! ```text
//! request path ──► traversal guard ──► directory? ──yes──► path/index
//!                                          │
//!                                          no
//!                                          ▼
//!                                   exact file (exclude ⇒ 403)
//!                                          │ missing
//!                                          ▼
//!                              path.ext for each extension (exclude ⇒ 403)
//!                                          │ missing
//!                                          ▼
//!                                     default path ──► 404
//! ```

use super::compressed::{AcceptEncoding, CompressedFileType};
use super::config::StaticContentConfig;
use std::path::PathBuf;
use std::sync::Arc;

/// One static lookup, built per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAssetRequest {
    segments: Vec<String>,
    malformed: bool,
    accept_encoding: AcceptEncoding,
}

impl StaticAssetRequest {
    /// Request for already-decoded path segments
    pub fn new(segments: Vec<String>, accept_encoding: AcceptEncoding) -> Self {
        Self {
            segments,
            malformed: false,
            accept_encoding,
        }
    }

    /// Request for a raw, percent-encoded URL tail such as `/js/app.js`
    pub fn from_path(path: &str, accept_encoding: AcceptEncoding) -> Self {
        let mut malformed = false;
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match urlencoding::decode(s) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => {
                    malformed = true;
                    String::new()
                }
            })
            .collect();

        Self {
            segments,
            malformed,
            accept_encoding,
        }
    }

    /// Bundle-relative path, or `None` if the request leaves the root
    fn normalized(&self) -> Option<String> {
        if self.malformed {
            return None;
        }

        let mut parts: Vec<&str> = Vec::new();
        for segment in &self.segments {
            match segment.as_str() {
                "" | "." => {}
                ".." => {
                    parts.pop()?;
                }
                s if s.contains(['/', '\\', ':', '\0']) => return None,
                s => parts.push(s),
            }
        }
        Some(parts.join("/"))
    }
}

/// A file chosen to answer a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// File to send (possibly a precompressed variant)
    pub path: PathBuf,

    /// Bundle-relative path of the logical asset
    pub relative_path: String,

    /// Derived from the logical asset's extension
    pub content_type: String,

    /// Set when a precompressed variant was chosen
    pub encoding: Option<CompressedFileType>,

    pub cache_control: Vec<String>,
}

impl ResolvedAsset {
    /// Response headers describing this asset
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), self.content_type.clone())];
        if let Some(encoding) = self.encoding {
            headers.push((
                "content-encoding".to_string(),
                encoding.encoding().to_string(),
            ));
            headers.push(("vary".to_string(), "accept-encoding".to_string()));
        }
        if !self.cache_control.is_empty() {
            headers.push(("cache-control".to_string(), self.cache_control.join(", ")));
        }
        headers
    }
}

/// Outcome of a static lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedAsset),
    Forbidden,
    NotFound,
}

enum Candidate {
    Matched(ResolvedAsset),
    Excluded,
    Missing,
}

/// Resolves requests against one [`StaticContentConfig`].
///
/// Holds no mutable state; clones share the configuration.
#[derive(Debug, Clone)]
pub struct StaticResourceResolver {
    config: Arc<StaticContentConfig>,
}

impl StaticResourceResolver {
    pub fn new(config: StaticContentConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &StaticContentConfig {
        &self.config
    }

    pub fn resolve(&self, request: &StaticAssetRequest) -> Resolution {
        let Some(relative) = request.normalized() else {
            tracing::debug!(
                root = %self.config.bundle_root.display(),
                "Rejected static path escaping the bundle root"
            );
            return Resolution::NotFound;
        };

        let requested = self.config.bundle_root.join(&relative);
        if requested.is_dir() {
            if let Some(index) = &self.config.index {
                if let Some(asset) = self.serve(&join_relative(&relative, index), request) {
                    return Resolution::Found(asset);
                }
            }
        } else {
            match self.candidate(&relative, request) {
                Candidate::Matched(asset) => return Resolution::Found(asset),
                Candidate::Excluded => return Resolution::Forbidden,
                Candidate::Missing => {}
            }

            if !relative.is_empty() {
                for extension in &self.config.extensions {
                    let with_extension = format!("{}.{}", relative, extension);
                    match self.candidate(&with_extension, request) {
                        Candidate::Matched(asset) => return Resolution::Found(asset),
                        Candidate::Excluded => return Resolution::Forbidden,
                        Candidate::Missing => {}
                    }
                }
            }
        }

        if let Some(default_path) = &self.config.default_path {
            if let Some(asset) = self.serve(default_path, request) {
                return Resolution::Found(asset);
            }
        }

        Resolution::NotFound
    }

    fn candidate(&self, relative: &str, request: &StaticAssetRequest) -> Candidate {
        if self.contained_file(relative).is_none() {
            return Candidate::Missing;
        }
        if (self.config.exclude)(relative) {
            return Candidate::Excluded;
        }
        match self.serve(relative, request) {
            Some(asset) => Candidate::Matched(asset),
            None => Candidate::Missing,
        }
    }

    fn serve(&self, relative: &str, request: &StaticAssetRequest) -> Option<ResolvedAsset> {
        let file = self.contained_file(relative)?;

        let variant = self
            .config
            .pre_compressed
            .iter()
            .filter(|kind| request.accept_encoding.accepts(**kind))
            .find_map(|kind| {
                let sibling = format!("{}.{}", relative, kind.extension());
                self.contained_file(&sibling).map(|path| (path, *kind))
            });

        let (path, encoding) = match variant {
            Some((path, kind)) => (path, Some(kind)),
            None => (file, None),
        };

        Some(ResolvedAsset {
            path,
            relative_path: relative.to_string(),
            content_type: content_type_for(relative),
            encoding,
            cache_control: (self.config.cache_control)(relative),
        })
    }

    /// Canonical path of a regular file that really lives under the root.
    ///
    /// Canonicalizing catches symlinks pointing outside the bundle.
    fn contained_file(&self, relative: &str) -> Option<PathBuf> {
        let canonical = self.config.bundle_root.join(relative).canonicalize().ok()?;
        let inside = canonical.starts_with(&self.config.bundle_root) && canonical.is_file();
        inside.then_some(canonical)
    }
}

fn join_relative(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

fn content_type_for(relative: &str) -> String {
    let mime = mime_guess::from_path(relative).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT || mime.subtype() == mime_guess::mime::JAVASCRIPT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn bundle(files: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for file in files {
            let path = temp.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("contents of {}", file)).unwrap();
        }
        temp
    }

    fn request(path: &str) -> StaticAssetRequest {
        StaticAssetRequest::from_path(path, AcceptEncoding::identity())
    }

    fn found(resolution: Resolution) -> ResolvedAsset {
        match resolution {
            Resolution::Found(asset) => asset,
            other => panic!("Expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_match() {
        let temp = bundle(&["index.html", "js/app.js"]);
        let resolver = StaticResourceResolver::new(StaticContentConfig::new(temp.path()).unwrap());

        let asset = found(resolver.resolve(&request("/js/app.js")));
        assert_eq!(asset.relative_path, "js/app.js");
        assert!(asset.content_type.ends_with("javascript; charset=utf-8"));
        assert_eq!(asset.encoding, None);
    }

    #[test]
    fn test_traversal_never_escapes_root() {
        let outer = TempDir::new().unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();
        let root = outer.path().join("dist");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("index.html"), "index").unwrap();

        let config = StaticContentConfig::new(&root)
            .unwrap()
            .default_path(Some("index.html"))
            .unwrap();
        let resolver = StaticResourceResolver::new(config);

        for attack in [
            "../secret.txt",
            "../../etc/passwd",
            "/%2e%2e/secret.txt",
            "a/../../secret.txt",
            "..%2fsecret.txt",
            "..%5csecret.txt",
            "%ff%fe",
        ] {
            assert_eq!(
                resolver.resolve(&request(attack)),
                Resolution::NotFound,
                "{attack} must not resolve"
            );
        }

        let asset = found(resolver.resolve(&request("js/../index.html")));
        assert_eq!(asset.relative_path, "index.html");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_not_served() {
        let outer = TempDir::new().unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();
        let root = outer.path().join("dist");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.txt"), root.join("leak.txt")).unwrap();

        let resolver = StaticResourceResolver::new(StaticContentConfig::new(&root).unwrap());
        assert_eq!(resolver.resolve(&request("leak.txt")), Resolution::NotFound);
    }

    #[test]
    fn test_directory_index() {
        let temp = bundle(&["docs/index.html"]);
        let resolver = StaticResourceResolver::new(StaticContentConfig::new(temp.path()).unwrap());

        let asset = found(resolver.resolve(&request("/docs/")));
        assert_eq!(asset.relative_path, "docs/index.html");
        assert_eq!(asset.content_type, "text/html; charset=utf-8");
    }

    #[test]
    fn test_directory_without_index_or_default_is_not_found() {
        let temp = bundle(&["docs/page.html"]);
        let config = StaticContentConfig::new(temp.path())
            .unwrap()
            .index(None)
            .unwrap();
        let resolver = StaticResourceResolver::new(config);

        assert_eq!(resolver.resolve(&request("/docs")), Resolution::NotFound);
    }

    #[test]
    fn test_extension_fallback_order() {
        let temp = bundle(&["page.htm", "page.html"]);
        let config = StaticContentConfig::new(temp.path())
            .unwrap()
            .extensions(["html", "htm"]);
        let resolver = StaticResourceResolver::new(config);

        let asset = found(resolver.resolve(&request("/page")));
        assert_eq!(asset.relative_path, "page.html");
    }

    #[test]
    fn test_excluded_match_short_circuits() {
        let temp = bundle(&["secret", "secret.html", "index.html"]);
        let config = StaticContentConfig::new(temp.path())
            .unwrap()
            .extensions(["html"])
            .exclude(|p| p == "secret")
            .default_path(Some("index.html"))
            .unwrap();
        let resolver = StaticResourceResolver::new(config);

        assert_eq!(resolver.resolve(&request("/secret")), Resolution::Forbidden);
    }

    #[test]
    fn test_excluded_fallback_candidate_is_forbidden() {
        let temp = bundle(&["notes.map", "index.html"]);
        let config = StaticContentConfig::new(temp.path())
            .unwrap()
            .extensions(["map"])
            .exclude(|p| p.ends_with(".map"))
            .default_path(Some("index.html"))
            .unwrap();
        let resolver = StaticResourceResolver::new(config);

        assert_eq!(resolver.resolve(&request("/notes")), Resolution::Forbidden);
    }

    #[test]
    fn test_default_path_for_client_routes() {
        let temp = bundle(&["index.html"]);
        let config = StaticContentConfig::new(temp.path())
            .unwrap()
            .default_path(Some("index.html"))
            .unwrap();
        let resolver = StaticResourceResolver::new(config);

        let asset = found(resolver.resolve(&request("/users/42/profile")));
        assert_eq!(asset.relative_path, "index.html");
    }

    #[test]
    fn test_no_default_is_not_found() {
        let temp = bundle(&["index.html"]);
        let resolver = StaticResourceResolver::new(StaticContentConfig::new(temp.path()).unwrap());
        let missing = request("/missing.js");
        assert_eq!(resolver.resolve(&missing), Resolution::NotFound);
    }

    #[test]
    fn test_precompressed_priority() {
        let temp = bundle(&["app.js", "app.js.br", "app.js.gz"]);
        let config = StaticContentConfig::new(temp.path())
            .unwrap()
            .pre_compressed([CompressedFileType::Brotli, CompressedFileType::Gzip]);
        let resolver = StaticResourceResolver::new(config);

        let both = StaticAssetRequest::from_path("/app.js", AcceptEncoding::parse("gzip, br"));
        let asset = found(resolver.resolve(&both));
        assert_eq!(asset.encoding, Some(CompressedFileType::Brotli));
        assert!(asset.path.ends_with("app.js.br"));
        assert!(asset.content_type.ends_with("javascript; charset=utf-8"));
        assert!(asset
            .headers()
            .contains(&("content-encoding".to_string(), "br".to_string())));

        let gzip_only = StaticAssetRequest::from_path("/app.js", AcceptEncoding::parse("gzip"));
        let asset = found(resolver.resolve(&gzip_only));
        assert_eq!(asset.encoding, Some(CompressedFileType::Gzip));

        let asset = found(resolver.resolve(&request("/app.js")));
        assert_eq!(asset.encoding, None);
        assert!(asset.path.ends_with(Path::new("app.js")));
    }

    #[test]
    fn test_cache_control_directives() {
        let temp = bundle(&["app.css"]);
        let config = StaticContentConfig::new(temp.path())
            .unwrap()
            .cache_control(|_| vec!["max-age=60".to_string(), "public".to_string()]);
        let resolver = StaticResourceResolver::new(config);

        let asset = found(resolver.resolve(&request("app.css")));
        let expected = (
            "cache-control".to_string(),
            "max-age=60, public".to_string(),
        );
        assert!(asset.headers().contains(&expected));
    }

    #[test]
    fn test_concurrent_resolution_is_identical() {
        let temp = bundle(&["app.js", "app.js.br", "index.html"]);
        let config = StaticContentConfig::new(temp.path())
            .unwrap()
            .pre_compressed([CompressedFileType::Brotli])
            .default_path(Some("index.html"))
            .unwrap();
        let resolver = StaticResourceResolver::new(config);
        let req = StaticAssetRequest::from_path("/app.js", AcceptEncoding::parse("br"));
        let expected = resolver.resolve(&req);

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| resolver.resolve(&req)))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
