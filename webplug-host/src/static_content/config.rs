//! Static content configuration

use super::compressed::CompressedFileType;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Predicate over a bundle-relative, `/`-separated path
pub type ExcludePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Produces `Cache-Control` directives for a bundle-relative path
pub type CacheControlFn = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Errors building a static content configuration
#[derive(Debug, Error)]
pub enum StaticContentError {
    #[error("Bundle root does not exist or is not a directory: {0}")]
    RootNotFound(PathBuf),

    #[error("Failed to resolve bundle root {path}: {source}")]
    RootResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bundle path '{0}' must be relative and stay inside its parent")]
    OutsideParent(String),

    #[error("Invalid file name '{0}': must be a relative path without '..'")]
    InvalidFileName(String),
}

/// How one bundle root is served.
///
/// Built once at startup and shared read-only by every request.
#[derive(Clone)]
pub struct StaticContentConfig {
    pub(crate) bundle_root: PathBuf,
    pub(crate) index: Option<String>,
    pub(crate) extensions: Vec<String>,
    pub(crate) exclude: ExcludePredicate,
    pub(crate) default_path: Option<String>,
    pub(crate) pre_compressed: Vec<CompressedFileType>,
    pub(crate) cache_control: CacheControlFn,
    pub(crate) auto_head: bool,
}

impl std::fmt::Debug for StaticContentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticContentConfig")
            .field("bundle_root", &self.bundle_root)
            .field("index", &self.index)
            .field("extensions", &self.extensions)
            .field("default_path", &self.default_path)
            .field("pre_compressed", &self.pre_compressed)
            .field("auto_head", &self.auto_head)
            .finish_non_exhaustive()
    }
}

impl StaticContentConfig {
    /// Serve files below `bundle_root`, with `index.html` as directory index.
    ///
    /// The root is canonicalized here so containment checks can compare
    /// canonical paths.
    pub fn new(bundle_root: impl AsRef<Path>) -> Result<Self, StaticContentError> {
        let root = bundle_root.as_ref();
        if !root.is_dir() {
            return Err(StaticContentError::RootNotFound(root.to_path_buf()));
        }
        let bundle_root = root
            .canonicalize()
            .map_err(|source| StaticContentError::RootResolution {
                path: root.to_path_buf(),
                source,
            })?;

        Ok(Self {
            bundle_root,
            index: Some("index.html".to_string()),
            extensions: Vec::new(),
            exclude: Arc::new(|_| false),
            default_path: None,
            pre_compressed: Vec::new(),
            cache_control: Arc::new(|_| Vec::new()),
            auto_head: false,
        })
    }

    pub fn bundle_root(&self) -> &Path {
        &self.bundle_root
    }

    pub fn auto_head_enabled(&self) -> bool {
        self.auto_head
    }

    /// Directory index file; `None` disables index lookup
    pub fn index(mut self, index: Option<&str>) -> Result<Self, StaticContentError> {
        self.index = index.map(checked_file_name).transpose()?;
        Ok(self)
    }

    /// Extension fallbacks, tried in order when a path is not found
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Add an exclusion; matches answer 403. Repeated calls are OR-ed.
    pub fn exclude(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        let previous = self.exclude.clone();
        self.exclude = Arc::new(move |path| previous(path) || predicate(path));
        self
    }

    /// File served when nothing else matched
    pub fn default_path(mut self, path: Option<&str>) -> Result<Self, StaticContentError> {
        self.default_path = path.map(checked_file_name).transpose()?;
        Ok(self)
    }

    /// Precompressed variants in priority order
    pub fn pre_compressed(mut self, types: impl IntoIterator<Item = CompressedFileType>) -> Self {
        self.pre_compressed = types.into_iter().collect();
        self
    }

    pub fn cache_control(
        mut self,
        directives: impl Fn(&str) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.cache_control = Arc::new(directives);
        self
    }

    /// Answer HEAD requests for everything GET can serve
    pub fn auto_head(mut self, enabled: bool) -> Self {
        self.auto_head = enabled;
        self
    }
}

/// Accept a relative file path made only of plain segments
fn checked_file_name(name: &str) -> Result<String, StaticContentError> {
    let trimmed = name.trim_start_matches('/');
    let plain = |s: &str| !s.is_empty() && s != "." && s != ".." && !s.contains(['\\', '\0']);
    let valid = !trimmed.is_empty() && trimmed.split('/').all(plain);
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(StaticContentError::InvalidFileName(name.to_string()))
    }
}
