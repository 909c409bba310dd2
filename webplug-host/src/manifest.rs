//! Artifact manifest (`plugin.toml`)
//!
//! Every artifact declares which modules implement which capability:
//!
//! ```toml
//! [provides]
//! "webplug.routes/1" = ["alpha.wasm"]
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// File name of the manifest inside an artifact directory
pub const MANIFEST_FILE: &str = "plugin.toml";

/// Errors reading an artifact manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    Missing(PathBuf),

    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Module path '{0}' must be relative and stay inside the artifact")]
    ModuleOutsideArtifact(String),
}

/// Parsed `plugin.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactManifest {
    /// Capability id to implementing module paths
    #[serde(default)]
    pub provides: BTreeMap<String, Vec<String>>,
}

impl ArtifactManifest {
    /// Read the manifest of an artifact directory
    pub fn load(artifact_dir: &Path) -> Result<Self, ManifestError> {
        let path = artifact_dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(ManifestError::Missing(path));
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;

        toml::from_str(&text).map_err(|source| ManifestError::Parse { path, source })
    }

    /// Modules declared for a capability, in declaration order
    pub fn providers_of(&self, capability: &str) -> &[String] {
        self.provides
            .get(capability)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Capabilities declared but not understood by this host
    pub fn other_capabilities<'a>(&'a self, capability: &'a str) -> impl Iterator<Item = &'a str> {
        self.provides
            .keys()
            .map(String::as_str)
            .filter(move |c| *c != capability)
    }
}

/// Resolve a manifest-relative path against the artifact directory.
///
/// Only plain relative components are accepted, so the result can never
/// point outside `artifact_dir`.
pub fn resolve_within(artifact_dir: &Path, relative: &str) -> Result<PathBuf, ManifestError> {
    let candidate = Path::new(relative);
    if relative.is_empty() {
        return Err(ManifestError::ModuleOutsideArtifact(relative.to_string()));
    }

    let mut resolved = artifact_dir.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ManifestError::ModuleOutsideArtifact(relative.to_string()));
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_manifest() {
        let temp = TempDir::new().unwrap();
        let text = r#"
[provides]
"webplug.routes/1" = ["a.wasm", "b.wasm"]
"other/1" = ["c.wasm"]
"#;
        fs::write(temp.path().join(MANIFEST_FILE), text).unwrap();

        let manifest = ArtifactManifest::load(temp.path()).unwrap();
        let routes = manifest.providers_of("webplug.routes/1");
        assert_eq!(routes, ["a.wasm", "b.wasm"]);
        assert!(manifest.providers_of("missing").is_empty());
        assert_eq!(
            manifest.other_capabilities("webplug.routes/1").collect::<Vec<_>>(),
            vec!["other/1"]
        );
    }

    #[test]
    fn test_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let err = ArtifactManifest::load(temp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Missing(_)));
    }

    #[test]
    fn test_malformed_manifest() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "[provides\n").unwrap();
        let err = ArtifactManifest::load(temp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn test_resolve_within() {
        let root = Path::new("/srv/plugins/alpha");
        assert_eq!(
            resolve_within(root, "./lib/alpha.wasm").unwrap(),
            root.join("lib").join("alpha.wasm")
        );
        assert!(resolve_within(root, "../beta/beta.wasm").is_err());
        assert!(resolve_within(root, "/etc/passwd").is_err());
        assert!(resolve_within(root, "").is_err());
    }
}
