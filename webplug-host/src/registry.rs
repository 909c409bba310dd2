//! Extension registry
//!
//! Scans the plugins directory once at startup. Every directory entry is one
//! artifact; each module the artifact's manifest declares for
//! [`ROUTES_CAPABILITY`] is instantiated in its own isolation context and
//! paired with the descriptor read from its embedded module config.
//!
//! A broken artifact never aborts the scan: its error is logged with the
//! artifact path, recorded in [`DiscoveryResult::failures`], and the next
//! entry is processed.

use crate::descriptor::{DescriptorError, ModuleConfig, PluginDescriptor};
use crate::loader::{ExtensionInstance, LoaderError, PluginLoader};
use crate::manifest::{resolve_within, ArtifactManifest, ManifestError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use webplug_api::ROUTES_CAPABILITY;

/// Errors that can occur during plugin discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Plugins directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory: {0}")]
    ReadDirectory(#[source] std::io::Error),

    #[error("Not a plugin artifact (expected a directory): {0}")]
    NotAnArtifact(PathBuf),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Artifact declares no provider for '{capability}'")]
    NoProvider { capability: &'static str },

    #[error("Failed to load module {module}: {source}")]
    LoadModule {
        module: PathBuf,
        #[source]
        source: LoaderError,
    },

    #[error("Invalid module config in {module}: {source}")]
    Configuration {
        module: PathBuf,
        #[source]
        source: DescriptorError,
    },
}

/// A successfully loaded plugin: descriptor plus its live instance
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub descriptor: PluginDescriptor,
    pub instance: Arc<ExtensionInstance>,

    /// Artifact directory; bundle paths are resolved against it
    pub artifact_dir: PathBuf,
}

/// Result of plugin discovery
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    /// Successfully loaded plugins, in discovery order
    pub plugins: Vec<LoadedPlugin>,

    /// Artifacts that were skipped (with errors)
    pub failures: Vec<(PathBuf, DiscoveryError)>,
}

impl DiscoveryResult {
    /// Returns true if every artifact loaded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of skipped artifacts
    pub fn skipped(&self) -> usize {
        self.failures.len()
    }
}

/// Scans a plugins directory and instantiates the plugins it finds
pub struct ExtensionRegistry {
    loader: PluginLoader,
}

impl ExtensionRegistry {
    /// Create a registry with a default loader
    pub fn new() -> Result<Self, LoaderError> {
        Ok(Self {
            loader: PluginLoader::new()?,
        })
    }

    /// Create with an existing loader
    pub fn with_loader(loader: PluginLoader) -> Self {
        Self { loader }
    }

    /// Scan `dir`, treating every entry as one plugin artifact.
    ///
    /// Only a missing or unreadable plugins directory is an error; per-artifact
    /// problems end up in [`DiscoveryResult::failures`].
    pub fn discover(&self, dir: impl AsRef<Path>) -> Result<DiscoveryResult, DiscoveryError> {
        let dir = dir.as_ref();

        if !dir.is_dir() {
            return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
        }

        let entries = std::fs::read_dir(dir).map_err(DiscoveryError::ReadDirectory)?;
        let mut result = DiscoveryResult::default();
        let mut artifacts = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                    result
                        .failures
                        .push((dir.to_path_buf(), DiscoveryError::ReadDirectory(e)));
                    continue;
                }
            };

            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            artifacts.push(entry.path());
        }

        // read_dir order is platform-dependent; first-wins needs a stable one
        artifacts.sort();

        for path in artifacts {
            match self.load_artifact(&path) {
                Ok(plugins) => {
                    for plugin in &plugins {
                        tracing::info!(
                            plugin = %plugin.descriptor.id(),
                            namespace = %plugin.descriptor.route_namespace(),
                            path = %path.display(),
                            "Plugin loaded"
                        );
                    }
                    result.plugins.extend(plugins);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Skipping plugin artifact");
                    result.failures.push((path, e));
                }
            }
        }

        tracing::info!(
            loaded = result.plugins.len(),
            skipped = result.skipped(),
            dir = %dir.display(),
            "Plugin discovery finished"
        );

        Ok(result)
    }

    /// Load every route provider declared by one artifact.
    ///
    /// All-or-nothing: if any declared module fails, the artifact is skipped.
    pub fn load_artifact(&self, artifact_dir: &Path) -> Result<Vec<LoadedPlugin>, DiscoveryError> {
        if !artifact_dir.is_dir() {
            return Err(DiscoveryError::NotAnArtifact(artifact_dir.to_path_buf()));
        }

        let manifest = ArtifactManifest::load(artifact_dir)?;
        for other in manifest.other_capabilities(ROUTES_CAPABILITY) {
            tracing::debug!(
                path = %artifact_dir.display(),
                capability = %other,
                "Ignoring unsupported capability"
            );
        }

        let modules = manifest.providers_of(ROUTES_CAPABILITY);
        if modules.is_empty() {
            return Err(DiscoveryError::NoProvider {
                capability: ROUTES_CAPABILITY,
            });
        }

        let artifact_name = artifact_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        modules
            .iter()
            .map(|module| {
                let module_path = resolve_within(artifact_dir, module)?;
                let plugin_id = format!("{}/{}", artifact_name, module);
                self.load_module(&plugin_id, artifact_dir, &module_path)
            })
            .collect()
    }

    fn load_module(
        &self,
        plugin_id: &str,
        artifact_dir: &Path,
        module_path: &Path,
    ) -> Result<LoadedPlugin, DiscoveryError> {
        let load_error = |source| DiscoveryError::LoadModule {
            module: module_path.to_path_buf(),
            source,
        };

        let instance = self
            .loader
            .load_file(plugin_id, module_path)
            .map_err(load_error)?;

        let config_error = |source| DiscoveryError::Configuration {
            module: module_path.to_path_buf(),
            source,
        };

        let config_bytes = instance.config_bytes().map_err(load_error)?;
        let config = ModuleConfig::from_bytes(&config_bytes).map_err(config_error)?;

        let descriptor = PluginDescriptor::new(plugin_id, config, instance.origin());

        Ok(LoadedPlugin {
            descriptor,
            instance: Arc::new(instance),
            artifact_dir: artifact_dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_empty_directory() {
        let temp = TempDir::new().unwrap();
        let registry = ExtensionRegistry::new().unwrap();

        let result = registry.discover(temp.path()).unwrap();
        assert!(result.plugins.is_empty());
        assert!(result.failures.is_empty());
        assert!(result.is_success());
    }

    #[test]
    fn test_scan_nonexistent_directory() {
        let registry = ExtensionRegistry::new().unwrap();
        let result = registry.discover("/nonexistent/path/to/plugins");

        match result {
            Err(DiscoveryError::DirectoryNotFound(_)) => {}
            _ => panic!("Expected DirectoryNotFound error"),
        }
    }

    #[test]
    fn test_artifact_without_manifest_is_skipped() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("broken")).unwrap();
        fs::write(temp.path().join("stray.wasm"), b"\0asm").unwrap();
        fs::create_dir(temp.path().join(".hidden")).unwrap();

        let registry = ExtensionRegistry::new().unwrap();
        let result = registry.discover(temp.path()).unwrap();

        assert!(result.plugins.is_empty());
        assert_eq!(result.skipped(), 2);
        assert!(result
            .failures
            .iter()
            .any(|(_, e)| matches!(e, DiscoveryError::Manifest(ManifestError::Missing(_)))));
        assert!(result
            .failures
            .iter()
            .any(|(_, e)| matches!(e, DiscoveryError::NotAnArtifact(_))));
    }

    #[test]
    fn test_manifest_without_route_provider() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("other");
        fs::create_dir(&artifact).unwrap();
        fs::write(
            artifact.join("plugin.toml"),
            "[provides]\n\"something.else/1\" = [\"x.wasm\"]\n",
        )
        .unwrap();

        let registry = ExtensionRegistry::new().unwrap();
        let err = registry.load_artifact(&artifact).unwrap_err();
        assert!(matches!(err, DiscoveryError::NoProvider { .. }));
    }

    #[test]
    fn test_module_outside_artifact_rejected() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("sneaky");
        fs::create_dir(&artifact).unwrap();
        fs::write(
            artifact.join("plugin.toml"),
            "[provides]\n\"webplug.routes/1\" = [\"../elsewhere.wasm\"]\n",
        )
        .unwrap();

        let registry = ExtensionRegistry::new().unwrap();
        let err = registry.load_artifact(&artifact).unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::Manifest(ManifestError::ModuleOutsideArtifact(_))
        ));
    }
}
