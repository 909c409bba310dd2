//! Plugin identity
//!
//! A [`PluginDescriptor`] is built once per loaded module from the plugin's
//! embedded `server.module.toml` and never changes afterwards.

use serde::Deserialize;
use thiserror::Error;

/// Errors in a plugin's embedded module config
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Module config is not valid TOML: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("Module config is not UTF-8")]
    Encoding,

    #[error("Module config is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Module config key '{0}' must not be empty")]
    EmptyKey(&'static str),

    #[error("Invalid hostname '{hostname}': {reason}")]
    InvalidHostname {
        hostname: String,
        reason: &'static str,
    },
}

/// Keys recognized in `server.module.toml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    pub name: String,
    pub hostname: String,
}

#[derive(Deserialize)]
struct RawModuleConfig {
    name: Option<String>,
    hostname: Option<String>,
}

impl ModuleConfig {
    /// Parse and validate module config text
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let raw: RawModuleConfig = toml::from_str(text).map_err(DescriptorError::Parse)?;

        let name = required("name", raw.name)?;
        let hostname = required("hostname", raw.hostname)?;
        validate_namespace(&hostname)?;

        Ok(Self { name, hostname })
    }

    /// Parse config bytes as returned by a guest
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DescriptorError> {
        let text = std::str::from_utf8(bytes).map_err(|_| DescriptorError::Encoding)?;
        Self::parse(text)
    }
}

fn required(key: &'static str, value: Option<String>) -> Result<String, DescriptorError> {
    let value = value.ok_or(DescriptorError::MissingKey(key))?;
    if value.trim().is_empty() {
        return Err(DescriptorError::EmptyKey(key));
    }
    Ok(value)
}

/// Check that a hostname can be mounted as a single path segment.
///
/// The value is used verbatim, so anything that would change the shape of
/// `/plugins/{hostname}/` is rejected.
pub fn validate_namespace(hostname: &str) -> Result<(), DescriptorError> {
    let invalid = |reason| DescriptorError::InvalidHostname {
        hostname: hostname.to_string(),
        reason,
    };

    if hostname == "." || hostname == ".." {
        return Err(invalid("relative path segments are not allowed"));
    }
    if hostname.contains(['/', '\\']) {
        return Err(invalid("must be a single path segment"));
    }
    let forbidden = |c: char| c.is_control() || c.is_whitespace() || matches!(c, '?' | '#' | '%');
    if hostname.chars().any(forbidden) {
        return Err(invalid("contains characters that are not allowed in a path segment"));
    }
    Ok(())
}

/// Immutable identity of one loaded plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    id: String,
    display_name: String,
    route_namespace: String,
    origin_location: String,
}

impl PluginDescriptor {
    pub fn new(
        id: impl Into<String>,
        config: ModuleConfig,
        origin_location: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: config.name,
            route_namespace: config.hostname,
            origin_location: origin_location.into(),
        }
    }

    /// `{artifact}/{module}` identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declared `name`
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Declared `hostname`, the mount segment under `/plugins/`
    pub fn route_namespace(&self) -> &str {
        &self.route_namespace
    }

    /// Where the module was loaded from; diagnostic only
    pub fn origin_location(&self) -> &str {
        &self.origin_location
    }

    /// Mount path of this plugin, with trailing slash
    pub fn mount_path(&self) -> String {
        format!("/plugins/{}/", self.route_namespace)
    }
}
