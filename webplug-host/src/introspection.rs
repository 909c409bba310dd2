//! Failure-tolerant plugin metadata accessors
//!
//! A plugin that loaded but misbehaves when asked for its metadata stays
//! listed with a placeholder; these functions never return an error.

use crate::registry::LoadedPlugin;

/// Shown in place of metadata a plugin failed to produce
pub const PLACEHOLDER: &str = "<unavailable>";

/// Display name for listings: guest override, else declared `name`
pub fn display_name(plugin: &LoadedPlugin) -> String {
    match plugin.instance.display_name() {
        Ok(Some(name)) if !name.trim().is_empty() => name,
        Ok(_) => plugin.descriptor.display_name().to_string(),
        Err(e) => {
            tracing::warn!(
                plugin = %plugin.descriptor.id(),
                origin = %plugin.descriptor.origin_location(),
                error = %e,
                "Introspection failure: display name unavailable"
            );
            PLACEHOLDER.to_string()
        }
    }
}

/// Human-readable origin line
pub fn origin(plugin: &LoadedPlugin) -> String {
    let location = plugin.descriptor.origin_location();
    if location.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        format!("loaded from '{}'", location)
    }
}
