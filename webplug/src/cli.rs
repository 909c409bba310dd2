//! Command-line interface

use crate::tracing_support::TracingFormat;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use webplug_host::HostConfig;

#[derive(Debug, Parser)]
#[command(name = "webplug", version, about = "Pluggable web host for wasm plugins")]
pub struct Cli {
    /// Config file (default: ./webplug.toml, then the user config dir)
    #[arg(long, global = true, env = "WEBPLUG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Plugins directory; overrides the config file
    #[arg(long, global = true, env = "WEBPLUG_PLUGINS_DIR")]
    pub plugins_dir: Option<PathBuf>,

    /// Fuel granted to each guest call; overrides the config file
    #[arg(long, global = true)]
    pub fuel_limit: Option<u64>,

    #[arg(long, global = true, value_enum, default_value = "compact")]
    pub log_format: TracingFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show mounted plugins, namespace conflicts and skipped artifacts
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dispatch one request through the composed routes and print the response
    Get {
        /// Request target, e.g. /plugins/a/
        target: String,

        /// Send HEAD instead of GET
        #[arg(long)]
        head: bool,

        /// Extra request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Print status and headers before the body
        #[arg(short, long)]
        include: bool,
    },

    /// Exit with an error if any artifact was skipped or any namespace conflicted
    Check,
}

impl Cli {
    /// Host config from flags, falling back to the config file lookup
    pub fn host_config(&self) -> Result<HostConfig> {
        let mut config = match (&self.plugins_dir, &self.config) {
            (Some(dir), None) => HostConfig::new(dir),
            (Some(dir), Some(path)) => {
                let mut config =
                    HostConfig::load(path).with_context(|| format!("loading {}", path.display()))?;
                config.plugins_dir = dir.clone();
                config
            }
            (None, explicit) => HostConfig::discover(explicit.as_deref())?,
        };

        if let Some(fuel) = self.fuel_limit {
            anyhow::ensure!(fuel > 0, "--fuel-limit must be greater than zero");
            config.fuel_limit = fuel;
        }
        Ok(config)
    }
}

/// Parse `Name: value`
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("invalid header '{}': expected 'Name: value'", raw))?;
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "invalid header '{}': empty name", raw);
    Ok((name.to_string(), value.trim().to_string()))
}
