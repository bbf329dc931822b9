//! Configuration module
//!
//! This module handles configuration types and loading for the proxy
//! server. The core consumes only the resolved route table; everything
//! here runs before the first connection is accepted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{DEFAULT_HOST, DEFAULT_PORT};
use crate::routes::RouteTable;

/// Default listen host
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

/// Default listen port
fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Main proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Host to bind the listener to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Mapping from route key to backend command list.
    ///
    /// The first element of each list is the executable, the rest are its
    /// arguments. Every list must be non-empty.
    #[serde(default)]
    pub routes: HashMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            routes: HashMap::new(),
        }
    }
}

impl Config {
    /// Build the immutable route table from this configuration
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending route key when any spawn
    /// specification is empty or has an empty command.
    pub fn route_table(&self) -> Result<RouteTable> {
        RouteTable::from_config(&self.routes).context("Invalid route configuration")
    }
}

/// Load configuration from a TOML file
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or
/// contains an invalid route specification.
pub fn load_config(path: &str) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path))?;

    // Surface route errors at load time rather than at first connection
    config.route_table()?;

    Ok(config)
}

/// Create a default configuration with an example echo route
#[must_use]
pub fn create_default_config() -> Config {
    let mut routes = HashMap::new();
    routes.insert("echo".to_string(), vec!["cat".to_string()]);
    Config {
        host: default_host(),
        port: default_port(),
        routes,
    }
}
