//! Command-line argument parsing for the proxy binary

use clap::Parser;

use crate::config::Config;
use crate::constants::{DEFAULT_HOST, DEFAULT_PORT};

/// Command-line arguments
///
/// CLI values override the configuration file; the configuration file
/// overrides the built-in defaults.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env)]
    pub port: Option<u16>,

    /// Host to bind to (overrides config file)
    #[arg(long, env)]
    pub host: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", env)]
    pub config: String,
}

impl Args {
    /// Get formatted listen address, applying CLI-over-config precedence
    #[must_use]
    pub fn listen_addr(&self, config: &Config) -> String {
        format!("{}:{}", self.effective_host(config), self.effective_port(config))
    }

    /// Get effective port (from args, then config, then default)
    #[must_use]
    pub fn effective_port(&self, config: &Config) -> u16 {
        self.port.unwrap_or(config.port)
    }

    /// Get effective host (from args, then config, then default)
    #[must_use]
    pub fn effective_host<'a>(&'a self, config: &'a Config) -> &'a str {
        self.host.as_deref().unwrap_or(&config.host)
    }
}
