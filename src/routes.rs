//! Route table mapping request paths to backend spawn specifications
//!
//! The table is built once at startup from the loaded configuration and is
//! never mutated afterwards, so concurrent lookups from sessions need no
//! locking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Validation errors for route construction
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("route key cannot be empty or whitespace")]
    EmptyKey,

    #[error("route '{0}' has an empty spawn specification")]
    EmptySpec(String),

    #[error("route '{0}' has an empty command")]
    EmptyCommand(String),
}

/// A validated route key: the request path with the leading `/` removed
///
/// Keys are compared literally; no decoding, normalization, or case
/// folding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    /// Create a new route key after validation
    pub fn new(key: String) -> Result<Self, RouteError> {
        if key.trim().is_empty() {
            return Err(RouteError::EmptyKey);
        }
        Ok(Self(key))
    }

    /// Derive a route key from a request path, stripping the leading `/`
    ///
    /// The remainder of the path is taken literally, embedded separators
    /// included.
    pub fn from_request_path(path: &str) -> Result<Self, RouteError> {
        Self::new(path.strip_prefix('/').unwrap_or(path).to_string())
    }

    /// Get the key as a string slice
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RouteKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RouteKey {
    type Error = RouteError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl<'de> Deserialize<'de> for RouteKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Spawn specification for one route: a command and its arguments
///
/// Immutable once constructed. The command is guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    command: String,
    args: Vec<String>,
}

impl RouteEntry {
    /// Build an entry from a command list as it appears in configuration:
    /// the first element is the command, the rest are its arguments
    pub fn from_spec(key: &str, spec: &[String]) -> Result<Self, RouteError> {
        let (command, args) = spec
            .split_first()
            .ok_or_else(|| RouteError::EmptySpec(key.to_string()))?;
        if command.trim().is_empty() {
            return Err(RouteError::EmptyCommand(key.to_string()));
        }
        Ok(Self {
            command: command.clone(),
            args: args.to_vec(),
        })
    }

    /// The backend executable
    #[must_use]
    #[inline]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments passed to the backend executable
    #[must_use]
    #[inline]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Immutable mapping from route key to spawn specification
///
/// Owned by the proxy and shared read-only across all sessions.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<RouteKey, RouteEntry>,
}

impl RouteTable {
    /// Build a route table from the raw configuration mapping
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key when any spec is empty,
    /// has an empty command, or has an invalid key.
    pub fn from_config(raw: &HashMap<String, Vec<String>>) -> Result<Self, RouteError> {
        let mut routes = HashMap::with_capacity(raw.len());
        for (key, spec) in raw {
            let entry = RouteEntry::from_spec(key, spec)?;
            routes.insert(RouteKey::new(key.clone())?, entry);
        }
        Ok(Self { routes })
    }

    /// Look up the spawn specification for a route key
    #[must_use]
    pub fn lookup(&self, key: &RouteKey) -> Option<&RouteEntry> {
        self.routes.get(key)
    }

    /// Number of configured routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate over configured routes, for startup logging
    pub fn iter(&self) -> impl Iterator<Item = (&RouteKey, &RouteEntry)> {
        self.routes.iter()
    }
}
