//! Session error types for the WebSocket-to-process proxy
//!
//! This module provides detailed error types for session management,
//! making it easier to diagnose and handle different failure scenarios.

use std::fmt;

/// Which side of a session an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// The inbound WebSocket connection
    Socket,
    /// The spawned backend process
    Process,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket => write!(f, "socket"),
            Self::Process => write!(f, "process"),
        }
    }
}

/// Errors that can occur while routing and bridging a session
#[derive(Debug)]
#[non_exhaustive]
pub enum SessionError {
    /// Requested route key is not present in the route table
    RouteNotFound { key: String },

    /// Backend process could not be started
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    /// One leg of the session closed (normal or abnormal termination)
    ConnectionClosed { leg: Leg },

    /// Transport-level fault on one leg (malformed frame, reset,
    /// over-long backend line)
    Transport { leg: Leg, detail: String },

    /// I/O error during communication
    IoError(std::io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RouteNotFound { key } => {
                write!(f, "No route configured for '{}'", key)
            }
            Self::SpawnFailed { command, source } => {
                write!(f, "Failed to spawn backend '{}': {}", command, source)
            }
            Self::ConnectionClosed { leg } => {
                write!(f, "Session {} leg closed", leg)
            }
            Self::Transport { leg, detail } => {
                write!(f, "Transport error on {} leg: {}", leg, detail)
            }
            Self::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SpawnFailed { source, .. } => Some(source),
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl SessionError {
    /// Check if this is the expected end-of-session signal rather than a
    /// fault worth surfacing
    #[must_use]
    pub fn is_normal_close(&self) -> bool {
        match self {
            Self::ConnectionClosed { .. } => true,
            Self::IoError(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }

    /// Check if this error means the backend executable is missing or
    /// unusable (a permanent condition for that route key)
    #[must_use]
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::SpawnFailed { .. })
    }

    /// Get the appropriate log level for this error
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            // Disconnects are the normal end of a session
            Self::ConnectionClosed { .. } => tracing::Level::DEBUG,
            Self::IoError(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::Level::DEBUG
            }
            // A missing or broken backend command needs attention
            Self::SpawnFailed { .. } => tracing::Level::ERROR,
            // Unknown routes and transport faults are warnings
            Self::RouteNotFound { .. } | Self::Transport { .. } | Self::IoError(_) => {
                tracing::Level::WARN
            }
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}
