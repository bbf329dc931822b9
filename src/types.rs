//! Core types for session tracking and identification
//!
//! This module provides unique identifiers and counters used throughout
//! the proxy.

use uuid::Uuid;

/// Unique identifier for bridged sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new unique session ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Short form for log lines (first UUID segment)
    #[must_use]
    pub fn short(&self) -> String {
        let s = self.0.to_string();
        s.split('-').next().unwrap_or(&s).to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-session relay counters, returned when a session finishes
///
/// Counts whole messages, not bytes: the relay forwards discrete frames
/// and lines, so message counts are the meaningful unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Messages forwarded from the WebSocket client to the backend process
    pub client_to_backend: u64,
    /// Messages forwarded from the backend process to the WebSocket client
    pub backend_to_client: u64,
}

impl RelayStats {
    /// Total messages relayed in both directions
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.client_to_backend + self.backend_to_client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_session_id_uniqueness() {
        let ids: HashSet<SessionId> = (0..100).map(|_| SessionId::new()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_session_id_short_form() {
        let id = SessionId::new();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&short));
    }

    #[test]
    fn test_session_id_display_roundtrip() {
        let id = SessionId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }

    #[test]
    fn test_relay_stats_total() {
        let stats = RelayStats {
            client_to_backend: 3,
            backend_to_client: 7,
        };
        assert_eq!(stats.total(), 10);
    }

    #[test]
    fn test_relay_stats_default_is_zero() {
        let stats = RelayStats::default();
        assert_eq!(stats.client_to_backend, 0);
        assert_eq!(stats.backend_to_client, 0);
        assert_eq!(stats.total(), 0);
    }
}
