//! Proxy implementation
//!
//! This module contains the main `WsStdioProxy` struct which accepts
//! upgraded WebSocket connections, resolves the route key from the
//! request path, and either bridges the connection to a freshly spawned
//! backend process or rejects it.

use anyhow::Result;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};

use crate::process::ProcessHandle;
use crate::routes::{RouteKey, RouteTable};
use crate::session::Session;
use crate::socket::SocketHandle;
use crate::types::SessionId;

/// Bookkeeping entry for one active session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Route key the session was created for
    pub route_key: String,
    /// Remote address of the inbound connection
    pub peer_addr: SocketAddr,
}

/// The connection router
///
/// Owns the immutable route table and a registry of active sessions.
/// Each accepted connection is handled in its own task; faults are
/// terminal to their session only and never reach the accept loop.
#[derive(Debug, Clone)]
pub struct WsStdioProxy {
    routes: Arc<RouteTable>,
    sessions: Arc<DashMap<SessionId, SessionInfo>>,
}

impl WsStdioProxy {
    /// Create a proxy over a resolved route table
    ///
    /// # Errors
    ///
    /// Returns an error if the table has no routes; a proxy that can
    /// only reject is a configuration mistake.
    pub fn new(routes: RouteTable) -> Result<Self> {
        if routes.is_empty() {
            anyhow::bail!("No routes configured in configuration");
        }
        Ok(Self {
            routes: Arc::new(routes),
            sessions: Arc::new(DashMap::new()),
        })
    }

    /// The route table this proxy serves
    #[must_use]
    #[inline]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Number of sessions currently bridged
    #[must_use]
    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of the active session registry
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    /// Log remaining sessions on shutdown
    ///
    /// Sessions are not drained: backends die with the server process
    /// and clients observe an ordinary disconnect.
    pub fn graceful_shutdown(&self) {
        let remaining = self.sessions.len();
        if remaining > 0 {
            info!("Shutting down with {} active sessions", remaining);
            for entry in self.sessions.iter() {
                debug!(
                    "  - {} on route '{}'",
                    entry.value().peer_addr,
                    entry.value().route_key
                );
            }
        }
    }

    /// Handle one inbound connection end-to-end
    ///
    /// Performs the WebSocket handshake, resolves the route key from the
    /// request path, and runs the session to completion. Rejections
    /// (unknown route, spawn failure) close the connection without ever
    /// creating a session or a registry entry.
    pub async fn handle_connection(
        &self,
        stream: TcpStream,
        client_addr: SocketAddr,
    ) -> Result<()> {
        debug!("New connection from {}", client_addr);

        // Capture the request target during the handshake; the route key
        // is the literal path minus the leading slash.
        let mut request_path = String::new();
        let ws = accept_hdr_async(stream, |req: &Request, resp: Response| {
            request_path = req.uri().path().to_string();
            Ok(resp)
        })
        .await?;

        let socket = SocketHandle::new(ws, client_addr);

        let key = match RouteKey::from_request_path(&request_path) {
            Ok(key) => key,
            Err(e) => {
                warn!(
                    "Rejecting client {}: invalid route path '{}' ({})",
                    client_addr, request_path, e
                );
                socket.close(CloseCode::Policy, "unknown route").await;
                return Ok(());
            }
        };

        let Some(entry) = self.routes.lookup(&key) else {
            warn!("Rejecting client {}: no route for '{}'", client_addr, key);
            socket.close(CloseCode::Policy, "unknown route").await;
            return Ok(());
        };

        let process = match ProcessHandle::spawn(entry) {
            Ok(process) => process,
            Err(e) => {
                warn!("Rejecting client {} on route '{}': {}", client_addr, key, e);
                socket.close(CloseCode::Error, "backend unavailable").await;
                return Ok(());
            }
        };

        let session_id = SessionId::new();
        let session = Session::new(session_id, key.clone(), socket, process);

        self.sessions.insert(
            session_id,
            SessionInfo {
                route_key: key.to_string(),
                peer_addr: client_addr,
            },
        );
        info!(
            "Client {} [{}] bridged to route '{}'",
            client_addr,
            session_id.short(),
            key
        );

        let result = session.run().await;
        self.sessions.remove(&session_id);

        match result {
            Ok(stats) => {
                info!(
                    "Session closed {} [{}] ↑{} ↓{} messages",
                    client_addr,
                    session_id.short(),
                    stats.client_to_backend,
                    stats.backend_to_client
                );
            }
            Err(e) => {
                if e.is_normal_close() {
                    debug!(
                        "Session ended {} [{}]: {}",
                        client_addr,
                        session_id.short(),
                        e
                    );
                } else {
                    warn!(
                        "Session error {} [{}]: {}",
                        client_addr,
                        session_id.short(),
                        e
                    );
                }
            }
        }

        Ok(())
    }
}
