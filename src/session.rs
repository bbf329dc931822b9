//! Session management: one bridge between an inbound WebSocket and a
//! spawned backend process
//!
//! A session relays messages verbatim in both directions, in arrival
//! order per direction, until either leg closes or faults; it then tears
//! the other leg down exactly once and reports its relay counters.

use std::process::ExitStatus;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace};

use crate::process::{ProcessEvent, ProcessHandle};
use crate::routes::RouteKey;
use crate::session_error::SessionError;
use crate::socket::SocketHandle;
use crate::types::{RelayStats, SessionId};

/// Lifecycle of one bridged session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Route resolved, backend spawned, relay not yet started
    Connecting,
    /// Bidirectional forwarding is live
    Active,
    /// One leg ended; the other is being torn down
    Closing,
    /// Terminal; no further forwarding
    Closed,
}

/// What ended the relay loop
#[derive(Debug)]
enum CloseTrigger {
    /// The client closed the WebSocket (close frame or EOF)
    SocketClosed,
    /// The backend process exited
    ProcessExited(Option<ExitStatus>),
    /// Fault on the socket leg
    SocketFault(SessionError),
    /// Fault on the process leg
    ProcessFault(SessionError),
}

/// Pick the close frame sent to the client for a given trigger
fn close_frame_for(trigger: &CloseTrigger) -> (CloseCode, &'static str) {
    match trigger {
        CloseTrigger::SocketClosed => (CloseCode::Normal, "session closed"),
        CloseTrigger::ProcessExited(status) => {
            if status.is_none_or(|s| s.success()) {
                (CloseCode::Normal, "backend exited")
            } else {
                (CloseCode::Error, "backend exited abnormally")
            }
        }
        CloseTrigger::SocketFault(_) | CloseTrigger::ProcessFault(_) => {
            (CloseCode::Error, "session error")
        }
    }
}

/// One active bridge between a socket handle and a process handle
///
/// Exclusively owns both legs. Exactly one session exists per accepted,
/// successfully-routed connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    route_key: RouteKey,
    state: SessionState,
    socket: SocketHandle,
    process: ProcessHandle,
}

impl Session {
    /// Pair an accepted socket with a freshly spawned backend
    #[must_use]
    pub fn new(
        id: SessionId,
        route_key: RouteKey,
        socket: SocketHandle,
        process: ProcessHandle,
    ) -> Self {
        Self {
            id,
            route_key,
            state: SessionState::Connecting,
            socket,
            process,
        }
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Route key this session was created for
    #[must_use]
    pub fn route_key(&self) -> &RouteKey {
        &self.route_key
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Relay messages between the two legs until either side terminates,
    /// then tear down the other leg
    ///
    /// Returns the per-direction message counters on a normal close.
    /// Transport faults are returned as errors after teardown has
    /// completed; teardown runs on every exit path.
    pub async fn run(mut self) -> Result<RelayStats, SessionError> {
        let peer_addr = self.socket.peer_addr();
        self.state = SessionState::Active;
        debug!(
            "Session {} [{}] active: {} bridged to '{}'",
            self.id.short(),
            self.route_key,
            peer_addr,
            self.process.command()
        );

        let (mut ws_tx, mut ws_rx) = self.socket.split();
        let (mut proc_tx, mut proc_rx) = self.process.split();
        let mut stats = RelayStats::default();

        // First close or fault on either leg ends the loop; everything
        // after the break is the single teardown sequence.
        let trigger = loop {
            tokio::select! {
                inbound = ws_rx.next_message() => match inbound {
                    Some(Ok(text)) => {
                        trace!(
                            "Session {} client -> backend: {} bytes",
                            self.id.short(),
                            text.len()
                        );
                        if let Err(e) = proc_tx.send(&text).await {
                            break CloseTrigger::ProcessFault(e);
                        }
                        stats.client_to_backend += 1;
                    }
                    Some(Err(e)) => break CloseTrigger::SocketFault(e),
                    None => break CloseTrigger::SocketClosed,
                },
                event = proc_rx.next_event() => match event {
                    Ok(ProcessEvent::Message(line)) => {
                        trace!(
                            "Session {} backend -> client: {} bytes",
                            self.id.short(),
                            line.len()
                        );
                        if let Err(e) = ws_tx.send(line).await {
                            break CloseTrigger::SocketFault(e);
                        }
                        stats.backend_to_client += 1;
                    }
                    Ok(ProcessEvent::Exited(status)) => {
                        break CloseTrigger::ProcessExited(status);
                    }
                    Err(e) => break CloseTrigger::ProcessFault(e),
                },
            }
        };

        self.state = SessionState::Closing;
        debug!(
            "Session {} closing after {:?}",
            self.id.short(),
            trigger
        );

        // Dispose the process leg (single-shot; a no-op if it already
        // exited) and close the socket leg (clean failure if the client
        // is already gone).
        proc_tx.shutdown().await;
        proc_rx.dispose().await;
        let (code, reason) = close_frame_for(&trigger);
        ws_tx.close(code, reason).await;

        self.state = SessionState::Closed;

        match trigger {
            CloseTrigger::SocketClosed => Ok(stats),
            CloseTrigger::ProcessExited(status) => {
                debug!(
                    "Session {} backend exit status: {:?}",
                    self.id.short(),
                    status
                );
                Ok(stats)
            }
            CloseTrigger::SocketFault(e) | CloseTrigger::ProcessFault(e) => {
                if e.is_normal_close() {
                    Ok(stats)
                } else {
                    Err(e)
                }
            }
        }
    }
}
