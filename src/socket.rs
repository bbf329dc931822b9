//! Socket handle wrapping one accepted WebSocket connection
//!
//! Normalizes the WebSocket into the message-oriented contract the session
//! relays over: ordered text messages in, ordered text messages out, a
//! close operation carrying a code and reason, and transport faults
//! surfaced as errors. Splits into writer and reader halves so the session
//! can wait on inbound frames while writing outbound frames independently.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::session_error::{Leg, SessionError};

/// Map a tungstenite error onto the session error taxonomy
fn map_ws_error(err: WsError) -> SessionError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            SessionError::ConnectionClosed { leg: Leg::Socket }
        }
        WsError::Io(e) => SessionError::IoError(e),
        other => SessionError::Transport {
            leg: Leg::Socket,
            detail: other.to_string(),
        },
    }
}

/// One accepted WebSocket connection, exclusively owned by its session
#[derive(Debug)]
pub struct SocketHandle {
    writer: SocketWriter,
    reader: SocketReader,
}

impl SocketHandle {
    /// Wrap an upgraded WebSocket stream
    #[must_use]
    pub fn new(ws: WebSocketStream<TcpStream>, peer_addr: SocketAddr) -> Self {
        let (sink, stream) = ws.split();
        Self {
            writer: SocketWriter { sink, peer_addr },
            reader: SocketReader { stream, peer_addr },
        }
    }

    /// Address of the remote peer
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.writer.peer_addr
    }

    /// Split into independent writer and reader halves
    #[must_use]
    pub fn split(self) -> (SocketWriter, SocketReader) {
        (self.writer, self.reader)
    }

    /// Close the connection without ever starting a session
    ///
    /// Used by the router to reject connections (unknown route, spawn
    /// failure) after the handshake has completed.
    pub async fn close(mut self, code: CloseCode, reason: &str) {
        self.writer.close(code, reason).await;
    }
}

/// Write half of a socket handle
#[derive(Debug)]
pub struct SocketWriter {
    sink: SplitSink<WebSocketStream<TcpStream>, Message>,
    peer_addr: SocketAddr,
}

impl SocketWriter {
    /// Send one text message to the client
    ///
    /// Fails with a `ConnectionClosed`-class error once the connection is
    /// closed; callers treat that as fatal to the session.
    pub async fn send(&mut self, text: String) -> Result<(), SessionError> {
        self.sink
            .send(Message::text(text))
            .await
            .map_err(map_ws_error)
    }

    /// Send a close frame and shut the connection down
    ///
    /// Safe to call on an already-closed connection; later `send` calls
    /// fail cleanly.
    pub async fn close(&mut self, code: CloseCode, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        if let Err(e) = self.sink.send(Message::Close(Some(frame))).await {
            debug!("Close frame not delivered to {}: {}", self.peer_addr, e);
        }
        let _ = self.sink.close().await;
    }
}

/// Read half of a socket handle
#[derive(Debug)]
pub struct SocketReader {
    stream: SplitStream<WebSocketStream<TcpStream>>,
    peer_addr: SocketAddr,
}

impl SocketReader {
    /// Receive the next inbound message, in arrival order
    ///
    /// Resolves to `None` when the peer has closed (close frame or EOF).
    /// Text frames yield their payload; binary frames are decoded as
    /// UTF-8 (the line-framed stdio backend cannot receive raw bytes) and
    /// a decode failure is a transport fault. Ping/pong frames are
    /// handled by the transport and skipped.
    pub async fn next_message(&mut self) -> Option<Result<String, SessionError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    return Some(match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => Ok(text),
                        Err(_) => Err(SessionError::Transport {
                            leg: Leg::Socket,
                            detail: "binary frame is not valid UTF-8".to_string(),
                        }),
                    });
                }
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(f) => debug!(
                            "Client {} sent close frame: {} {}",
                            self.peer_addr, f.code, f.reason
                        ),
                        None => debug!("Client {} sent close frame", self.peer_addr),
                    }
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(map_ws_error(e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_error::SessionError;

    #[test]
    fn test_closed_errors_map_to_connection_closed() {
        let err = map_ws_error(WsError::ConnectionClosed);
        assert!(matches!(
            err,
            SessionError::ConnectionClosed { leg: Leg::Socket }
        ));
        assert!(err.is_normal_close());

        let err = map_ws_error(WsError::AlreadyClosed);
        assert!(err.is_normal_close());
    }

    #[test]
    fn test_io_errors_pass_through() {
        let err = map_ws_error(WsError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(matches!(err, SessionError::IoError(_)));
        assert!(err.is_normal_close());
    }

    #[test]
    fn test_protocol_errors_are_transport_faults() {
        use tokio_tungstenite::tungstenite::error::ProtocolError;

        let err = map_ws_error(WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake,
        ));
        match err {
            SessionError::Transport { leg, .. } => assert_eq!(leg, Leg::Socket),
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
