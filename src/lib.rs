//! WebSocket-to-subprocess proxy
//!
//! Accepts inbound WebSocket connections, selects a backend command by
//! the request path, spawns one backend process per connection, and
//! relays newline-delimited messages between the socket and the
//! process's stdio until either side terminates the session.

pub mod args;
pub mod config;
pub mod constants;
pub mod logging;
pub mod process;
pub mod proxy;
pub mod routes;
pub mod session;
pub mod session_error;
pub mod socket;
pub mod types;

pub use config::{Config, create_default_config, load_config};
pub use proxy::{SessionInfo, WsStdioProxy};
pub use routes::{RouteEntry, RouteKey, RouteTable};
pub use session::{Session, SessionState};
pub use session_error::{Leg, SessionError};
pub use types::{RelayStats, SessionId};
