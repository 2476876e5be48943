//! Socket transport with bounded-retry connect and automatic reconnect.

mod error;
mod manager;
mod socket;

pub use self::error::{SocketError, TransportError};
pub use self::manager::{ReconnectOptions, TransportEvent, TransportEventKind, TransportManager};
pub use self::socket::{SocketCommand, SocketEvent, SocketFactory, SocketIo};
