//! Transport error types.

use thiserror::Error;

/// A failure reported by an injected socket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("socket error: {0}")]
pub struct SocketError(pub String);

impl SocketError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised by the [`TransportManager`](super::TransportManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// `connect` was called while a socket is open.
    #[error("already connected")]
    AlreadyConnected,

    /// `send` was called without an open socket.
    #[error("not connected, call connect first")]
    NotConnected,

    /// Every attempt to open a socket failed.
    #[error("timed out connecting to {url} after {attempts} attempts")]
    ConnectionTimeout {
        /// The URL that could not be reached.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// `close` was called while a connect or reconnect was in progress.
    #[error("transport closed while connecting")]
    Closed,

    /// The socket reported an error.
    #[error(transparent)]
    Socket(#[from] SocketError),
}
