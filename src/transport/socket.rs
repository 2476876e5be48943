//! The socket seam.
//!
//! A [`SocketFactory`] is injected into the transport and opens one socket
//! per call. The opened socket is a pair of channels: commands flow to the
//! socket, events flow back.

use std::fmt;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use super::error::SocketError;

/// Instructions for an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    /// Write one text frame.
    Send(String),
    /// Close the socket.
    Close,
}

/// Notifications from an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text frame arrived.
    Message(String),
    /// The socket reported a non-fatal error.
    Error(SocketError),
    /// The socket closed. Dropping the event sender means the same.
    Close,
}

/// An open socket, as handed back by a [`SocketFactory`].
pub struct SocketIo {
    /// Commands for the socket.
    pub commands: mpsc::UnboundedSender<SocketCommand>,
    /// Events from the socket.
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

impl SocketIo {
    /// Create a socket pair: the [`SocketIo`] for the transport and the
    /// far ends for whatever drives the real connection.
    pub fn pair() -> (
        SocketIo,
        mpsc::UnboundedReceiver<SocketCommand>,
        mpsc::UnboundedSender<SocketEvent>,
    ) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        (SocketIo { commands, events }, command_rx, event_tx)
    }
}

impl fmt::Debug for SocketIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketIo")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

/// Opens sockets to a URL.
///
/// The returned future resolves once the socket is open, or fails if it
/// could not be opened.
pub trait SocketFactory: Send + Sync + 'static {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<SocketIo, SocketError>>;
}
