//! Events published by the client.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::emitter::Event;
use crate::error::ParseError;
use crate::message::ParsedMessage;

use super::error::ClientError;

/// A frame as it went over the wire, with the time it was sent or received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message: String,
    pub date: DateTime<Utc>,
}

impl RawMessage {
    pub(crate) fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            date: Utc::now(),
        }
    }
}

/// Everything a [`Client`](super::Client) publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A serialized message was sent.
    RawSend(RawMessage),
    /// A frame was received, before parsing.
    RawReceive(RawMessage),
    /// A message was received and parsed.
    Receive(ParsedMessage),
    /// A received line could not be parsed.
    ParsingError { error: ParseError, input: String },
    /// A latency probe was answered.
    Pong { delay: Duration },
    /// The handshake completed; the client is ready.
    Open,
    /// The connection closed and will not come back by itself.
    Close,
    /// The connection is being re-established.
    Reconnect,
    /// A background failure: socket errors, failed reconnects, failed
    /// keep-alive probes, failed re-handshakes.
    Error(ClientError),
}

/// Keys of [`ClientEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    RawSend,
    RawReceive,
    Receive,
    ParsingError,
    Pong,
    Open,
    Close,
    Reconnect,
    Error,
}

impl ClientEventKind {
    /// The conventional event name, e.g. `raw-send`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawSend => "raw-send",
            Self::RawReceive => "raw-receive",
            Self::Receive => "receive",
            Self::ParsingError => "parsing-error",
            Self::Pong => "pong",
            Self::Open => "open",
            Self::Close => "close",
            Self::Reconnect => "reconnect",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ClientEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event for ClientEvent {
    type Kind = ClientEventKind;

    fn kind(&self) -> ClientEventKind {
        match self {
            ClientEvent::RawSend(_) => ClientEventKind::RawSend,
            ClientEvent::RawReceive(_) => ClientEventKind::RawReceive,
            ClientEvent::Receive(_) => ClientEventKind::Receive,
            ClientEvent::ParsingError { .. } => ClientEventKind::ParsingError,
            ClientEvent::Pong { .. } => ClientEventKind::Pong,
            ClientEvent::Open => ClientEventKind::Open,
            ClientEvent::Close => ClientEventKind::Close,
            ClientEvent::Reconnect => ClientEventKind::Reconnect,
            ClientEvent::Error(_) => ClientEventKind::Error,
        }
    }
}

/// The per-command bus: parsed messages keyed by lower-cased command,
/// e.g. `privmsg`, `join` or `001`.
impl Event for ParsedMessage {
    type Kind = String;

    fn kind(&self) -> String {
        self.command.to_ascii_lowercase()
    }
}
