//! Client error types.

use thiserror::Error;

use crate::error::ValidationError;
use crate::transport::TransportError;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Errors raised by the [`Client`](super::Client).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// `connect` was called while connected and logged in.
    #[error("already connected")]
    AlreadyConnected,

    /// The transport failed or is not connected.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An outbound message could not be serialized.
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),

    /// The server refused requested capabilities.
    #[error("capabilities refused: {}", .refused.join(", "))]
    CapabilityDenied {
        /// The refused capability names.
        refused: Vec<String>,
    },

    /// The server did not answer a handshake step in time.
    #[error("handshake timed out waiting for: {}", .missing.join(", "))]
    HandshakeTimeout {
        /// What was still outstanding.
        missing: Vec<String>,
    },

    /// The server rejected the credentials.
    #[error("login failed: {0}")]
    Login(String),

    /// No JOIN confirmation arrived in time.
    #[error("timed out joining {channel}")]
    JoinTimeout {
        /// The join target.
        channel: String,
    },

    /// No PART confirmation arrived in time.
    #[error("timed out leaving {channel}")]
    PartTimeout {
        /// The part target.
        channel: String,
    },

    /// No PONG matching the probe arrived in time.
    #[error("no PONG for ping {id}")]
    PingTimeout {
        /// The probe identifier.
        id: String,
    },
}
