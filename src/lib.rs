//! # tws
//!
//! A Twitch chat client over WebSocket.
//!
//! ## Features
//!
//! - IRCv3 line parsing and serialization with tags, prefixes and params
//! - A typed event emitter and request/response correlation on top of it
//! - A socket transport with bounded-retry connect and automatic reconnect
//! - A client that negotiates capabilities, logs in, answers PINGs and
//!   measures latency
//!
//! The codec, emitter and capability modules have no runtime dependency;
//! everything that needs tokio sits behind the default `tokio` feature.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Parsing messages
//!
//! ```rust
//! use tws::message::parse_line;
//!
//! let raw = "@badges=;color=#0D4200 :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :Kappa Keepo Kappa";
//! let msg = parse_line(raw).expect("valid line");
//!
//! assert_eq!(msg.command, "PRIVMSG");
//! assert_eq!(msg.tag("color"), Some("#0D4200"));
//! assert_eq!(msg.nick(), Some("ronni"));
//! assert_eq!(msg.trailing(), Some("Kappa Keepo Kappa"));
//! ```
//!
//! ### Building messages
//!
//! ```rust
//! use tws::Message;
//!
//! let msg = Message::new("PRIVMSG", ["#dallas", "Hello there"]);
//! assert_eq!(msg.serialize().unwrap(), "PRIVMSG #dallas :Hello there");
//! ```

pub mod caps;
pub mod emitter;
pub mod error;
pub mod message;
pub mod prefix;

#[cfg(feature = "tokio")]
pub mod client;
#[cfg(feature = "tokio")]
pub mod correlate;
#[cfg(feature = "tokio")]
pub mod transport;
#[cfg(feature = "tokio")]
pub mod websocket;

pub use self::caps::Capability;
pub use self::emitter::{Event, ListenerId, TypedEventEmitter};
pub use self::error::{ParseError, ValidationError};
pub use self::message::{parse_line, parse_lines, serialize, Message, ParsedMessage, Tags};
pub use self::prefix::Prefix;

#[cfg(feature = "tokio")]
pub use self::client::{
    Client, ClientError, ClientEvent, ClientEventKind, ClientOptions, ConnectionState, Credentials,
};
#[cfg(feature = "tokio")]
pub use self::correlate::{await_event, Subscription, TimedOut};
#[cfg(feature = "tokio")]
pub use self::transport::{ReconnectOptions, TransportError, TransportManager};
#[cfg(feature = "tokio")]
pub use self::websocket::WebSocketFactory;
