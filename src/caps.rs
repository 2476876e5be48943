//! IRCv3 capability negotiation support.
//!
//! The chat gateway understands three vendor capabilities. They are
//! requested with a single `CAP REQ` and acknowledged with one or more
//! `CAP * ACK` replies, or refused with `CAP * NAK`.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Definition of a known gateway capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDef {
    /// Capability name (e.g., "twitch.tv/tags")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

/// Known capability types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub enum Capability {
    /// Metadata tags on chat and state messages
    Tags,
    /// JOIN/PART and NAMES for other users
    Membership,
    /// Gateway-specific commands (USERNOTICE, CLEARCHAT, RECONNECT, ...)
    Commands,
    /// Unknown/custom capability
    Custom(String),
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::Tags => "twitch.tv/tags",
            Self::Membership => "twitch.tv/membership",
            Self::Commands => "twitch.tv/commands",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "twitch.tv/tags" => Self::Tags,
            "twitch.tv/membership" => Self::Membership,
            "twitch.tv/commands" => Self::Commands,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for Capability {
    fn from(s: String) -> Self {
        Capability::from(s.as_str())
    }
}

impl From<Capability> for String {
    fn from(cap: Capability) -> Self {
        match cap {
            Capability::Custom(s) => s,
            known => known.as_ref().to_string(),
        }
    }
}

/// Static list of capabilities the gateway offers.
pub const CAPABILITIES: &[CapabilityDef] = &[
    CapabilityDef {
        name: "twitch.tv/tags",
        description: "Badges, colors, emotes and ids as message tags",
    },
    CapabilityDef {
        name: "twitch.tv/membership",
        description: "JOIN, PART and NAMES for other chatters",
    },
    CapabilityDef {
        name: "twitch.tv/commands",
        description: "CLEARCHAT, HOSTTARGET, NOTICE, RECONNECT, ROOMSTATE, USERNOTICE, USERSTATE",
    },
];

/// The capabilities requested when none are configured: all of them.
pub fn default_capabilities() -> Vec<Capability> {
    vec![Capability::Tags, Capability::Membership, Capability::Commands]
}

/// Check if a capability name is offered by the gateway.
pub fn is_supported(name: &str) -> bool {
    CAPABILITIES.iter().any(|cap| cap.name == name)
}

/// Build the `CAP REQ` message for `caps`.
pub fn request(caps: &[Capability]) -> Message {
    let list = caps
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");
    Message::new("CAP", ["REQ".to_string(), list])
}

/// A server reply to a capability request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapReply {
    /// The listed capabilities were enabled.
    Ack(Vec<String>),
    /// The listed capabilities were refused.
    Nak(Vec<String>),
}

impl CapReply {
    /// Interpret `CAP <target> ACK|NAK :<caps>`. Other messages yield `None`.
    pub fn from_message(message: &Message) -> Option<Self> {
        if !message.is("CAP") || message.params.len() < 3 {
            return None;
        }
        let caps = message
            .trailing()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        match message.params[1].to_ascii_uppercase().as_str() {
            "ACK" => Some(CapReply::Ack(caps)),
            "NAK" => Some(CapReply::Nak(caps)),
            _ => None,
        }
    }
}

/// Progress of a negotiation after a reply was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Some requested capabilities are still unacknowledged.
    Pending,
    /// Every requested capability was acknowledged.
    Complete,
    /// The server refused the listed capabilities.
    Denied(Vec<String>),
}

/// Accumulates ACK replies until they cover the requested set.
#[derive(Debug, Clone)]
pub struct Negotiation {
    requested: BTreeSet<String>,
    acknowledged: BTreeSet<String>,
}

impl Negotiation {
    /// Start tracking a request for `caps`.
    pub fn new(caps: &[Capability]) -> Self {
        Self {
            requested: caps.iter().map(|c| c.as_ref().to_string()).collect(),
            acknowledged: BTreeSet::new(),
        }
    }

    /// Fold one reply into the negotiation.
    pub fn apply(&mut self, reply: CapReply) -> Progress {
        match reply {
            CapReply::Nak(refused) => Progress::Denied(refused),
            CapReply::Ack(caps) => {
                self.acknowledged.extend(caps);
                if self.is_complete() {
                    Progress::Complete
                } else {
                    Progress::Pending
                }
            }
        }
    }

    /// Whether every requested capability has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.requested.is_subset(&self.acknowledged)
    }

    /// Requested capabilities not yet acknowledged, in name order.
    pub fn missing(&self) -> Vec<String> {
        self.requested
            .difference(&self.acknowledged)
            .cloned()
            .collect()
    }
}
