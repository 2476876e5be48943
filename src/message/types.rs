use std::collections::BTreeMap;
use std::ops::Deref;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::prefix::Prefix;

/// Unescaped IRCv3 message tags. Valueless tags map to an empty string.
pub type Tags = BTreeMap<String, String>;

/// An IRC message: `[@tags] [:prefix] COMMAND [params...]`.
///
/// Only the last parameter may contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    /// IRCv3 message tags, if the frame carried any.
    pub tags: Option<Tags>,
    /// The origin of the message.
    pub prefix: Option<Prefix>,
    /// The command or three-digit numeric, as received.
    pub command: String,
    /// Ordered parameters, the trailing one included.
    pub params: Vec<String>,
}

impl Message {
    /// Create a message without tags or prefix.
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            tags: None,
            prefix: None,
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a tag, creating the tag map if necessary.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(Tags::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Look up a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_ref()?.get(key).map(String::as_str)
    }

    /// The parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, which is the only one allowed to contain spaces.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// The sender's nickname, if the prefix names a user.
    pub fn nick(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Whether the command matches `command`, ignoring ASCII case.
    pub fn is(&self, command: &str) -> bool {
        self.command.eq_ignore_ascii_case(command)
    }
}

/// A message parsed from a single inbound frame, together with the frame.
///
/// Instances are never modified after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParsedMessage {
    /// The line as received, without the CRLF terminator.
    pub raw: String,
    /// The parsed message.
    pub message: Message,
}

impl ParsedMessage {
    /// Discard the raw line.
    pub fn into_message(self) -> Message {
        self.message
    }
}

impl Deref for ParsedMessage {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

impl AsRef<Message> for ParsedMessage {
    fn as_ref(&self) -> &Message {
        &self.message
    }
}
