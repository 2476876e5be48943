//! Prefix sum type and its classification rules.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The origin of a frame.
///
/// A bare token containing a `.` and neither `!` nor `@` names a server;
/// anything else names a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum Prefix {
    /// `:tmi.twitch.tv`
    Server {
        /// Server host name.
        server: String,
    },
    /// `:nick!user@host`, `:nick@host` or `:nick`
    User {
        /// Nickname.
        nick: String,
        /// Username, the part after `!`.
        user: Option<String>,
        /// Host, the part after `@`.
        host: Option<String>,
    },
}

impl Prefix {
    /// Classify a raw prefix token (without the leading `:`).
    pub fn parse(raw: &str) -> Self {
        let (nick_user, host) = match raw.split_once('@') {
            Some((left, host)) => (left, Some(host.to_string())),
            None => (raw, None),
        };
        let (nick, user) = match nick_user.split_once('!') {
            Some((nick, user)) => (nick, Some(user.to_string())),
            None => (nick_user, None),
        };

        if user.is_none() && host.is_none() && raw.contains('.') {
            return Prefix::Server {
                server: raw.to_string(),
            };
        }

        Prefix::User {
            nick: nick.to_string(),
            user,
            host,
        }
    }

    /// Create a server prefix.
    pub fn server(server: impl Into<String>) -> Self {
        Prefix::Server {
            server: server.into(),
        }
    }

    /// Create a full `nick!user@host` prefix.
    pub fn user(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Prefix::User {
            nick: nick.into(),
            user: Some(user.into()),
            host: Some(host.into()),
        }
    }

    /// The nickname, if this is a user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::User { nick, .. } => Some(nick),
            Prefix::Server { .. } => None,
        }
    }

    /// Whether this prefix names a server.
    pub fn is_server(&self) -> bool {
        matches!(self, Prefix::Server { .. })
    }
}

impl std::str::FromStr for Prefix {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Prefix::parse(s))
    }
}
