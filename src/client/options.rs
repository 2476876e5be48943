//! Client configuration.

use std::time::Duration;

use rand::RngExt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::caps::{default_capabilities, Capability};
use crate::transport::ReconnectOptions;

/// The public chat gateway.
pub const DEFAULT_URL: &str = "wss://irc-ws.chat.twitch.tv/";

/// Password the gateway accepts for anonymous, read-only logins.
pub const ANONYMOUS_PASSWORD: &str = "blah";

/// Login credentials. Tokens are supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Credentials {
    pub username: String,
    /// Usually `oauth:<token>`.
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// A random `justinfanNNNNNN` identity.
    pub fn anonymous() -> Self {
        let suffix: u32 = rand::rng().random_range(0..1_000_000);
        Self::new(format!("justinfan{:06}", suffix), ANONYMOUS_PASSWORD)
    }

    pub fn is_anonymous(&self) -> bool {
        self.password == ANONYMOUS_PASSWORD && self.username.starts_with("justinfan")
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::anonymous()
    }
}

// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Options for a [`Client`](super::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientOptions {
    pub auth: Credentials,
    pub url: String,
    /// Interval of the keep-alive latency probe. Zero disables it.
    pub ping_interval_ms: u64,
    /// How long handshake steps, joins and parts wait for the server.
    pub event_timeout_ms: u64,
    /// How long a latency probe waits for its PONG.
    pub ping_timeout_ms: u64,
    pub capabilities: Vec<Capability>,
    pub reconnect: ReconnectOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auth: Credentials::anonymous(),
            url: DEFAULT_URL.to_string(),
            ping_interval_ms: 15_000,
            event_timeout_ms: 3_000,
            ping_timeout_ms: 5_000,
            capabilities: default_capabilities(),
            reconnect: ReconnectOptions::default(),
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn with_auth(mut self, auth: Credentials) -> Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval_ms = millis(interval);
        self
    }

    #[must_use]
    pub fn with_event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout_ms = millis(timeout);
        self
    }

    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout_ms = millis(timeout);
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectOptions) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}
