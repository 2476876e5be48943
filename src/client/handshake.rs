//! The login sequence: capability negotiation, then PASS/NICK.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::caps::{self, CapReply, Negotiation, Progress};
use crate::correlate::Subscription;
use crate::message::{Message, ParsedMessage};
use crate::transport::{TransportError, TransportEvent, TransportEventKind};

use super::error::{ClientError, Result};
use super::{ConnectionState, Inner};

impl Inner {
    /// Run the whole handshake on a freshly opened transport.
    pub(super) async fn handshake(&self) -> Result<()> {
        self.set_phase(ConnectionState::Negotiating);
        self.negotiate_capabilities().await?;
        self.set_phase(ConnectionState::LoggingIn);
        self.login().await?;
        info!("logged in as {}", self.options.auth.username);
        Ok(())
    }

    /// The handshake of a caller-driven connect.
    ///
    /// When the transport reconnects mid-way the running attempt is
    /// dropped, together with its listeners, and the handshake starts over
    /// once the new socket is open. An explicit close or a failed
    /// reconnect ends it with the transport's error.
    pub(super) async fn attended_handshake(&self) -> Result<()> {
        let events = self.transport.events();
        let mut reconnects = Subscription::all(events, TransportEventKind::Reconnect);
        let mut opens = Subscription::all(events, TransportEventKind::Open);
        let mut closes = Subscription::all(events, TransportEventKind::Close);
        let mut failures = Subscription::new(events, TransportEventKind::Error, |event: &TransportEvent| {
            matches!(event, TransportEvent::Error(TransportError::ConnectionTimeout { .. }))
        });

        loop {
            tokio::select! {
                result = self.handshake() => return result,
                _ = reconnects.next() => {}
                _ = closes.next() => return Err(TransportError::Closed.into()),
            }
            debug!("transport replaced during the handshake, starting over");
            tokio::select! {
                _ = opens.next() => {}
                _ = closes.next() => return Err(TransportError::Closed.into()),
                Some(TransportEvent::Error(err)) = failures.next() => return Err(err.into()),
            }
        }
    }

    /// Send `CAP REQ` and wait until every capability is acknowledged.
    ///
    /// Acknowledgements may be split over several `CAP ACK` lines; any
    /// `CAP NAK` fails the negotiation.
    async fn negotiate_capabilities(&self) -> Result<()> {
        let requested = &self.options.capabilities;
        if requested.is_empty() {
            return Ok(());
        }

        let mut negotiation = Negotiation::new(requested);
        let mut replies = Subscription::new(&self.commands, "cap".to_string(), |msg: &ParsedMessage| {
            CapReply::from_message(msg).is_some()
        });
        self.send(&caps::request(requested))?;

        let deadline = Instant::now() + self.options.event_timeout();
        loop {
            let Ok(reply) = replies.next_before(deadline).await else {
                return Err(ClientError::HandshakeTimeout {
                    missing: negotiation.missing(),
                });
            };
            let Some(reply) = CapReply::from_message(&reply) else {
                continue;
            };
            match negotiation.apply(reply) {
                Progress::Pending => {}
                Progress::Complete => {
                    debug!("capabilities acknowledged");
                    return Ok(());
                }
                Progress::Denied(refused) => {
                    return Err(ClientError::CapabilityDenied { refused });
                }
            }
        }
    }

    /// Send `PASS` and `NICK`, then wait for `001` or a login `NOTICE`.
    async fn login(&self) -> Result<()> {
        let auth = &self.options.auth;
        let welcome = Subscription::all(&self.commands, "001".to_string());
        let rejection = Subscription::new(&self.commands, "notice".to_string(), |msg: &ParsedMessage| {
            msg.param(0) == Some("*")
        });

        self.send(&Message::new("PASS", [auth.password.as_str()]))?;
        self.send(&Message::new("NICK", [auth.username.as_str()]))?;

        let timeout = self.options.event_timeout();
        let timed_out = || ClientError::HandshakeTimeout {
            missing: vec!["001".to_string()],
        };
        tokio::select! {
            welcomed = welcome.first(timeout) => welcomed.map(|_| ()).map_err(|_| timed_out()),
            rejected = rejection.first(timeout) => match rejected {
                Ok(notice) => Err(ClientError::Login(
                    notice.trailing().unwrap_or("login rejected").to_string(),
                )),
                Err(_) => Err(timed_out()),
            },
        }
    }
}
