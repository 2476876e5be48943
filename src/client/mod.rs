//! The chat client.
//!
//! A [`Client`] drives a [`TransportManager`]: it performs the login
//! handshake, answers server PINGs, probes latency on an interval, and
//! republishes everything it sends and receives as [`ClientEvent`]s and on
//! a per-command bus of [`ParsedMessage`]s.
//!
//! ```no_run
//! use tws::client::{Client, ClientOptions};
//!
//! # async fn run() -> tws::client::Result<()> {
//! let client = Client::new(ClientOptions::default());
//! client.on_command("privmsg", |msg| {
//!     println!("{:?}: {:?}", msg.nick(), msg.trailing());
//! });
//! client.connect().await?;
//! client.join("twitchdev", None).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod events;
mod handshake;
mod options;

pub use self::error::{ClientError, Result};
pub use self::events::{ClientEvent, ClientEventKind, RawMessage};
pub use self::options::{ClientOptions, Credentials, ANONYMOUS_PASSWORD, DEFAULT_URL};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::correlate::Subscription;
use crate::emitter::{ListenerId, TypedEventEmitter};
use crate::message::{parse_lines, write_params, Message, ParsedMessage};
use crate::transport::{
    SocketFactory, TransportError, TransportEvent, TransportEventKind, TransportManager,
};
use crate::websocket::WebSocketFactory;

/// The IRC target for a channel, or for a room inside it.
///
/// Channel names are lower-cased and gain a `#`; rooms use
/// `#chatrooms:<channel-id>:<room-uuid>`.
pub fn channel_target(channel: &str, room: Option<&str>) -> String {
    let channel = channel.trim_start_matches('#').to_lowercase();
    match room {
        Some(room) => format!("#chatrooms:{}:{}", channel, room),
        None => format!("#{}", channel),
    }
}

/// Where a [`Client`] is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Waiting for `CAP ACK`.
    Negotiating,
    /// Waiting for the welcome numeric.
    LoggingIn,
    /// Logged in; messages can be exchanged.
    Ready,
    /// The transport is being replaced; the handshake reruns once it opens.
    Reconnecting,
}

#[derive(Default)]
struct State {
    phase: ConnectionState,
    keepalive: Option<JoinHandle<()>>,
    // Pending `connect()` calls. While non-zero they drive the handshake
    // and a reopened transport is not logged in automatically.
    attended: usize,
}

struct Inner {
    options: ClientOptions,
    transport: TransportManager,
    events: Arc<TypedEventEmitter<ClientEvent>>,
    commands: Arc<TypedEventEmitter<ParsedMessage>>,
    state: Mutex<State>,
    started: Instant,
    pings: AtomicU64,
}

/// A Twitch chat connection.
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("username", &self.inner.options.auth.username)
            .field("url", &self.inner.options.url)
            .field("connected", &self.connected())
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

impl Client {
    /// A client connecting over WebSocket.
    pub fn new(options: ClientOptions) -> Self {
        Self::with_factory(options, Arc::new(WebSocketFactory))
    }

    /// A client whose sockets come from `factory`.
    pub fn with_factory(options: ClientOptions, factory: Arc<dyn SocketFactory>) -> Self {
        let transport =
            TransportManager::new(options.url.clone(), options.reconnect.clone(), factory);
        let inner = Arc::new(Inner {
            options,
            transport,
            events: Arc::new(TypedEventEmitter::new()),
            commands: Arc::new(TypedEventEmitter::new()),
            state: Mutex::new(State::default()),
            started: Instant::now(),
            pings: AtomicU64::new(0),
        });

        forward(&inner, TransportEventKind::Message, |inner, event| {
            if let TransportEvent::Message(frame) = event {
                inner.receive(frame);
            }
        });
        forward(&inner, TransportEventKind::Open, |inner, _| inner.transport_opened());
        forward(&inner, TransportEventKind::Reconnect, |inner, _| {
            inner.transport_reconnecting()
        });
        forward(&inner, TransportEventKind::Close, |inner, _| inner.transport_closed());
        forward(&inner, TransportEventKind::Error, |inner, event| {
            if let TransportEvent::Error(err) = event {
                if matches!(err, TransportError::ConnectionTimeout { .. }) {
                    inner.set_phase(ConnectionState::Disconnected);
                }
                inner.events.emit(ClientEvent::Error(err.clone().into()));
            }
        });

        Client { inner }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub fn username(&self) -> &str {
        &self.inner.options.auth.username
    }

    pub fn transport(&self) -> &TransportManager {
        &self.inner.transport
    }

    /// Client events, keyed by [`ClientEventKind`].
    pub fn events(&self) -> &Arc<TypedEventEmitter<ClientEvent>> {
        &self.inner.events
    }

    /// Received messages, keyed by lower-cased command.
    pub fn commands(&self) -> &Arc<TypedEventEmitter<ParsedMessage>> {
        &self.inner.commands
    }

    pub fn on<F>(&self, kind: ClientEventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    /// Listen for received messages with the given command, e.g. `privmsg`.
    pub fn on_command<F>(&self, command: &str, listener: F) -> ListenerId
    where
        F: Fn(&ParsedMessage) + Send + Sync + 'static,
    {
        self.inner.commands.on(command.to_ascii_lowercase(), listener)
    }

    /// True once the transport is open and the handshake has completed.
    pub fn connected(&self) -> bool {
        self.inner.connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().phase
    }

    /// Open the transport and log in.
    ///
    /// On a handshake failure the transport is closed again and the error
    /// returned. If the transport is replaced before the handshake
    /// finishes, the handshake starts over on the new socket.
    pub async fn connect(&self) -> Result<()> {
        if self.connected() {
            return Err(ClientError::AlreadyConnected);
        }
        let _attended = Attended::new(&self.inner);
        self.inner.set_phase(ConnectionState::Connecting);
        if let Err(err) = self.inner.transport.connect().await {
            self.inner.set_phase(ConnectionState::Disconnected);
            return Err(err.into());
        }
        if let Err(err) = self.inner.attended_handshake().await {
            warn!("handshake with {} failed: {}", self.inner.options.url, err);
            self.inner.transport.close();
            self.inner.set_phase(ConnectionState::Disconnected);
            return Err(err);
        }
        self.inner.logged_in();
        Ok(())
    }

    /// Stop the latency probe and close the transport.
    pub fn disconnect(&self) {
        self.inner.set_phase(ConnectionState::Disconnected);
        self.inner.stop_keepalive();
        self.inner.transport.close();
    }

    /// Serialize and send `message`.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.inner.send(message)
    }

    /// Send a chat message to `channel`.
    pub fn privmsg(&self, channel: &str, text: &str) -> Result<()> {
        let target = channel_target(channel, None);
        self.send(&Message::new("PRIVMSG", [target.as_str(), text]))
    }

    /// Measure the round trip of a `PING`.
    pub async fn ping(&self) -> Result<Duration> {
        self.inner.ping().await
    }

    /// Join `channel`, or one of its rooms, and wait for the confirmation.
    pub async fn join(&self, channel: &str, room: Option<&str>) -> Result<()> {
        let target = channel_target(channel, room);
        if self.inner.membership("JOIN", &target).await? {
            Ok(())
        } else {
            Err(ClientError::JoinTimeout { channel: target })
        }
    }

    /// Leave `channel`, or one of its rooms, and wait for the confirmation.
    pub async fn part(&self, channel: &str, room: Option<&str>) -> Result<()> {
        let target = channel_target(channel, room);
        if self.inner.membership("PART", &target).await? {
            Ok(())
        } else {
            Err(ClientError::PartTimeout { channel: target })
        }
    }
}

/// Marks a `connect()` in progress for as long as it is alive.
struct Attended<'a>(&'a Inner);

impl<'a> Attended<'a> {
    fn new(inner: &'a Inner) -> Self {
        inner.lock().attended += 1;
        Attended(inner)
    }
}

impl Drop for Attended<'_> {
    fn drop(&mut self) {
        self.0.lock().attended -= 1;
    }
}

/// `PONG` echoing the parameters of a server `PING`.
fn pong_line(ping: &ParsedMessage) -> String {
    let mut line = String::from("PONG");
    write_params(&mut line, &ping.params);
    line
}

fn forward(inner: &Arc<Inner>, kind: TransportEventKind, handler: fn(&Arc<Inner>, &TransportEvent)) {
    let weak = Arc::downgrade(inner);
    inner.transport.events().on(kind, move |event| {
        if let Some(inner) = weak.upgrade() {
            handler(&inner, event);
        }
    });
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connected(&self) -> bool {
        self.transport.connected() && self.lock().phase == ConnectionState::Ready
    }

    fn set_phase(&self, phase: ConnectionState) {
        let previous = std::mem::replace(&mut self.lock().phase, phase);
        if previous != phase {
            debug!("client state {:?} -> {:?}", previous, phase);
        }
    }

    fn send(&self, message: &Message) -> Result<()> {
        let line = message.serialize()?;
        self.send_line(line)
    }

    fn send_line(&self, line: String) -> Result<()> {
        self.transport.send(line.as_str())?;
        if line.starts_with("PASS ") {
            trace!("> PASS ***");
        } else {
            trace!("> {}", line);
        }
        self.events.emit(ClientEvent::RawSend(RawMessage::now(line)));
        Ok(())
    }

    fn receive(self: &Arc<Self>, frame: &str) {
        self.events.emit(ClientEvent::RawReceive(RawMessage::now(frame)));
        parse_lines(
            frame,
            |message| self.dispatch(message),
            |error| {
                debug!("dropping unparsable line: {}", error);
                let input = error.input.clone();
                self.events.emit(ClientEvent::ParsingError { error, input });
            },
        );
    }

    fn dispatch(self: &Arc<Self>, message: ParsedMessage) {
        trace!("< {}", message.raw);
        if message.is("PING") {
            if let Err(err) = self.send_line(pong_line(&message)) {
                warn!("failed to answer PING: {}", err);
            }
        } else if message.is("RECONNECT") {
            debug!("server requested a reconnect");
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                match inner.transport.reconnect().await {
                    Ok(()) | Err(TransportError::Closed) => {}
                    Err(err) => {
                        warn!("requested reconnect failed: {}", err);
                        inner.set_phase(ConnectionState::Disconnected);
                        inner.events.emit(ClientEvent::Error(err.into()));
                    }
                }
            });
        }
        self.events.emit(ClientEvent::Receive(message.clone()));
        self.commands.emit(message);
    }

    fn logged_in(self: &Arc<Self>) {
        self.set_phase(ConnectionState::Ready);
        self.events.emit(ClientEvent::Open);
        self.start_keepalive();
    }

    fn transport_opened(self: &Arc<Self>) {
        {
            let state = self.lock();
            if state.phase != ConnectionState::Reconnecting || state.attended > 0 {
                return;
            }
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            match inner.handshake().await {
                Ok(()) => inner.logged_in(),
                Err(err) => {
                    warn!("handshake after reconnect failed: {}", err);
                    inner.transport.close();
                    inner.set_phase(ConnectionState::Disconnected);
                    inner.events.emit(ClientEvent::Error(err));
                }
            }
        });
    }

    fn transport_reconnecting(&self) {
        self.set_phase(ConnectionState::Reconnecting);
        self.stop_keepalive();
        self.events.emit(ClientEvent::Reconnect);
    }

    fn transport_closed(&self) {
        self.set_phase(ConnectionState::Disconnected);
        self.stop_keepalive();
        self.events.emit(ClientEvent::Close);
    }

    async fn ping(&self) -> Result<Duration> {
        let seq = self.pings.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}.{}", self.started.elapsed().as_millis(), seq);
        let expected = id.clone();
        let pong = Subscription::new(&self.commands, "pong".to_string(), move |msg: &ParsedMessage| {
            msg.trailing() == Some(expected.as_str())
        });

        let sent = Instant::now();
        self.send(&Message::new("PING", [id.as_str()]))?;
        if pong.first(self.options.ping_timeout()).await.is_err() {
            return Err(ClientError::PingTimeout { id });
        }

        let delay = sent.elapsed();
        debug!("PONG after {:?}", delay);
        self.events.emit(ClientEvent::Pong { delay });
        Ok(delay)
    }

    /// Send `command target` and wait for the server to echo it back for us.
    async fn membership(&self, command: &str, target: &str) -> Result<bool> {
        let nick = self.options.auth.username.clone();
        let expected = target.to_string();
        let confirmation = Subscription::new(
            &self.commands,
            command.to_ascii_lowercase(),
            move |msg: &ParsedMessage| {
                msg.param(0) == Some(expected.as_str())
                    && msg.nick().map_or(false, |n| n.eq_ignore_ascii_case(&nick))
            },
        );
        self.send(&Message::new(command, [target]))?;
        Ok(confirmation
            .first(self.options.event_timeout())
            .await
            .is_ok())
    }

    fn start_keepalive(self: &Arc<Self>) {
        let period = self.options.ping_interval();
        if period.is_zero() {
            return;
        }
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if let Err(err) = inner.ping().await {
                    warn!("keep-alive ping failed: {}", err);
                    inner.events.emit(ClientEvent::Error(err));
                }
            }
        });
        if let Some(previous) = self.lock().keepalive.replace(task) {
            previous.abort();
        }
    }

    fn stop_keepalive(&self) {
        let task = self.lock().keepalive.take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.lock().keepalive.take() {
            task.abort();
        }
        self.transport.close();
    }
}
