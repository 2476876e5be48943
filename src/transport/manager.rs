//! The transport manager: one active socket, bounded retries, reconnects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::emitter::{Event, TypedEventEmitter};

use super::error::TransportError;
use super::socket::{SocketCommand, SocketEvent, SocketFactory, SocketIo};

/// Retry and reconnect behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReconnectOptions {
    /// Reconnect automatically when the socket closes unexpectedly.
    pub auto: bool,
    /// Attempts per connect or reconnect. Zero still makes one attempt.
    pub retries: u32,
    /// Pause between failed attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            auto: true,
            retries: 5,
            delay_ms: 5_000,
        }
    }
}

impl ReconnectOptions {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Lifecycle and data events of a [`TransportManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A socket opened and became the active one.
    Open,
    /// A text frame arrived on the active socket.
    Message(String),
    /// An open attempt failed, the socket reported an error, or a
    /// background reconnect gave up.
    Error(TransportError),
    /// The transport closed and will not reconnect by itself.
    Close,
    /// A reconnect started.
    Reconnect,
}

/// Keys of [`TransportEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportEventKind {
    Open,
    Message,
    Error,
    Close,
    Reconnect,
}

impl Event for TransportEvent {
    type Kind = TransportEventKind;

    fn kind(&self) -> TransportEventKind {
        match self {
            TransportEvent::Open => TransportEventKind::Open,
            TransportEvent::Message(_) => TransportEventKind::Message,
            TransportEvent::Error(_) => TransportEventKind::Error,
            TransportEvent::Close => TransportEventKind::Close,
            TransportEvent::Reconnect => TransportEventKind::Reconnect,
        }
    }
}

struct ActiveSocket {
    id: u64,
    commands: mpsc::UnboundedSender<SocketCommand>,
    open: bool,
    reader: Option<JoinHandle<()>>,
}

impl ActiveSocket {
    fn shutdown(self) {
        let _ = self.commands.send(SocketCommand::Close);
        if let Some(reader) = self.reader {
            reader.abort();
        }
    }
}

#[derive(Default)]
struct State {
    active: Option<ActiveSocket>,
    // Set by an explicit close; suppresses reconnects until the next connect.
    closing: bool,
    // Bumped by every connect and close. Opens started under an older
    // epoch never become the active socket.
    epoch: u64,
    // The automatic reconnect started by an unexpected close.
    reconnect_task: Option<JoinHandle<()>>,
}

impl State {
    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        if let Some(task) = self.reconnect_task.take() {
            task.abort();
        }
        self.epoch
    }
}

struct Inner {
    url: String,
    options: ReconnectOptions,
    factory: Arc<dyn SocketFactory>,
    events: Arc<TypedEventEmitter<TransportEvent>>,
    state: Mutex<State>,
    reconnect_gate: tokio::sync::Mutex<()>,
    next_socket: AtomicU64,
}

/// Owns one socket at a time and replaces it when it dies.
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct TransportManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportManager")
            .field("url", &self.inner.url)
            .field("connected", &self.connected())
            .finish()
    }
}

impl TransportManager {
    pub fn new(
        url: impl Into<String>,
        options: ReconnectOptions,
        factory: Arc<dyn SocketFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                options,
                factory,
                events: Arc::new(TypedEventEmitter::new()),
                state: Mutex::new(State::default()),
                reconnect_gate: tokio::sync::Mutex::new(()),
                next_socket: AtomicU64::new(0),
            }),
        }
    }

    /// The event bus of this manager.
    pub fn events(&self) -> &Arc<TypedEventEmitter<TransportEvent>> {
        &self.inner.events
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn options(&self) -> &ReconnectOptions {
        &self.inner.options
    }

    /// Whether a socket is currently open.
    pub fn connected(&self) -> bool {
        self.inner
            .lock()
            .active
            .as_ref()
            .map_or(false, |active| active.open)
    }

    /// Open a socket, retrying up to `retries` times.
    ///
    /// Emits [`TransportEvent::Error`] for every failed attempt and
    /// [`TransportEvent::Open`] on success.
    ///
    /// A pending automatic reconnect is cancelled first.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let epoch = {
            let mut state = self.inner.lock();
            if state.active.as_ref().map_or(false, |active| active.open) {
                return Err(TransportError::AlreadyConnected);
            }
            state.closing = false;
            state.next_epoch()
        };
        let io = self.inner.open_with_retries(epoch).await?;
        self.inner.install(io, epoch)
    }

    /// Replace the active socket with a freshly opened one.
    ///
    /// The previous socket is closed only once the new one is open.
    /// Reconnects of one manager never overlap.
    pub async fn reconnect(&self) -> Result<(), TransportError> {
        self.inner.reconnect().await
    }

    /// Write one frame to the active socket.
    pub fn send(&self, frame: impl Into<String>) -> Result<(), TransportError> {
        let state = self.inner.lock();
        match state.active.as_ref() {
            Some(active) if active.open => active
                .commands
                .send(SocketCommand::Send(frame.into()))
                .map_err(|_| TransportError::NotConnected),
            _ => Err(TransportError::NotConnected),
        }
    }

    /// Close the active socket without reconnecting.
    ///
    /// Any reconnect still waiting between attempts is cancelled.
    pub fn close(&self) {
        let active = {
            let mut state = self.inner.lock();
            state.closing = true;
            state.next_epoch();
            state.active.take()
        };
        if let Some(active) = active {
            active.shutdown();
            info!("closed connection to {}", self.inner.url);
            self.inner.events.emit(TransportEvent::Close);
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn superseded(&self, epoch: u64) -> bool {
        let state = self.lock();
        state.closing || state.epoch != epoch
    }

    async fn open_with_retries(&self, epoch: u64) -> Result<SocketIo, TransportError> {
        let attempts = self.options.retries.max(1);
        for attempt in 1..=attempts {
            if self.superseded(epoch) {
                return Err(TransportError::Closed);
            }
            debug!(attempt, "opening socket to {}", self.url);
            match self.factory.open(&self.url).await {
                Ok(io) => return Ok(io),
                Err(e) => {
                    warn!(attempt, "failed to open socket to {}: {}", self.url, e);
                    self.events.emit(TransportEvent::Error(e.into()));
                    if attempt < attempts {
                        tokio::time::sleep(self.options.delay()).await;
                    }
                }
            }
        }
        Err(TransportError::ConnectionTimeout {
            url: self.url.clone(),
            attempts,
        })
    }

    fn install(self: &Arc<Self>, io: SocketIo, epoch: u64) -> Result<(), TransportError> {
        let id = self.next_socket.fetch_add(1, Ordering::Relaxed);
        let SocketIo { commands, events } = io;

        let previous = {
            let mut state = self.lock();
            if state.closing || state.epoch != epoch {
                debug!("dropping socket {} opened for a superseded connection", id);
                let _ = commands.send(SocketCommand::Close);
                return Err(TransportError::Closed);
            }
            state.active.replace(ActiveSocket {
                id,
                commands,
                open: true,
                reader: None,
            })
        };
        if let Some(previous) = previous {
            debug!("discarding socket {}", previous.id);
            previous.shutdown();
        }

        info!("connected to {}", self.url);
        self.events.emit(TransportEvent::Open);

        // Frames are read only after `open` went out.
        let reader = tokio::spawn(read_loop(Arc::downgrade(self), id, events));
        let mut state = self.lock();
        match state.active.as_mut() {
            Some(active) if active.id == id => active.reader = Some(reader),
            _ => reader.abort(),
        }
        Ok(())
    }

    async fn reconnect(self: &Arc<Self>) -> Result<(), TransportError> {
        let _gate = self.reconnect_gate.lock().await;
        let epoch = {
            let state = self.lock();
            if state.closing {
                return Err(TransportError::Closed);
            }
            state.epoch
        };
        info!("reconnecting to {}", self.url);
        self.events.emit(TransportEvent::Reconnect);
        let io = self.open_with_retries(epoch).await?;
        self.install(io, epoch)
    }

    fn socket_closed(self: &Arc<Self>, id: u64) {
        let mut state = self.lock();
        match state.active.as_mut() {
            Some(active) if active.id == id => active.open = false,
            _ => return,
        }
        if state.closing {
            return;
        }

        if !self.options.auto {
            state.active = None;
            drop(state);
            info!("connection to {} closed", self.url);
            self.events.emit(TransportEvent::Close);
            return;
        }

        warn!("connection to {} closed unexpectedly", self.url);
        // The handle is stored before the lock is released.
        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            match inner.reconnect().await {
                Ok(()) => {}
                Err(TransportError::Closed) => debug!("reconnect to {} cancelled", inner.url),
                Err(e) => {
                    warn!("reconnect to {} failed: {}", inner.url, e);
                    inner.events.emit(TransportEvent::Error(e));
                }
            }
        });
        if let Some(previous) = state.reconnect_task.replace(task) {
            previous.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = state.reconnect_task.take() {
            task.abort();
        }
        if let Some(active) = state.active.take() {
            active.shutdown();
        }
    }
}

async fn read_loop(manager: Weak<Inner>, id: u64, mut events: mpsc::UnboundedReceiver<SocketEvent>) {
    loop {
        let event = events.recv().await;
        let Some(inner) = manager.upgrade() else {
            return;
        };
        match event {
            Some(SocketEvent::Message(frame)) => {
                inner.events.emit(TransportEvent::Message(frame));
            }
            Some(SocketEvent::Error(e)) => {
                warn!("socket error on {}: {}", inner.url, e);
                inner.events.emit(TransportEvent::Error(e.into()));
            }
            Some(SocketEvent::Close) | None => {
                inner.socket_closed(id);
                return;
            }
        }
    }
}
