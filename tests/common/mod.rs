//! Shared fixtures: an in-memory socket factory and the server end of each
//! socket it opens.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tws::transport::{SocketCommand, SocketError, SocketEvent, SocketFactory, SocketIo};

/// Opens in-memory sockets, optionally failing the first few attempts.
pub struct MockFactory {
    failures: AtomicU32,
    attempts: AtomicU32,
    servers: mpsc::UnboundedSender<MockServer>,
}

impl MockFactory {
    /// The factory and a stream of the server end of every opened socket.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let factory = Arc::new(Self {
            failures: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            servers,
        });
        (factory, accepted)
    }

    /// Refuse the next `count` open attempts.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Open attempts so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl SocketFactory for MockFactory {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<SocketIo, SocketError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if refused {
            Err(SocketError::new(format!("connection to {} refused", url)))
        } else {
            let (io, sent, events) = SocketIo::pair();
            let _ = self.servers.send(MockServer { sent, events });
            Ok(io)
        };
        Box::pin(async move { result })
    }
}

/// The far end of one mock socket.
pub struct MockServer {
    sent: mpsc::UnboundedReceiver<SocketCommand>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl MockServer {
    /// The next frame the client wrote, or `None` once it closed the socket.
    pub async fn recv(&mut self) -> Option<String> {
        match self.sent.recv().await {
            Some(SocketCommand::Send(frame)) => Some(frame),
            Some(SocketCommand::Close) | None => None,
        }
    }

    /// Assert the next frame the client wrote.
    pub async fn expect(&mut self, line: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(line));
    }

    /// Whether anything was written without waiting for it.
    pub fn try_recv(&mut self) -> Option<SocketCommand> {
        self.sent.try_recv().ok()
    }

    /// Deliver a frame to the client.
    pub fn push(&self, frame: &str) {
        let _ = self.events.send(SocketEvent::Message(frame.to_string()));
    }

    pub fn error(&self, message: &str) {
        let _ = self.events.send(SocketEvent::Error(SocketError::new(message)));
    }

    /// Drop the connection from the server side.
    pub fn close(&self) {
        let _ = self.events.send(SocketEvent::Close);
    }

    /// Answer the client login: acknowledge capabilities, take PASS and
    /// NICK, send the welcome.
    pub async fn accept_login(&mut self, nick: &str, password: &str) {
        self.expect("CAP REQ :twitch.tv/tags twitch.tv/membership twitch.tv/commands")
            .await;
        self.push(":tmi.twitch.tv CAP * ACK :twitch.tv/tags twitch.tv/membership twitch.tv/commands");
        self.expect(&format!("PASS {}", password)).await;
        self.expect(&format!("NICK {}", nick)).await;
        self.push(&format!(":tmi.twitch.tv 001 {} :Welcome, GLHF!", nick));
    }
}

/// Wait for the next accepted socket.
pub async fn next_server(servers: &mut mpsc::UnboundedReceiver<MockServer>) -> MockServer {
    tokio::time::timeout(Duration::from_secs(60), servers.recv())
        .await
        .expect("no socket opened in time")
        .expect("factory dropped")
}

/// Route `tracing` output through the test harness, once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
