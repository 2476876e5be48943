//! Request/response correlation over a [`TypedEventEmitter`].
//!
//! A [`Subscription`] registers its listener synchronously on creation, so
//! the usual sequence is: subscribe, send the request, then await the
//! reply. Creating the subscription after sending could miss a fast reply.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::emitter::{Event, ListenerId, TypedEventEmitter};

/// No matching event arrived before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out waiting for event")]
pub struct TimedOut;

/// A filtered listener whose matches are buffered until awaited.
///
/// The listener is removed when the subscription is dropped, whichever way
/// the wait ended.
pub struct Subscription<E: Event> {
    emitter: Arc<TypedEventEmitter<E>>,
    kind: E::Kind,
    id: ListenerId,
    matches: mpsc::UnboundedReceiver<E>,
}

impl<E> Subscription<E>
where
    E: Event + Clone + Send + 'static,
{
    /// Listen for events of `kind` accepted by `predicate`.
    pub fn new<P>(emitter: &Arc<TypedEventEmitter<E>>, kind: E::Kind, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let (tx, matches) = mpsc::unbounded_channel();
        let id = emitter.on(kind.clone(), move |event| {
            if predicate(event) {
                let _ = tx.send(event.clone());
            }
        });
        Self {
            emitter: Arc::clone(emitter),
            kind,
            id,
            matches,
        }
    }

    /// Listen for every event of `kind`.
    pub fn all(emitter: &Arc<TypedEventEmitter<E>>, kind: E::Kind) -> Self {
        Self::new(emitter, kind, |_| true)
    }

    /// The next match, or [`TimedOut`] once `deadline` passes.
    pub async fn next_before(&mut self, deadline: Instant) -> Result<E, TimedOut> {
        match timeout_at(deadline, self.matches.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) | Err(_) => Err(TimedOut),
        }
    }

    /// The next match, however long it takes.
    pub async fn next(&mut self) -> Option<E> {
        self.matches.recv().await
    }

    /// The first match within `timeout`, consuming the subscription.
    pub async fn first(mut self, timeout: Duration) -> Result<E, TimedOut> {
        self.next_before(Instant::now() + timeout).await
    }
}

impl<E: Event> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.emitter.off(&self.kind, self.id);
    }
}

/// Wait for the first event of `kind` matching `predicate`.
///
/// The listener is only registered once the returned future is first
/// polled; use [`Subscription::new`] when a request has to be sent between
/// registering and waiting.
pub async fn await_event<E, P>(
    emitter: &Arc<TypedEventEmitter<E>>,
    kind: E::Kind,
    timeout: Duration,
    predicate: P,
) -> Result<E, TimedOut>
where
    E: Event + Clone + Send + 'static,
    P: Fn(&E) -> bool + Send + Sync + 'static,
{
    Subscription::new(emitter, kind, predicate).first(timeout).await
}
