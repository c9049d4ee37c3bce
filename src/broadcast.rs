// src/broadcast.rs
//! In-memory, append-only, replaying broadcast log.
//!
//! Every subscriber first receives the whole history in append order, then each new append.
//! Appends push into one unbounded queue per subscriber while holding a short lock that only
//! touches the history and the subscriber set; delivery to the consumer happens outside it.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

pub struct BroadcastLog<T> {
    inner: Mutex<LogState<T>>,
    // live `Subscription`s; each one decrements on drop
    live: Arc<AtomicUsize>,
}

struct LogState<T> {
    history: Vec<T>,
    subscribers: Vec<UnboundedSender<T>>,
}

impl<T: Clone + Send + 'static> Default for BroadcastLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> BroadcastLog<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogState {
                history: Vec::new(),
                subscribers: Vec::new(),
            }),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Record `entry` and hand it to every live subscriber. Never blocks on consumers.
    pub fn append(&self, entry: T) {
        let mut state = self.inner.lock();
        // A failed send means the receiver is gone; drop that subscriber.
        state.subscribers.retain(|tx| tx.send(entry.clone()).is_ok());
        state.history.push(entry);

        counter!("broadcast_appends_total").increment(1);
    }

    /// Start a subscription: backlog first, then live entries. The stream never ends on its own.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock();
        // Backlog is queued under the same lock appends take, so nothing slips in between.
        for entry in &state.history {
            // The receiver is still in our hands; this cannot fail.
            let _ = tx.send(entry.clone());
        }
        state.subscribers.push(tx);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        gauge!("broadcast_subscribers").set(live as f64);

        Subscription {
            inner: UnboundedReceiverStream::new(rx),
            live: Arc::clone(&self.live),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribers still attached. Senders of dropped subscriptions are pruned here too.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.inner.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

/// One consumer's view of the log. Dropping it detaches the consumer.
pub struct Subscription<T> {
    inner: UnboundedReceiverStream<T>,
    live: Arc<AtomicUsize>,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let live = self.live.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        gauge!("broadcast_subscribers").set(live as f64);
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
