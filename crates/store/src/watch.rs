//! The cancellable subscription primitive.
//!
//! A live subscription is a [`WatchChannel`] (the receiving half) plus a
//! [`WatchHandle`] (a handle with a single `close` operation). Closing is
//! idempotent and synchronous from the caller's perspective: the token flips
//! immediately, and the owning connection deregisters the target on
//! observation.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// One delivery on a subscription channel.
#[derive(Debug, Clone)]
pub enum WatchEvent<T> {
    /// The complete current value. Replaces, never merges, prior state.
    Snapshot(T),
    /// A terminal error for this subscription. No further snapshots follow
    /// and the channel does not auto-resubscribe.
    Error(StoreError),
}

/// Handle owning a subscription's lifetime. Cloneable; `close` is
/// idempotent.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    cancel: CancellationToken,
}

impl WatchHandle {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    /// Close the subscription. Safe to call any number of times.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the handle has been closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}

impl Default for WatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving half of a live subscription.
pub struct WatchChannel<T> {
    rx: mpsc::UnboundedReceiver<WatchEvent<T>>,
    handle: WatchHandle,
}

impl<T> WatchChannel<T> {
    /// Pair a channel with its handle. Used by store implementations.
    pub fn new(rx: mpsc::UnboundedReceiver<WatchEvent<T>>, handle: WatchHandle) -> Self {
        Self { rx, handle }
    }

    /// Create a channel plus the sender half, for in-process stores and
    /// tests.
    pub fn pair() -> (mpsc::UnboundedSender<WatchEvent<T>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, WatchHandle::new()))
    }

    /// Await the next event. `None` once the sender side is gone (the
    /// subscription was deregistered).
    pub async fn next(&mut self) -> Option<WatchEvent<T>> {
        self.rx.recv().await
    }

    /// A clone of the handle, for closing from elsewhere.
    pub fn handle(&self) -> WatchHandle {
        self.handle.clone()
    }

    /// Close this subscription.
    pub fn close(&self) {
        self.handle.close();
    }
}
