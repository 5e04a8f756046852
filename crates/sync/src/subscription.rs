//! Subscription manager: live binding slots over the document store.
//!
//! A binding slot owns at most one live channel at a time and caches the
//! last-delivered value. Each delivery is the complete current state and
//! *replaces* the held value; nothing is merged. Channel errors are terminal
//! for the binding -- only a fresh `bind` retries.
//!
//! The cancellation contract: `release()` deregisters synchronously by
//! bumping the slot generation under the slot lock. A notification already
//! in flight carries the old generation and is dropped by the delivery task,
//! never applied to the released slot.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use econote_core::{DocId, Note};
use econote_store::{
    DocSnapshot, DocumentStore, NoteQuery, StoreError, WatchChannel, WatchEvent, WatchHandle,
};

/// Lifecycle of one binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No target bound; reads see the explicit empty value.
    Unbound,
    /// Channel opened, first delivery not yet received.
    Connecting,
    /// At least one delivery received; value is live.
    Live,
    /// Terminal channel error; a new `bind` is the only retry path.
    Error,
    /// Released. Terminal until a new `bind` creates a fresh binding.
    Closed,
}

/// Non-blocking view of a slot: the last-delivered value plus flags.
///
/// `loaded` flips once the first delivery (or error) arrives; the value may
/// be stale by at most the store's propagation latency.
#[derive(Debug, Clone)]
pub struct SlotView<T> {
    pub value: Option<T>,
    pub loaded: bool,
    pub error: Option<StoreError>,
    pub state: SlotState,
}

struct SlotInner<T> {
    state: SlotState,
    value: Option<T>,
    error: Option<StoreError>,
    loaded: bool,
    /// Bumped on every transition; deliveries tagged with an older
    /// generation are dropped.
    generation: u64,
}

/// Generic core shared by query and document bindings.
struct BindingSlot<T> {
    inner: Arc<Mutex<SlotInner<T>>>,
    version_tx: watch::Sender<u64>,
    task: Option<tokio::task::JoinHandle<()>>,
    channel_handle: Option<WatchHandle>,
}

impl<T: Clone + Send + 'static> BindingSlot<T> {
    fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(SlotInner {
                state: SlotState::Unbound,
                value: None,
                error: None,
                loaded: false,
                generation: 0,
            })),
            version_tx,
            task: None,
            channel_handle: None,
        }
    }

    /// Invalidate the current binding and apply a state change, atomically
    /// with the generation bump. The old channel is closed and its delivery
    /// task aborted; any in-flight delivery sees a stale generation.
    fn transition(&mut self, apply: impl FnOnce(&mut SlotInner<T>)) -> u64 {
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.generation += 1;
            apply(&mut inner);
            inner.generation
        };
        if let Some(handle) = self.channel_handle.take() {
            handle.close();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.version_tx.send_modify(|v| *v += 1);
        generation
    }

    /// Attach a freshly opened channel, replacing any previous binding.
    fn bind_channel(&mut self, mut channel: WatchChannel<T>) {
        let generation = self.transition(|inner| {
            inner.state = SlotState::Connecting;
            inner.error = None;
            inner.loaded = false;
        });

        self.channel_handle = Some(channel.handle());

        let inner = Arc::clone(&self.inner);
        let version_tx = self.version_tx.clone();
        self.task = Some(tokio::spawn(async move {
            while let Some(event) = channel.next().await {
                let terminal = {
                    let mut slot = inner.lock().unwrap();
                    if slot.generation != generation {
                        // Rebound or released while this delivery was in
                        // flight; drop it.
                        return;
                    }
                    match event {
                        WatchEvent::Snapshot(value) => {
                            slot.value = Some(value);
                            slot.error = None;
                            slot.loaded = true;
                            slot.state = SlotState::Live;
                            false
                        }
                        WatchEvent::Error(error) => {
                            slot.error = Some(error);
                            slot.loaded = true;
                            slot.state = SlotState::Error;
                            true
                        }
                    }
                };
                version_tx.send_modify(|v| *v += 1);
                if terminal {
                    return;
                }
            }
        }));
    }

    /// Clear to an explicit "no binding" value (target = none).
    fn set_unbound(&mut self, value: Option<T>) {
        self.transition(|inner| {
            inner.state = SlotState::Unbound;
            inner.value = value;
            inner.error = None;
            inner.loaded = true;
        });
    }

    /// Record a channel-open failure as the terminal error state.
    fn set_error(&mut self, error: StoreError) {
        self.transition(|inner| {
            inner.state = SlotState::Error;
            inner.error = Some(error);
            inner.loaded = true;
        });
    }

    /// Release the binding. Idempotent; the held value is retained but can
    /// never be mutated again.
    fn release(&mut self) {
        let already_closed = self.inner.lock().unwrap().state == SlotState::Closed;
        if already_closed {
            return;
        }
        self.transition(|inner| {
            inner.state = SlotState::Closed;
        });
    }

    fn snapshot(&self) -> SlotView<T> {
        let inner = self.inner.lock().unwrap();
        SlotView {
            value: inner.value.clone(),
            loaded: inner.loaded,
            error: inner.error.clone(),
            state: inner.state,
        }
    }

    fn versions(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }
}

impl<T> Drop for BindingSlot<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.channel_handle.take() {
            handle.close();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Live binding to a collection query.
///
/// Mirrors the store's query semantics: every delivery is the full result
/// set. Binding `None` yields an empty, loaded list with no live channel.
pub struct QuerySubscription {
    store: Arc<dyn DocumentStore>,
    slot: Mutex<BindingSlot<Vec<Note>>>,
}

impl QuerySubscription {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            slot: Mutex::new(BindingSlot::new()),
        }
    }

    /// Bind to a query (or to nothing). Rebinding closes the previous
    /// channel; a channel-open failure parks the slot in the terminal
    /// error state.
    pub async fn bind(&self, target: Option<NoteQuery>) {
        match target {
            None => self.slot.lock().unwrap().set_unbound(Some(Vec::new())),
            Some(query) => match self.store.subscribe_query(query).await {
                Ok(channel) => self.slot.lock().unwrap().bind_channel(channel),
                Err(error) => {
                    tracing::warn!(%error, "Query subscription failed to open");
                    self.slot.lock().unwrap().set_error(error);
                }
            },
        }
    }

    /// Last-delivered result set plus loading/error flags. Never blocks.
    pub fn snapshot(&self) -> SlotView<Vec<Note>> {
        self.slot.lock().unwrap().snapshot()
    }

    /// Close the channel and free the binding slot. Idempotent.
    pub fn release(&self) {
        self.slot.lock().unwrap().release();
    }

    /// Change ticker: the receiver observes a new version after every slot
    /// update.
    pub fn versions(&self) -> watch::Receiver<u64> {
        self.slot.lock().unwrap().versions()
    }

    /// Await the first delivery (or terminal error) of the current binding.
    pub async fn wait_loaded(&self) {
        wait_loaded(|| self.snapshot().loaded, self.versions()).await;
    }
}

/// Live binding to a single document.
///
/// A delivered [`DocSnapshot::Missing`] is an explicit "does not exist",
/// distinct from "not yet loaded" (`loaded == false`) and from "no binding"
/// (`value == None` with `loaded == true`).
pub struct DocumentSubscription {
    store: Arc<dyn DocumentStore>,
    slot: Mutex<BindingSlot<DocSnapshot>>,
}

impl DocumentSubscription {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            slot: Mutex::new(BindingSlot::new()),
        }
    }

    pub async fn bind(&self, target: Option<DocId>) {
        match target {
            None => self.slot.lock().unwrap().set_unbound(None),
            Some(id) => match self.store.subscribe_document(&id).await {
                Ok(channel) => self.slot.lock().unwrap().bind_channel(channel),
                Err(error) => {
                    tracing::warn!(note_id = %id, %error, "Document subscription failed to open");
                    self.slot.lock().unwrap().set_error(error);
                }
            },
        }
    }

    pub fn snapshot(&self) -> SlotView<DocSnapshot> {
        self.slot.lock().unwrap().snapshot()
    }

    pub fn release(&self) {
        self.slot.lock().unwrap().release();
    }

    pub fn versions(&self) -> watch::Receiver<u64> {
        self.slot.lock().unwrap().versions()
    }

    pub async fn wait_loaded(&self) {
        wait_loaded(|| self.snapshot().loaded, self.versions()).await;
    }
}

async fn wait_loaded(loaded: impl Fn() -> bool, mut versions: watch::Receiver<u64>) {
    loop {
        if loaded() {
            return;
        }
        if versions.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use econote_store::{WatchChannel, WatchEvent};

    fn note(id: &str, title: &str) -> Note {
        let now = chrono::Utc::now();
        Note {
            id: id.into(),
            owner: "user-1".into(),
            title: title.into(),
            content: String::new(),
            created_at: now,
            updated_at: now,
            location: None,
        }
    }

    /// Let spawned delivery tasks run.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn fresh_slot_is_unbound_and_not_loaded() {
        let slot: BindingSlot<Vec<Note>> = BindingSlot::new();
        let view = slot.snapshot();
        assert_eq!(view.state, SlotState::Unbound);
        assert!(!view.loaded);
        assert!(view.value.is_none());
    }

    #[tokio::test]
    async fn snapshots_replace_the_held_value() {
        let mut slot: BindingSlot<Vec<Note>> = BindingSlot::new();
        let (tx, channel) = WatchChannel::pair();
        slot.bind_channel(channel);
        assert_eq!(slot.snapshot().state, SlotState::Connecting);

        tx.send(WatchEvent::Snapshot(vec![note("a", "A"), note("b", "B")]))
            .unwrap();
        settle().await;
        assert_eq!(slot.snapshot().value.unwrap().len(), 2);

        // The next delivery is authoritative: "b" no longer matches.
        tx.send(WatchEvent::Snapshot(vec![note("a", "A2")])).unwrap();
        settle().await;

        let view = slot.snapshot();
        let notes = view.value.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "A2");
        assert_eq!(view.state, SlotState::Live);
        assert!(view.loaded);
    }

    #[tokio::test]
    async fn late_notification_after_release_is_dropped() {
        let mut slot: BindingSlot<Vec<Note>> = BindingSlot::new();
        let (tx, channel) = WatchChannel::pair();
        slot.bind_channel(channel);

        tx.send(WatchEvent::Snapshot(vec![note("a", "A")])).unwrap();
        settle().await;
        assert_eq!(slot.snapshot().value.as_ref().unwrap().len(), 1);

        slot.release();
        assert_eq!(slot.snapshot().state, SlotState::Closed);

        // Force the race: the sender half is still alive and delivers after
        // release. The slot's held value must not change.
        let _ = tx.send(WatchEvent::Snapshot(vec![]));
        settle().await;

        let view = slot.snapshot();
        assert_eq!(view.state, SlotState::Closed);
        assert_eq!(view.value.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn release_twice_has_no_further_effect() {
        let mut slot: BindingSlot<Vec<Note>> = BindingSlot::new();
        let (_tx, channel) = WatchChannel::pair();
        slot.bind_channel(channel);

        slot.release();
        let first = slot.snapshot();
        let generation = slot.inner.lock().unwrap().generation;

        slot.release();
        let second = slot.snapshot();

        assert_eq!(first.state, second.state);
        assert_eq!(slot.inner.lock().unwrap().generation, generation);
    }

    #[tokio::test]
    async fn rebinding_invalidates_the_previous_channel() {
        let mut slot: BindingSlot<Vec<Note>> = BindingSlot::new();
        let (old_tx, old_channel) = WatchChannel::pair();
        let old_handle = old_channel.handle();
        slot.bind_channel(old_channel);

        let (new_tx, new_channel) = WatchChannel::pair();
        slot.bind_channel(new_channel);

        // The old channel was closed on rebind, and its deliveries no
        // longer apply.
        assert!(old_handle.is_closed());
        let _ = old_tx.send(WatchEvent::Snapshot(vec![note("stale", "Stale")]));
        new_tx
            .send(WatchEvent::Snapshot(vec![note("fresh", "Fresh")]))
            .unwrap();
        settle().await;

        let notes = slot.snapshot().value.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Fresh");
    }

    #[tokio::test]
    async fn channel_error_is_terminal_until_rebind() {
        let mut slot: BindingSlot<Vec<Note>> = BindingSlot::new();
        let (tx, channel) = WatchChannel::pair();
        slot.bind_channel(channel);

        tx.send(WatchEvent::Error(StoreError::PermissionDenied("nope".into())))
            .unwrap();
        settle().await;

        let view = slot.snapshot();
        assert_eq!(view.state, SlotState::Error);
        assert!(view.loaded);
        assert_matches!(view.error, Some(StoreError::PermissionDenied(_)));

        // A snapshot arriving after the error must not resurrect the slot.
        let _ = tx.send(WatchEvent::Snapshot(vec![note("a", "A")]));
        settle().await;
        assert_eq!(slot.snapshot().state, SlotState::Error);

        // Only a new bind retries.
        let (new_tx, new_channel) = WatchChannel::pair();
        slot.bind_channel(new_channel);
        new_tx.send(WatchEvent::Snapshot(vec![])).unwrap();
        settle().await;
        assert_eq!(slot.snapshot().state, SlotState::Live);
    }
}
