//! Debounced mutation pipeline for note field edits.
//!
//! Each text field of a note gets its own debounce timer: a new edit to the
//! same field supersedes the pending one and restarts the interval, while
//! edits to different fields stay independent. When a timer expires, exactly
//! one single-field write is sent to the store carrying the latest value.
//!
//! Writes are optimistic and fire-and-forget. A failed write is reported on
//! the failure channel and logged; the local value is not rolled back and
//! the write is not retried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use econote_core::{DocId, FieldPatch, NoteField};
use econote_store::DocumentStore;

/// Quiet period between the last edit to a field and its remote write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Notification that a debounced write was rejected by the store.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub note_id: DocId,
    pub field: NoteField,
    pub message: String,
}

/// Coalesces rapid edits to one note into debounced single-field writes.
///
/// One writer per open note. Dropping the writer (or calling
/// [`shutdown`](Self::shutdown)) cancels all pending timers without
/// flushing: unwritten edits are discarded, matching the close-without-save
/// semantics of the editing session.
pub struct DebouncedWriter {
    store: Arc<dyn DocumentStore>,
    note_id: DocId,
    interval: Duration,
    pending: Arc<Mutex<PendingState>>,
    failure_tx: broadcast::Sender<WriteFailure>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct PendingState {
    fields: HashMap<NoteField, Pending>,
    /// Monotonic edit counter. Each edit takes a fresh epoch; an expiring
    /// timer flushes only if its epoch still owns the field's entry.
    next_epoch: u64,
}

struct Pending {
    value: String,
    epoch: u64,
}

impl DebouncedWriter {
    pub fn new(store: Arc<dyn DocumentStore>, note_id: DocId) -> Self {
        Self::with_interval(store, note_id, DEFAULT_DEBOUNCE)
    }

    pub fn with_interval(
        store: Arc<dyn DocumentStore>,
        note_id: DocId,
        interval: Duration,
    ) -> Self {
        let (failure_tx, _) = broadcast::channel(16);
        Self {
            store,
            note_id,
            interval,
            pending: Arc::new(Mutex::new(PendingState::default())),
            failure_tx,
            cancel: CancellationToken::new(),
        }
    }

    pub fn note_id(&self) -> &DocId {
        &self.note_id
    }

    /// Record an edit and (re)start the field's debounce timer.
    ///
    /// Returns immediately. The remote write happens after `interval` of
    /// quiet on this field; an intervening edit to the same field discards
    /// this value in favor of the newer one.
    pub fn set_field(&self, field: NoteField, value: impl Into<String>) {
        let epoch = {
            let mut pending = self.pending.lock().unwrap();
            pending.next_epoch += 1;
            let epoch = pending.next_epoch;
            pending.fields.insert(
                field,
                Pending {
                    value: value.into(),
                    epoch,
                },
            );
            epoch
        };

        let store = Arc::clone(&self.store);
        let note_id = self.note_id.clone();
        let pending = Arc::clone(&self.pending);
        let failure_tx = self.failure_tx.clone();
        let cancel = self.cancel.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }

            // Flush only if no newer edit took over this field.
            let value = {
                let mut pending = pending.lock().unwrap();
                match pending.fields.get(&field) {
                    Some(entry) if entry.epoch == epoch => {
                        pending.fields.remove(&field).map(|entry| entry.value)
                    }
                    _ => None,
                }
            };
            let Some(value) = value else { return };

            let patch = FieldPatch::field(field, value);
            if let Err(error) = store.write_fields(&note_id, patch).await {
                tracing::warn!(
                    note_id = %note_id,
                    field = %field,
                    %error,
                    "Debounced write failed",
                );
                let _ = failure_tx.send(WriteFailure {
                    note_id: note_id.clone(),
                    field,
                    message: error.to_string(),
                });
            }
        });
    }

    /// Subscribe to write-failure notifications.
    pub fn watch_failures(&self) -> broadcast::Receiver<WriteFailure> {
        self.failure_tx.subscribe()
    }

    /// Fields with an edit still waiting out its quiet period.
    pub fn pending_fields(&self) -> Vec<NoteField> {
        self.pending.lock().unwrap().fields.keys().copied().collect()
    }

    /// Cancel all pending timers. Unflushed edits are discarded.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.pending.lock().unwrap().fields.clear();
    }
}

impl Drop for DebouncedWriter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use econote_core::{NoteDraft, UserId};
    use econote_store::MemoryStore;

    async fn seeded() -> (MemoryStore, DocId) {
        let store = MemoryStore::new();
        let id = store
            .create_note(NoteDraft::new(UserId::new("user-1")))
            .await
            .unwrap();
        (store, id)
    }

    fn writer(store: &MemoryStore, id: &DocId) -> DebouncedWriter {
        DebouncedWriter::new(Arc::new(store.clone()), id.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_write() {
        let (store, id) = seeded().await;
        let writer = writer(&store, &id);

        writer.set_field(NoteField::Title, "M");
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(100)).await;
        writer.set_field(NoteField::Title, "My Trip");
        tokio::task::yield_now().await;

        // Quiet period measured from the last edit.
        tokio::time::advance(Duration::from_millis(499)).await;
        assert_eq!(store.write_count(), 0);

        tokio::time::advance(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1.title.as_deref(), Some("My Trip"));
        assert_eq!(store.note(&id).unwrap().title, "My Trip");
    }

    #[tokio::test(start_paused = true)]
    async fn fields_debounce_independently() {
        let (store, id) = seeded().await;
        let writer = writer(&store, &id);

        writer.set_field(NoteField::Title, "My Trip");
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(300)).await;
        writer.set_field(NoteField::Content, "Packing list");
        tokio::task::yield_now().await;

        // Title's timer expires first; content's keeps waiting.
        tokio::time::advance(Duration::from_millis(250)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(writer.pending_fields(), vec![NoteField::Content]);

        tokio::time::advance(Duration::from_millis(300)).await;
        tokio::task::yield_now().await;

        let writes = store.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1.title.as_deref(), Some("My Trip"));
        assert_eq!(writes[1].1.content.as_deref(), Some("Packing list"));
    }

    #[tokio::test(start_paused = true)]
    async fn each_write_carries_a_single_field() {
        let (store, id) = seeded().await;
        let writer = writer(&store, &id);

        writer.set_field(NoteField::Title, "T");
        writer.set_field(NoteField::Content, "C");
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_millis(501)).await;
        tokio::task::yield_now().await;

        for (_, patch) in store.writes() {
            let fields = usize::from(patch.title.is_some()) + usize::from(patch.content.is_some());
            assert_eq!(fields, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_reported_and_not_retried() {
        let (store, id) = seeded().await;
        let writer = writer(&store, &id);
        let mut failures = writer.watch_failures();

        store.fail_next_write();
        writer.set_field(NoteField::Title, "My Trip");
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_millis(501)).await;
        tokio::task::yield_now().await;

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.field, NoteField::Title);
        assert_eq!(failure.note_id, id);

        // No retry, and the stored title is untouched.
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.note(&id).unwrap().title, "Untitled Note");
        assert_matches!(
            failures.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_pending_edits() {
        let (store, id) = seeded().await;
        let writer = writer(&store, &id);

        writer.set_field(NoteField::Title, "never written");
        writer.shutdown();

        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.write_count(), 0);
        assert!(writer.pending_fields().is_empty());
    }
}
