//! In-process [`DocumentStore`] for tests.
//!
//! Behaves like the real store from a subscriber's point of view: every
//! subscription receives the complete current state immediately, then a
//! fresh full snapshot after each mutation. Test hooks allow failing the
//! next write and re-broadcasting on demand (to force notification races).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use econote_core::{DocId, FieldPatch, LocationPatch, Note, NoteDraft, Timestamp};

use crate::error::StoreError;
use crate::watch::{WatchChannel, WatchEvent, WatchHandle};
use crate::{DocSnapshot, DocumentStore, NoteQuery, SortOrder};

/// Shared in-memory store. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    notes: BTreeMap<DocId, Note>,
    seq: u64,
    query_watchers: Vec<QueryWatcher>,
    doc_watchers: Vec<DocWatcher>,
    writes: Vec<(DocId, FieldPatch)>,
    fail_next_write: bool,
}

struct QueryWatcher {
    query: NoteQuery,
    tx: mpsc::UnboundedSender<WatchEvent<Vec<Note>>>,
    handle: WatchHandle,
}

struct DocWatcher {
    id: DocId,
    tx: mpsc::UnboundedSender<WatchEvent<DocSnapshot>>,
    handle: WatchHandle,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully-formed note (bypassing the create path).
    pub fn insert_note(&self, note: Note) {
        let mut inner = self.inner.lock().unwrap();
        inner.notes.insert(note.id.clone(), note);
        inner.broadcast();
    }

    /// Current stored state of a note.
    pub fn note(&self, id: &DocId) -> Option<Note> {
        self.inner.lock().unwrap().notes.get(id).cloned()
    }

    /// Every patch accepted by `write_fields`, in order.
    pub fn writes(&self) -> Vec<(DocId, FieldPatch)> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes.len()
    }

    /// Make the next `write_fields` call fail with `Unavailable`.
    pub fn fail_next_write(&self) {
        self.inner.lock().unwrap().fail_next_write = true;
    }

    /// Re-send the current state to every live watcher, ignoring closed
    /// handles. Lets tests force a notification race against a released
    /// binding.
    pub fn force_broadcast(&self) {
        let inner = self.inner.lock().unwrap();
        let notes = inner.notes.clone();
        for watcher in &inner.query_watchers {
            let _ = watcher
                .tx
                .send(WatchEvent::Snapshot(matching(&notes, &watcher.query)));
        }
        for watcher in &inner.doc_watchers {
            let _ = watcher.tx.send(WatchEvent::Snapshot(snapshot_of(&notes, &watcher.id)));
        }
    }
}

impl Inner {
    fn next_id(&mut self) -> DocId {
        self.seq += 1;
        DocId::new(format!("note-{}", self.seq))
    }

    /// Push the complete current state to every open watcher, pruning
    /// closed or disconnected ones.
    fn broadcast(&mut self) {
        let notes = self.notes.clone();
        self.query_watchers.retain(|watcher| {
            if watcher.handle.is_closed() {
                return false;
            }
            watcher
                .tx
                .send(WatchEvent::Snapshot(matching(&notes, &watcher.query)))
                .is_ok()
        });
        self.doc_watchers.retain(|watcher| {
            if watcher.handle.is_closed() {
                return false;
            }
            watcher
                .tx
                .send(WatchEvent::Snapshot(snapshot_of(&notes, &watcher.id)))
                .is_ok()
        });
    }
}

fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Full result set for a query: owner filter plus ordering, ties broken by
/// id so snapshots are deterministic.
fn matching(notes: &BTreeMap<DocId, Note>, query: &NoteQuery) -> Vec<Note> {
    let mut result: Vec<Note> = notes
        .values()
        .filter(|note| note.owner == query.owner)
        .cloned()
        .collect();
    match query.order {
        SortOrder::CreatedDesc => {
            result.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)))
        }
        SortOrder::CreatedAsc => {
            result.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
        }
    }
    result
}

fn snapshot_of(notes: &BTreeMap<DocId, Note>, id: &DocId) -> DocSnapshot {
    match notes.get(id) {
        Some(note) => DocSnapshot::Exists(note.clone()),
        None => DocSnapshot::Missing,
    }
}

fn apply_patch(note: &mut Note, patch: &FieldPatch) {
    if let Some(title) = &patch.title {
        note.title = title.clone();
    }
    if let Some(content) = &patch.content {
        note.content = content.clone();
    }
    match patch.location {
        LocationPatch::Keep => {}
        LocationPatch::Clear => note.location = None,
        LocationPatch::Set(point) => note.location = Some(point),
    }
    note.updated_at = now();
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_note(&self, draft: NoteDraft) -> Result<DocId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let timestamp = now();
        let note = Note {
            id: id.clone(),
            owner: draft.owner,
            title: draft.title,
            content: draft.content,
            created_at: timestamp,
            updated_at: timestamp,
            location: None,
        };
        inner.notes.insert(id.clone(), note);
        inner.broadcast();
        Ok(id)
    }

    async fn write_fields(&self, id: &DocId, patch: FieldPatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next_write {
            inner.fail_next_write = false;
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        let Some(note) = inner.notes.get_mut(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        apply_patch(note, &patch);
        inner.writes.push((id.clone(), patch));
        inner.broadcast();
        Ok(())
    }

    async fn delete_note(&self, id: &DocId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.notes.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        inner.broadcast();
        Ok(())
    }

    async fn subscribe_query(
        &self,
        query: NoteQuery,
    ) -> Result<WatchChannel<Vec<Note>>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = WatchHandle::new();
        let mut inner = self.inner.lock().unwrap();

        // Initial snapshot: the complete current result set.
        let _ = tx.send(WatchEvent::Snapshot(matching(&inner.notes, &query)));

        inner.query_watchers.push(QueryWatcher {
            query,
            tx,
            handle: handle.clone(),
        });
        Ok(WatchChannel::new(rx, handle))
    }

    async fn subscribe_document(
        &self,
        id: &DocId,
    ) -> Result<WatchChannel<DocSnapshot>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = WatchHandle::new();
        let mut inner = self.inner.lock().unwrap();

        let _ = tx.send(WatchEvent::Snapshot(snapshot_of(&inner.notes, id)));

        inner.doc_watchers.push(DocWatcher {
            id: id.clone(),
            tx,
            handle: handle.clone(),
        });
        Ok(WatchChannel::new(rx, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use econote_core::{NoteField, UserId};

    fn owner() -> UserId {
        UserId::new("user-1")
    }

    #[tokio::test]
    async fn subscribers_get_an_initial_snapshot() {
        let store = MemoryStore::new();
        store.create_note(NoteDraft::new(owner())).await.unwrap();

        let mut chan = store
            .subscribe_query(NoteQuery::for_owner(owner()))
            .await
            .unwrap();

        let event = chan.next().await.unwrap();
        assert_matches!(event, WatchEvent::Snapshot(notes) if notes.len() == 1);
    }

    #[tokio::test]
    async fn mutations_push_fresh_full_snapshots() {
        let store = MemoryStore::new();
        let id = store.create_note(NoteDraft::new(owner())).await.unwrap();

        let mut chan = store
            .subscribe_query(NoteQuery::for_owner(owner()))
            .await
            .unwrap();
        let _initial = chan.next().await.unwrap();

        store
            .write_fields(&id, FieldPatch::field(NoteField::Title, "My Trip"))
            .await
            .unwrap();

        let event = chan.next().await.unwrap();
        assert_matches!(event, WatchEvent::Snapshot(notes) if notes[0].title == "My Trip");
    }

    #[tokio::test]
    async fn query_filters_by_owner() {
        let store = MemoryStore::new();
        store.create_note(NoteDraft::new(owner())).await.unwrap();
        store
            .create_note(NoteDraft::new(UserId::new("someone-else")))
            .await
            .unwrap();

        let mut chan = store
            .subscribe_query(NoteQuery::for_owner(owner()))
            .await
            .unwrap();

        let event = chan.next().await.unwrap();
        assert_matches!(event, WatchEvent::Snapshot(notes) if notes.len() == 1);
    }

    #[tokio::test]
    async fn missing_document_snapshot_is_explicit() {
        let store = MemoryStore::new();
        let mut chan = store
            .subscribe_document(&DocId::new("nope"))
            .await
            .unwrap();

        let event = chan.next().await.unwrap();
        assert_matches!(event, WatchEvent::Snapshot(DocSnapshot::Missing));
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let store = MemoryStore::new();
        let id = store.create_note(NoteDraft::new(owner())).await.unwrap();

        store.fail_next_write();
        let result = store
            .write_fields(&id, FieldPatch::field(NoteField::Title, "X"))
            .await;

        assert_matches!(result, Err(StoreError::Unavailable(_)));
        assert_eq!(store.note(&id).unwrap().title, "Untitled Note");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn delete_pushes_missing_to_document_watchers() {
        let store = MemoryStore::new();
        let id = store.create_note(NoteDraft::new(owner())).await.unwrap();

        let mut chan = store.subscribe_document(&id).await.unwrap();
        assert_matches!(
            chan.next().await.unwrap(),
            WatchEvent::Snapshot(DocSnapshot::Exists(_))
        );

        store.delete_note(&id).await.unwrap();
        assert_matches!(
            chan.next().await.unwrap(),
            WatchEvent::Snapshot(DocSnapshot::Missing)
        );
    }
}
