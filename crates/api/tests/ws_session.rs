//! Tests for the live note session, driven directly (no HTTP upgrade).
//!
//! A session is constructed around one half of a `WsManager` connection;
//! outbound frames are read from the receiver half and parsed as JSON.

mod common;

use std::time::Duration;

use axum::extract::ws::Message;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use common::build_test_state;
use econote_api::ws::session::Session;
use econote_core::{DocId, Note, UserId};
use econote_store::MemoryStore;

fn seeded_note(store: &MemoryStore, id: &str, owner: &str, title: &str) -> DocId {
    let id = DocId::new(id);
    store.insert_note(Note {
        id: id.clone(),
        owner: UserId::new(owner),
        title: title.into(),
        content: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        location: None,
    });
    id
}

async fn session_for(store: MemoryStore, user: &str) -> (Session, UnboundedReceiver<Message>) {
    let state = build_test_state(store);
    let (sender, rx) = state
        .ws_manager
        .add("conn-test".to_string(), UserId::new(user))
        .await;
    let mut session = Session::new(state, UserId::new(user), sender);
    session.start().await;
    (session, rx)
}

/// Let subscription and forwarding tasks run.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Pop the next text frame as JSON.
async fn next_frame(rx: &mut UnboundedReceiver<Message>) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("expected a frame within 1s")
        .expect("channel should stay open");
    match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Pop frames until one of the given type arrives.
async fn frame_of_type(rx: &mut UnboundedReceiver<Message>, frame_type: &str) -> Value {
    loop {
        let frame = next_frame(rx).await;
        if frame["type"] == frame_type {
            return frame;
        }
    }
}

// ---------------------------------------------------------------------------
// Test: connecting delivers the full note list, then tracks changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_starts_with_a_full_note_list() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "alice", "First");
    seeded_note(&store, "n2", "bob", "Not hers");

    let (mut session, mut rx) = session_for(store, "alice").await;
    settle().await;

    let frame = frame_of_type(&mut rx, "notes").await;
    let notes = frame["notes"].as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["title"], "First");

    session.shutdown();
}

#[tokio::test]
async fn note_list_frames_are_full_replacements() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "alice", "First");

    let (mut session, mut rx) = session_for(store.clone(), "alice").await;
    settle().await;
    let _initial = frame_of_type(&mut rx, "notes").await;

    seeded_note(&store, "n2", "alice", "Second");
    settle().await;

    let frame = frame_of_type(&mut rx, "notes").await;
    assert_eq!(frame["notes"].as_array().unwrap().len(), 2);

    session.shutdown();
}

// ---------------------------------------------------------------------------
// Test: open/close switch the document binding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_frame_delivers_the_document() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "alice", "My Trip");

    let (mut session, mut rx) = session_for(store, "alice").await;
    settle().await;

    session
        .handle_frame(r#"{"type":"open","note_id":"n1"}"#)
        .await;
    settle().await;

    let frame = frame_of_type(&mut rx, "note").await;
    assert_eq!(frame["note"]["title"], "My Trip");

    session.shutdown();
}

#[tokio::test]
async fn opening_a_missing_note_reports_null() {
    let store = MemoryStore::new();
    let (mut session, mut rx) = session_for(store, "alice").await;
    settle().await;

    session
        .handle_frame(r#"{"type":"open","note_id":"nope"}"#)
        .await;
    settle().await;

    let frame = frame_of_type(&mut rx, "note").await;
    assert!(frame["note"].is_null());

    session.shutdown();
}

#[tokio::test]
async fn foreign_notes_read_as_absent() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "bob", "Bob's note");

    let (mut session, mut rx) = session_for(store, "alice").await;
    settle().await;

    session
        .handle_frame(r#"{"type":"open","note_id":"n1"}"#)
        .await;
    settle().await;

    let frame = frame_of_type(&mut rx, "note").await;
    assert!(frame["note"].is_null());

    session.shutdown();
}

// ---------------------------------------------------------------------------
// Test: edit frames flow through the debounced writer
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rapid_edits_produce_a_single_write() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "alice", "Untitled Note");

    let (mut session, _rx) = session_for(store.clone(), "alice").await;
    settle().await;

    session
        .handle_frame(r#"{"type":"edit","note_id":"n1","field":"title","value":"My"}"#)
        .await;
    session
        .handle_frame(r#"{"type":"edit","note_id":"n1","field":"title","value":"My Trip"}"#)
        .await;
    settle().await;

    tokio::time::advance(Duration::from_millis(501)).await;
    settle().await;

    assert_eq!(store.write_count(), 1);
    assert_eq!(store.note(&DocId::new("n1")).unwrap().title, "My Trip");

    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn failed_write_surfaces_as_a_write_failed_frame() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "alice", "Untitled Note");

    let (mut session, mut rx) = session_for(store.clone(), "alice").await;
    settle().await;

    store.fail_next_write();
    session
        .handle_frame(r#"{"type":"edit","note_id":"n1","field":"content","value":"lost"}"#)
        .await;

    tokio::time::advance(Duration::from_millis(501)).await;
    settle().await;

    let frame = frame_of_type(&mut rx, "write_failed").await;
    assert_eq!(frame["note_id"], "n1");
    assert_eq!(frame["field"], "content");

    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn write_failures_reach_all_of_the_users_connections() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "alice", "Untitled Note");

    let state = build_test_state(store.clone());
    let (sender, mut rx_editor) = state
        .ws_manager
        .add("conn-editor".to_string(), UserId::new("alice"))
        .await;
    let (_phone_sender, mut rx_phone) = state
        .ws_manager
        .add("conn-phone".to_string(), UserId::new("alice"))
        .await;

    let mut session = Session::new(state, UserId::new("alice"), sender);
    session.start().await;
    settle().await;

    store.fail_next_write();
    session
        .handle_frame(r#"{"type":"edit","note_id":"n1","field":"title","value":"lost"}"#)
        .await;

    tokio::time::advance(Duration::from_millis(501)).await;
    settle().await;

    // The editing connection and the user's other device both hear it.
    let frame = frame_of_type(&mut rx_editor, "write_failed").await;
    assert_eq!(frame["note_id"], "n1");
    let frame = frame_of_type(&mut rx_phone, "write_failed").await;
    assert_eq!(frame["note_id"], "n1");

    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn editing_a_foreign_note_is_rejected() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "bob", "Bob's note");

    let (mut session, mut rx) = session_for(store.clone(), "alice").await;
    settle().await;

    session
        .handle_frame(r#"{"type":"edit","note_id":"n1","field":"title","value":"hijacked"}"#)
        .await;

    let frame = frame_of_type(&mut rx, "write_failed").await;
    assert_eq!(frame["note_id"], "n1");

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.note(&DocId::new("n1")).unwrap().title, "Bob's note");

    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn disconnect_discards_pending_edits() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "alice", "Untitled Note");

    let (mut session, _rx) = session_for(store.clone(), "alice").await;
    settle().await;

    session
        .handle_frame(r#"{"type":"edit","note_id":"n1","field":"title","value":"never"}"#)
        .await;
    session.shutdown();

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;

    assert_eq!(store.write_count(), 0);
    assert_eq!(
        store.note(&DocId::new("n1")).unwrap().title,
        "Untitled Note"
    );
}

// ---------------------------------------------------------------------------
// Test: shutdown releases the list binding; later changes are not forwarded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_frames_after_shutdown() {
    let store = MemoryStore::new();
    seeded_note(&store, "n1", "alice", "First");

    let (mut session, mut rx) = session_for(store.clone(), "alice").await;
    settle().await;
    let _initial = frame_of_type(&mut rx, "notes").await;

    session.shutdown();
    seeded_note(&store, "n2", "alice", "Second");
    store.force_broadcast();
    settle().await;

    assert!(
        rx.try_recv().is_err(),
        "released session must not forward further snapshots"
    );
}
