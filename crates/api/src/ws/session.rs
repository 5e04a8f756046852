//! Live note session for one WebSocket connection.
//!
//! Each session owns:
//!
//! - one [`QuerySubscription`] bound to the user's note list for the whole
//!   lifetime of the connection,
//! - one [`DocumentSubscription`] switched between notes by `open`/`close`
//!   frames (rebinding closes the previous channel),
//! - one [`DebouncedWriter`] per note the client has edited.
//!
//! Snapshots flow to the client through forwarding tasks; inbound frames are
//! handled on the receive loop. Disconnect releases every binding and
//! discards pending debounced edits.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes};
use tokio::task::JoinHandle;

use econote_core::{DocId, Note, NoteField, UserId};
use econote_store::{DocSnapshot, NoteQuery};
use econote_sync::{DebouncedWriter, DocumentSubscription, QuerySubscription};

use crate::state::AppState;
use crate::ws::manager::{WsManager, WsSender};
use crate::ws::messages::{ClientFrame, ErrorScope, ServerFrame};

pub struct Session {
    state: AppState,
    user_id: UserId,
    sender: WsSender,
    notes: Arc<QuerySubscription>,
    document: Arc<DocumentSubscription>,
    writers: HashMap<DocId, DebouncedWriter>,
    forward_tasks: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn new(state: AppState, user_id: UserId, sender: WsSender) -> Self {
        let notes = Arc::new(QuerySubscription::new(Arc::clone(&state.store)));
        let document = Arc::new(DocumentSubscription::new(Arc::clone(&state.store)));
        Self {
            state,
            user_id,
            sender,
            notes,
            document,
            writers: HashMap::new(),
            forward_tasks: Vec::new(),
        }
    }

    /// Bind the note-list subscription and start the forwarding tasks.
    pub async fn start(&mut self) {
        self.notes
            .bind(Some(NoteQuery::for_owner(self.user_id.clone())))
            .await;

        self.forward_tasks.push(forward_notes(
            Arc::clone(&self.notes),
            self.sender.clone(),
        ));
        self.forward_tasks.push(forward_document(
            Arc::clone(&self.document),
            self.user_id.clone(),
            self.sender.clone(),
        ));
    }

    /// Handle one inbound text frame.
    pub async fn handle_frame(&mut self, text: &str) {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable session frame dropped");
                return;
            }
        };

        match frame {
            ClientFrame::Open { note_id } => {
                tracing::debug!(note_id = %note_id, "Opening note");
                self.document.bind(Some(note_id)).await;
            }
            ClientFrame::Close => {
                self.document.bind(None).await;
            }
            ClientFrame::Edit {
                note_id,
                field,
                value,
            } => {
                self.edit(note_id, field, value).await;
            }
        }
    }

    /// Route an edit through the note's debounced writer, creating the
    /// writer (after an ownership check) on first use.
    async fn edit(&mut self, note_id: DocId, field: NoteField, value: String) {
        if !self.writers.contains_key(&note_id) {
            if !self.owns(&note_id).await {
                send_frame(
                    &self.sender,
                    &ServerFrame::WriteFailed {
                        note_id,
                        field,
                        message: "note not found".into(),
                    },
                );
                return;
            }

            let writer =
                DebouncedWriter::new(Arc::clone(&self.state.store), note_id.clone());
            self.forward_tasks.push(forward_failures(
                writer.watch_failures(),
                Arc::clone(&self.state.ws_manager),
                self.user_id.clone(),
            ));
            self.writers.insert(note_id.clone(), writer);
        }

        // Entry guaranteed by the block above.
        if let Some(writer) = self.writers.get(&note_id) {
            writer.set_field(field, value);
        }
    }

    /// One-shot ownership check: the note exists and belongs to this user.
    async fn owns(&self, note_id: &DocId) -> bool {
        let probe = DocumentSubscription::new(Arc::clone(&self.state.store));
        probe.bind(Some(note_id.clone())).await;
        probe.wait_loaded().await;
        let view = probe.snapshot();
        probe.release();

        match view.value {
            Some(DocSnapshot::Exists(note)) => note.owner == self.user_id,
            _ => false,
        }
    }

    /// Release every binding and discard pending debounced edits.
    pub fn shutdown(&mut self) {
        self.notes.release();
        self.document.release();
        for writer in self.writers.values() {
            writer.shutdown();
        }
        self.writers.clear();
        for task in self.forward_tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.forward_tasks {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Forwarding tasks
// ---------------------------------------------------------------------------

/// Push every note-list snapshot to the client as a full-replace frame.
fn forward_notes(subscription: Arc<QuerySubscription>, sender: WsSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut versions = subscription.versions();
        loop {
            versions.mark_unchanged();
            let view = subscription.snapshot();
            if view.loaded {
                let frame = match view.error {
                    Some(error) => ServerFrame::SubscriptionError {
                        scope: ErrorScope::Notes,
                        message: error.to_string(),
                    },
                    None => ServerFrame::Notes {
                        notes: view.value.unwrap_or_default(),
                    },
                };
                if send_frame(&sender, &frame).is_err() {
                    return;
                }
            }
            if versions.changed().await.is_err() {
                return;
            }
        }
    })
}

/// Push every open-document snapshot to the client.
///
/// A note owned by another user is reported as absent, the same as a
/// deleted one.
fn forward_document(
    subscription: Arc<DocumentSubscription>,
    user_id: UserId,
    sender: WsSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut versions = subscription.versions();
        loop {
            versions.mark_unchanged();
            let view = subscription.snapshot();
            if view.loaded {
                // `value == None` with no error means no note is open;
                // nothing to report.
                let frame = match (view.error, view.value) {
                    (Some(error), _) => Some(ServerFrame::SubscriptionError {
                        scope: ErrorScope::Note,
                        message: error.to_string(),
                    }),
                    (None, Some(snapshot)) => Some(ServerFrame::Note {
                        note: visible_note(snapshot, &user_id),
                    }),
                    (None, None) => None,
                };
                if let Some(frame) = frame {
                    if send_frame(&sender, &frame).is_err() {
                        return;
                    }
                }
            }
            if versions.changed().await.is_err() {
                return;
            }
        }
    })
}

fn visible_note(snapshot: DocSnapshot, user_id: &UserId) -> Option<Note> {
    match snapshot {
        DocSnapshot::Exists(note) if note.owner == *user_id => Some(note),
        _ => None,
    }
}

/// Relay debounced-write failures as transient frames.
///
/// Failures fan out to every connection the user has open, so a write that
/// was lost on one device is also reported on the others.
fn forward_failures(
    mut failures: tokio::sync::broadcast::Receiver<econote_sync::WriteFailure>,
    manager: Arc<WsManager>,
    user_id: UserId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(failure) = failures.recv().await {
            let frame = ServerFrame::WriteFailed {
                note_id: failure.note_id,
                field: failure.field,
                message: failure.message,
            };
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            let sent = manager
                .send_to_user(&user_id, Message::Text(Utf8Bytes::from(text)))
                .await;
            if sent == 0 {
                // The user has fully disconnected; this writer's session is
                // being torn down with them.
                return;
            }
        }
    })
}

/// Serialize and queue one frame. Errors mean the connection is gone.
fn send_frame(sender: &WsSender, frame: &ServerFrame) -> Result<(), ()> {
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    sender
        .send(Message::Text(Utf8Bytes::from(text)))
        .map_err(|_| ())
}
