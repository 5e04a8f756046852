//! Session frame types exchanged with browser clients.
//!
//! Tagged JSON on both directions. Every `notes`/`note` frame carries the
//! complete current state; clients replace, never merge.

use serde::{Deserialize, Serialize};

use econote_core::{DocId, Note, NoteField};

/// Frames sent by the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start observing one note (the editor opened it). Replaces any note
    /// currently observed by this session.
    Open { note_id: DocId },
    /// Stop observing the currently open note.
    Close,
    /// A local edit to a debounced field of an open note.
    Edit {
        note_id: DocId,
        field: NoteField,
        value: String,
    },
}

/// Which live binding a subscription error belongs to.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// The session's note-list binding.
    Notes,
    /// The currently open document binding.
    Note,
}

/// Frames sent by the server.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Full replacement of the user's note list.
    Notes { notes: Vec<Note> },
    /// Full replacement of the open note. `None` means the document does
    /// not exist (e.g. it was deleted while open).
    Note { note: Option<Note> },
    /// A live binding failed. Terminal for that binding; the client may
    /// re-open to retry.
    SubscriptionError { scope: ErrorScope, message: String },
    /// A debounced write was rejected by the store. The local draft is
    /// kept; nothing is retried.
    WriteFailed {
        note_id: DocId,
        field: NoteField,
        message: String,
    },
}
