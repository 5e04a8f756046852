//! Core domain types for the EcoNote platform.
//!
//! Everything here is pure data: the [`Note`](note::Note) entity, the
//! identifier newtypes, and the shared error taxonomy. No I/O.

pub mod error;
pub mod note;
pub mod types;

pub use error::CoreError;
pub use note::{FieldPatch, GeoPoint, LocationPatch, Note, NoteDraft, NoteField, PLACEHOLDER_TITLE};
pub use types::{DocId, Timestamp, UserId};
