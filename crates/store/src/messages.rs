//! Typed wire messages for the store's listen channel.
//!
//! The listen protocol is JSON over WebSocket. The client registers targets
//! (a query or a single document) under a caller-chosen `target_id`; the
//! server pushes the complete current state of each target on every change.

use serde::{Deserialize, Serialize};

use econote_core::{GeoPoint, Note, Timestamp};

use crate::error::StoreError;
use crate::{NoteQuery, SortOrder};

/// Frames sent from client to store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        target_id: String,
        target: SubscribeTarget,
    },
    Unsubscribe {
        target_id: String,
    },
}

/// What a subscription observes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscribeTarget {
    Query {
        collection: String,
        owner: String,
        order_by: String,
        descending: bool,
    },
    Document {
        collection: String,
        document_id: String,
    },
}

impl SubscribeTarget {
    pub fn query(query: &NoteQuery) -> Self {
        SubscribeTarget::Query {
            collection: "notes".to_owned(),
            owner: query.owner.to_string(),
            order_by: "created_at".to_owned(),
            descending: query.order == SortOrder::CreatedDesc,
        }
    }

    pub fn document(document_id: &str) -> Self {
        SubscribeTarget::Document {
            collection: "notes".to_owned(),
            document_id: document_id.to_owned(),
        }
    }
}

/// Frames pushed from store to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full result set for a query target.
    Snapshot {
        target_id: String,
        documents: Vec<WireDocument>,
    },
    /// Full state of a document target; `None` means it does not exist.
    Document {
        target_id: String,
        document: Option<WireDocument>,
    },
    /// Terminal error for one target.
    Error {
        target_id: String,
        code: String,
        message: String,
    },
}

/// A note document as it appears on the wire.
///
/// Latitude/longitude travel as independent optionals (the store is
/// schema-light); [`into_note`](Self::into_note) enforces the pairing and
/// coordinate ranges when crossing into the domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDocument {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl WireDocument {
    /// Validate and convert into the domain entity.
    pub fn into_note(self) -> Result<Note, StoreError> {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                let point = GeoPoint {
                    latitude,
                    longitude,
                };
                point
                    .validate()
                    .map_err(|e| StoreError::Decode(format!("document {}: {e}", self.id)))?;
                Some(point)
            }
            (None, None) => None,
            _ => {
                return Err(StoreError::Decode(format!(
                    "document {}: latitude and longitude must both be present or both absent",
                    self.id
                )))
            }
        };

        Ok(Note {
            id: self.id.into(),
            owner: self.owner.into(),
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
            location,
        })
    }

    pub fn from_note(note: &Note) -> Self {
        Self {
            id: note.id.to_string(),
            owner: note.owner.to_string(),
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
            latitude: note.location.map(|p| p.latitude),
            longitude: note.location.map(|p| p.longitude),
        }
    }
}
