//! Remote Document Store client library.
//!
//! The store is an external managed document database: documents grouped
//! into collections, queryable and observable in real time. This crate
//! provides the typed client -- a WebSocket listen channel for live
//! subscriptions ([`client`]), a REST surface for writes ([`rest`]), the
//! wire message types ([`messages`]), configuration loading ([`config`]),
//! and an in-process test double ([`memory`]).
//!
//! There is no global connection singleton: a [`LiveStore`] is constructed
//! explicitly at application start and injected (as `Arc<dyn DocumentStore>`)
//! into every component that needs store access.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod messages;
pub mod rest;
pub mod watch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use econote_core::{DocId, FieldPatch, Note, NoteDraft, UserId};

pub use client::{LiveStore, StoreClient};
pub use config::{
    read_overrides_from, save_overrides_to, ConfigError, StoreConfig, StoreOverrides,
    DEFAULT_SETTINGS_PATH,
};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use watch::{WatchChannel, WatchEvent, WatchHandle};

/// Sort order for a collection query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest first (the application default).
    #[default]
    CreatedDesc,
    CreatedAsc,
}

/// A collection query descriptor: owner filter plus ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    pub owner: UserId,
    pub order: SortOrder,
}

impl NoteQuery {
    /// Notes owned by `owner`, newest first.
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            owner,
            order: SortOrder::CreatedDesc,
        }
    }
}

/// The complete current state of a single observed document.
///
/// `Missing` is an explicit "does not exist" marker -- distinct from "not
/// yet loaded", which is a subscription-slot concern, not a store concern.
#[derive(Debug, Clone, PartialEq)]
pub enum DocSnapshot {
    Exists(Note),
    Missing,
}

impl DocSnapshot {
    pub fn note(&self) -> Option<&Note> {
        match self {
            DocSnapshot::Exists(note) => Some(note),
            DocSnapshot::Missing => None,
        }
    }
}

/// Operations consumed from the Remote Document Store.
///
/// Every snapshot delivered on a subscription channel is the *complete*
/// current result set or document; consumers replace, never merge. Channel
/// errors are terminal for that subscription -- no implementation retries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a note document; the store assigns id and both timestamps.
    async fn create_note(&self, draft: NoteDraft) -> Result<DocId, StoreError>;

    /// Apply a partial field update. `updated_at` is server-assigned on
    /// every write.
    async fn write_fields(&self, id: &DocId, patch: FieldPatch) -> Result<(), StoreError>;

    /// Delete a note document.
    async fn delete_note(&self, id: &DocId) -> Result<(), StoreError>;

    /// Open a live channel delivering the full result set of `query` on
    /// every change, starting with the current state.
    async fn subscribe_query(&self, query: NoteQuery)
        -> Result<WatchChannel<Vec<Note>>, StoreError>;

    /// Open a live channel delivering the full document (or `Missing`) on
    /// every change, starting with the current state.
    async fn subscribe_document(&self, id: &DocId)
        -> Result<WatchChannel<DocSnapshot>, StoreError>;
}
