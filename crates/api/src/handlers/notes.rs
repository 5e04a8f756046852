//! Note CRUD handlers.
//!
//! Reads go through short-lived subscription slots (bind, await the first
//! snapshot, release) so HTTP and WebSocket consumers share one read path.
//! Writes call the store directly: the PATCH surface is for immediate
//! writes such as attaching or clearing a location; debounced title/content
//! editing happens over the WebSocket session.
//!
//! Handlers operate only on the authenticated owner's notes. A foreign
//! note reads as absent (404); mutating one is rejected as forbidden (403).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};

use econote_core::{CoreError, DocId, FieldPatch, GeoPoint, LocationPatch, Note, NoteDraft, UserId};
use econote_store::{DocSnapshot, NoteQuery};
use econote_sync::{DocumentSubscription, QuerySubscription};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

/// Response payload for note creation.
#[derive(Debug, Serialize)]
pub struct CreatedNote {
    pub id: DocId,
    pub title: String,
}

/// PATCH body: every field optional.
///
/// `location` is tri-state: omitted leaves the stored location untouched,
/// an explicit `null` removes it, an object replaces it.
#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub location: Option<Option<GeoPoint>>,
}

/// Wraps a present value (including `null`) in `Some`, so an omitted key
/// (`None` via `#[serde(default)]`) stays distinguishable from `null`
/// (`Some(None)`).
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<GeoPoint>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<GeoPoint>::deserialize(deserializer).map(Some)
}

impl UpdateNoteRequest {
    fn into_patch(self) -> FieldPatch {
        FieldPatch {
            title: self.title,
            content: self.content,
            location: match self.location {
                None => LocationPatch::Keep,
                Some(None) => LocationPatch::Clear,
                Some(Some(point)) => LocationPatch::Set(point),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /notes
///
/// The authenticated user's notes, newest first.
pub async fn list_notes(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let subscription = QuerySubscription::new(Arc::clone(&state.store));
    subscription
        .bind(Some(NoteQuery::for_owner(auth.user_id.clone())))
        .await;
    subscription.wait_loaded().await;
    let view = subscription.snapshot();
    subscription.release();

    if let Some(error) = view.error {
        return Err(error.into());
    }
    let notes = view.value.unwrap_or_default();
    Ok(Json(DataResponse { data: notes }))
}

/// POST /notes
///
/// Create a note with the placeholder title and empty content. The store
/// assigns the id and both timestamps.
pub async fn create_note(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let draft = NoteDraft::new(auth.user_id);
    let title = draft.title.clone();
    let id = state.store.create_note(draft).await?;
    tracing::info!(note_id = %id, "Note created");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedNote { id, title },
        }),
    ))
}

/// GET /notes/{id}
pub async fn get_note(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = DocId::new(id);
    let note = fetch_visible(&state, &id, &auth.user_id).await?;
    Ok(Json(DataResponse { data: note }))
}

/// PATCH /notes/{id}
///
/// Immediate (non-debounced) partial update. Used for location attach and
/// remove; also accepts title/content for clients without a live session.
pub async fn update_note(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateNoteRequest>,
) -> AppResult<impl IntoResponse> {
    let id = DocId::new(id);
    let patch = input.into_patch();
    patch.validate()?;

    ensure_owned(&state, &id, &auth.user_id).await?;
    state.store.write_fields(&id, patch).await?;

    let note = fetch_visible(&state, &id, &auth.user_id).await?;
    Ok(Json(DataResponse { data: note }))
}

/// DELETE /notes/{id}
pub async fn delete_note(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = DocId::new(id);
    ensure_owned(&state, &id, &auth.user_id).await?;
    state.store.delete_note(&id).await?;
    tracing::info!(note_id = %id, "Note deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// One-shot reads over subscription slots
// ---------------------------------------------------------------------------

/// Read the current state of one document: bind, await the first snapshot,
/// release.
async fn read_document(state: &AppState, id: &DocId) -> AppResult<DocSnapshot> {
    let subscription = DocumentSubscription::new(Arc::clone(&state.store));
    subscription.bind(Some(id.clone())).await;
    subscription.wait_loaded().await;
    let view = subscription.snapshot();
    subscription.release();

    if let Some(error) = view.error {
        return Err(error.into());
    }
    view.value
        .ok_or_else(|| AppError::InternalError("loaded document slot held no snapshot".into()))
}

/// Fetch a note for reading. Missing and foreign notes both read as 404 so
/// the existence of other users' notes is not leaked.
async fn fetch_visible(state: &AppState, id: &DocId, user: &UserId) -> AppResult<Note> {
    match read_document(state, id).await? {
        DocSnapshot::Exists(note) if note.owner == *user => Ok(note),
        _ => Err(AppError::Core(CoreError::NotFound {
            entity: "note",
            id: id.to_string(),
        })),
    }
}

/// Precondition for mutations: the note exists (404 otherwise) and belongs
/// to the caller (403 otherwise).
async fn ensure_owned(state: &AppState, id: &DocId, user: &UserId) -> AppResult<()> {
    match read_document(state, id).await? {
        DocSnapshot::Exists(note) if note.owner == *user => Ok(()),
        DocSnapshot::Exists(_) => Err(AppError::Core(CoreError::PermissionDenied(
            "note belongs to another user".into(),
        ))),
        DocSnapshot::Missing => Err(AppError::Core(CoreError::NotFound {
            entity: "note",
            id: id.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_location_keeps_the_stored_value() {
        let body: UpdateNoteRequest = serde_json::from_str(r#"{"title":"T"}"#).unwrap();
        let patch = body.into_patch();
        assert_eq!(patch.location, LocationPatch::Keep);
        assert_eq!(patch.title.as_deref(), Some("T"));
    }

    #[test]
    fn null_location_clears() {
        let body: UpdateNoteRequest = serde_json::from_str(r#"{"location":null}"#).unwrap();
        assert_eq!(body.into_patch().location, LocationPatch::Clear);
    }

    #[test]
    fn object_location_sets() {
        let body: UpdateNoteRequest =
            serde_json::from_str(r#"{"location":{"latitude":51.5,"longitude":-0.12}}"#).unwrap();
        match body.into_patch().location {
            LocationPatch::Set(point) => {
                assert_eq!(point.latitude, 51.5);
                assert_eq!(point.longitude, -0.12);
            }
            other => panic!("expected Set, got {other:?}"),
        }
    }
}
