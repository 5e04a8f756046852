//! REST write surface of the remote store.
//!
//! Writes never travel over the listen channel: creates, field updates, and
//! deletes are plain HTTPS calls. The echoed change re-enters through the
//! listen channel like any other committed write.

use serde::Deserialize;
use serde_json::{json, Value};

use econote_core::{DocId, FieldPatch, LocationPatch, NoteDraft};

use crate::config::StoreConfig;
use crate::error::StoreError;

/// HTTP client for the store's document endpoints.
pub struct StoreRest {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

impl StoreRest {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!(
                "https://{}/v1/projects/{}",
                config.auth_domain, config.project_id
            ),
            api_key: config.api_key.clone(),
        }
    }

    /// `POST /collections/notes/documents` -- create with initial fields.
    ///
    /// The store assigns the id and both timestamps; the response carries
    /// the new id.
    pub async fn create_note(&self, draft: &NoteDraft) -> Result<DocId, StoreError> {
        let url = format!("{}/collections/notes/documents", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "owner": draft.owner,
                "title": draft.title,
                "content": draft.content,
            }))
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let response = check_status(response).await?;
        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Protocol(format!("malformed create response: {e}")))?;

        tracing::debug!(note_id = %created.id, "Note document created");
        Ok(DocId::new(created.id))
    }

    /// `PATCH /collections/notes/documents/{id}` -- partial field write.
    ///
    /// `updated_at` is assigned server-side on every write and is never part
    /// of the request body.
    pub async fn write_fields(&self, id: &DocId, patch: &FieldPatch) -> Result<(), StoreError> {
        let url = format!("{}/collections/notes/documents/{}", self.base_url, id);
        let response = self
            .http
            .patch(&url)
            .header("x-api-key", &self.api_key)
            .json(&patch_body(patch))
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        check_status(response).await?;
        Ok(())
    }

    /// `DELETE /collections/notes/documents/{id}`.
    pub async fn delete_note(&self, id: &DocId) -> Result<(), StoreError> {
        let url = format!("{}/collections/notes/documents/{}", self.base_url, id);
        let response = self
            .http
            .delete(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        check_status(response).await?;
        Ok(())
    }
}

/// Encode a [`FieldPatch`] as the store's partial-update body. A cleared
/// location travels as explicit nulls for both coordinates.
fn patch_body(patch: &FieldPatch) -> Value {
    let mut fields = serde_json::Map::new();
    if let Some(title) = &patch.title {
        fields.insert("title".into(), json!(title));
    }
    if let Some(content) = &patch.content {
        fields.insert("content".into(), json!(content));
    }
    match patch.location {
        LocationPatch::Keep => {}
        LocationPatch::Clear => {
            fields.insert("latitude".into(), Value::Null);
            fields.insert("longitude".into(), Value::Null);
        }
        LocationPatch::Set(point) => {
            fields.insert("latitude".into(), json!(point.latitude));
            fields.insert("longitude".into(), json!(point.longitude));
        }
    }
    Value::Object(fields)
}

/// Map HTTP statuses to the store error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => StoreError::PermissionDenied(body),
        404 => StoreError::NotFound(body),
        500..=599 => StoreError::Unavailable(format!("{status}: {body}")),
        _ => StoreError::Protocol(format!("{status}: {body}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use econote_core::{GeoPoint, NoteField};

    #[test]
    fn patch_body_carries_only_named_fields() {
        let body = patch_body(&FieldPatch::field(NoteField::Title, "My Trip"));
        assert_eq!(body["title"], "My Trip");
        assert!(body.get("content").is_none());
        assert!(body.get("latitude").is_none());
    }

    #[test]
    fn cleared_location_travels_as_nulls() {
        let body = patch_body(&FieldPatch::clear_location());
        assert!(body["latitude"].is_null());
        assert!(body["longitude"].is_null());
    }

    #[test]
    fn set_location_travels_as_numbers() {
        let body = patch_body(&FieldPatch::set_location(GeoPoint {
            latitude: 51.5,
            longitude: -0.12,
        }));
        assert_eq!(body["latitude"], 51.5);
        assert_eq!(body["longitude"], -0.12);
    }
}
