//! The [`Note`] entity and its mutation payloads.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DocId, Timestamp, UserId};

/// Placeholder title assigned to every newly created note.
pub const PLACEHOLDER_TITLE: &str = "Untitled Note";

/// A geolocation pair attached to a note.
///
/// Latitude and longitude are always both present or both absent; the
/// pairing is enforced by making the whole struct the optional unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Validate coordinate ranges: |latitude| <= 90, |longitude| <= 180.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.latitude.is_finite() || self.latitude.abs() > 90.0 {
            return Err(CoreError::Validation(format!(
                "latitude out of range: {}",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || self.longitude.abs() > 180.0 {
            return Err(CoreError::Validation(format!(
                "longitude out of range: {}",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// The single domain entity: a note owned by one user.
///
/// `id`, `owner`, `created_at`, and `updated_at` are assigned by the remote
/// store; `owner` and `created_at` never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: DocId,
    pub owner: UserId,
    pub title: String,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// Initial fields for note creation.
///
/// Notes are born with a placeholder title and empty content; the store
/// assigns the id and both timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteDraft {
    pub owner: UserId,
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            title: PLACEHOLDER_TITLE.to_owned(),
            content: String::new(),
        }
    }
}

/// A field that participates in debounced editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteField {
    Title,
    Content,
}

impl NoteField {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteField::Title => "title",
            NoteField::Content => "content",
        }
    }
}

impl std::fmt::Display for NoteField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-state patch for the optional location pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LocationPatch {
    /// Leave the stored location untouched.
    #[default]
    Keep,
    /// Remove the stored location.
    Clear,
    /// Replace the stored location.
    Set(GeoPoint),
}

/// An explicit partial update to a note.
///
/// Every field is optional; `updated_at` is always server-assigned and can
/// never be supplied by the caller. Owner and creation timestamp are not
/// representable here at all -- they are immutable.
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub location: LocationPatch,
}

impl FieldPatch {
    /// A patch carrying a single debounced field value.
    pub fn field(field: NoteField, value: impl Into<String>) -> Self {
        let mut patch = Self::default();
        match field {
            NoteField::Title => patch.title = Some(value.into()),
            NoteField::Content => patch.content = Some(value.into()),
        }
        patch
    }

    /// A patch that attaches a location.
    pub fn set_location(location: GeoPoint) -> Self {
        Self {
            location: LocationPatch::Set(location),
            ..Self::default()
        }
    }

    /// A patch that removes the location.
    pub fn clear_location() -> Self {
        Self {
            location: LocationPatch::Clear,
            ..Self::default()
        }
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.location == LocationPatch::Keep
    }

    /// Validate patch contents before they reach the store boundary.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::Validation("empty patch".into()));
        }
        if let LocationPatch::Set(point) = &self.location {
            point.validate()?;
        }
        Ok(())
    }
}
