//! Core types shared by the walker, recognizer, registry and orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Pagination
// ============================================================================

/// Opaque pagination token issued by the remote store
///
/// Only store adapters create cursors. Everything else round-trips them
/// verbatim and replaces them wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One batch of listing results plus continuation state
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor to continue the listing after this page
    pub cursor: Cursor,
    /// False is terminal for a walk
    pub has_more: bool,
}

// ============================================================================
// Listing
// ============================================================================

/// A file entry exactly as listed by the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Lower-cased path
    pub path: String,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// An eligible image produced by the listing walker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    /// Lower-cased, unique path
    pub path: String,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// An image path paired with a temporary access link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub path: String,
    pub link: String,
}

// ============================================================================
// Recognition
// ============================================================================

/// Identity id assigned by the recognition service when a person is enrolled
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transient id of one detected face
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceId(String);

impl FaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A candidate identity for one face
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub identity_id: IdentityId,
    /// Confidence score (0.0-1.0)
    pub confidence: f64,
}

/// Identification output for one face, candidates ordered best first
#[derive(Debug, Clone, PartialEq)]
pub struct FaceIdentification {
    pub face_id: FaceId,
    pub candidates: Vec<Candidate>,
}

/// Identities recognized in one image
///
/// `identities` has no duplicates and keeps face detection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub image_path: String,
    pub identities: Vec<IdentityId>,
}

impl RecognitionResult {
    pub fn empty(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            identities: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Id of the structured-metadata template on the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One named string value of a property group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyField {
    pub name: String,
    pub value: String,
}

/// Field declaration of a metadata template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateField {
    pub name: String,
    pub description: String,
}

/// Metadata template definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    pub name: String,
    pub description: String,
    pub fields: Vec<TemplateField>,
}

/// Property search over one or more template fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyQuery {
    pub query: String,
    pub field_names: Vec<String>,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: String,
    pub is_deleted: bool,
}

/// Page of search hits; `cursor` is None when there are no more results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub matches: Vec<SearchMatch>,
    pub cursor: Option<Cursor>,
}

// ============================================================================
// Checkpoint
// ============================================================================

/// Persisted resume state of one tag space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// None means start a fresh walk from the root
    pub cursor: Option<Cursor>,
    /// Images modified before this instant are skipped on incremental runs
    pub last_modified_watermark: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trips_verbatim() {
        let token = "AAH4f99T0taONIb-OurWxbNQ6ywGRopQngc3QbXG2qCx";
        let cursor = Cursor::new(token);
        assert_eq!(cursor.as_str(), token);
        assert_eq!(cursor.to_string(), token);

        let json = serde_json::to_string(&cursor).unwrap();
        assert_eq!(json, format!("\"{}\"", token));
    }

    #[test]
    fn test_empty_recognition_result() {
        let result = RecognitionResult::empty("/photos/a.jpg");
        assert!(result.is_empty());
        assert_eq!(result.image_path, "/photos/a.jpg");
    }
}
