//! Face recognition service seam
//!
//! [`FaceService`] mirrors the raw provider calls one to one. Throttling,
//! the confidence policy and the face-count limit live in
//! [`crate::services::RecognitionClient`], not here.

pub mod azure;

pub use azure::AzureFaceClient;

use crate::types::{FaceId, FaceIdentification, IdentityId};
use async_trait::async_trait;
use thiserror::Error;

/// Face service errors
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("Network error: {0}")]
    Network(String),

    /// The person group already exists (only from `create_group`)
    #[error("Person group already exists")]
    GroupExists,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid subscription key")]
    InvalidKey,

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Raw operations of the face recognition provider
#[async_trait]
pub trait FaceService: Send + Sync {
    /// Detect faces in the image behind `image_url`, in provider order
    async fn detect_faces(&self, image_url: &str) -> Result<Vec<FaceId>, FaceError>;

    /// Identify detected faces against a person group
    async fn identify(
        &self,
        group_id: &str,
        face_ids: &[FaceId],
        max_candidates: u32,
        min_confidence: f64,
    ) -> Result<Vec<FaceIdentification>, FaceError>;

    /// Create a person group; fails with [`FaceError::GroupExists`] if present
    async fn create_group(&self, group_id: &str, name: &str) -> Result<(), FaceError>;

    /// Create a person inside a group
    async fn create_person(&self, group_id: &str, name: &str) -> Result<IdentityId, FaceError>;

    /// Attach a sample face image to a person
    async fn add_person_face(
        &self,
        group_id: &str,
        person_id: &IdentityId,
        image_url: &str,
    ) -> Result<(), FaceError>;

    /// Start training the group
    async fn train_group(&self, group_id: &str) -> Result<(), FaceError>;
}
