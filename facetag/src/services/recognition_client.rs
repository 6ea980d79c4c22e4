//! Throttled recognition client
//!
//! Two-phase protocol per image: detect faces, then identify them against
//! the person group. Both calls pass through the shared [`Throttle`] first,
//! since they draw on the same provider quota. No retries happen here.

use crate::recognition::{FaceError, FaceService};
use crate::services::rate_limiter::Throttle;
use crate::types::{FaceIdentification, IdentityId, ImageRef, RecognitionResult};
use std::sync::Arc;
use thiserror::Error;

/// Provider hard limit on faces per identify call
pub const MAX_FACES_PER_IMAGE: usize = 10;

/// Inclusive lower bound on candidate confidence
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Candidates kept per detected face
pub const MAX_CANDIDATES_PER_FACE: u32 = 1;

#[derive(Debug, Error)]
pub enum RecognitionError {
    /// More faces than one identify call accepts; nothing was identified
    #[error("Too many faces detected: {count} (limit {MAX_FACES_PER_IMAGE})")]
    TooManyFaces { count: usize },

    #[error("Face service error: {0}")]
    Service(#[from] FaceError),
}

/// Face recognition behind a process-wide throttle
pub struct RecognitionClient {
    service: Arc<dyn FaceService>,
    throttle: Arc<Throttle>,
    group_id: String,
}

impl RecognitionClient {
    pub fn new(
        service: Arc<dyn FaceService>,
        throttle: Arc<Throttle>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            service,
            throttle,
            group_id: group_id.into(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Identities recognized in one image
    ///
    /// Zero detected faces is an empty result, not an error.
    pub async fn identify(&self, image: &ImageRef) -> Result<RecognitionResult, RecognitionError> {
        self.throttle.acquire().await;
        let faces = self.service.detect_faces(&image.link).await?;

        if faces.is_empty() {
            tracing::debug!(path = %image.path, "No faces detected");
            return Ok(RecognitionResult::empty(&image.path));
        }

        if faces.len() > MAX_FACES_PER_IMAGE {
            return Err(RecognitionError::TooManyFaces { count: faces.len() });
        }

        tracing::debug!(path = %image.path, faces = faces.len(), "Faces detected");

        self.throttle.acquire().await;
        let identifications = self
            .service
            .identify(&self.group_id, &faces, MAX_CANDIDATES_PER_FACE, MIN_CONFIDENCE)
            .await?;

        Ok(RecognitionResult {
            image_path: image.path.clone(),
            identities: select_identities(&identifications),
        })
    }
}

/// Best qualifying candidate per face, deduplicated, in face order
///
/// The provider is asked for the confidence floor already; it is applied
/// again here so the boundary does not depend on provider behavior.
pub fn select_identities(identifications: &[FaceIdentification]) -> Vec<IdentityId> {
    let mut identities: Vec<IdentityId> = Vec::new();

    for face in identifications {
        let best = face
            .candidates
            .iter()
            .take(MAX_CANDIDATES_PER_FACE as usize)
            .find(|c| c.confidence >= MIN_CONFIDENCE);

        if let Some(candidate) = best {
            if !identities.contains(&candidate.identity_id) {
                identities.push(candidate.identity_id.clone());
            }
        }
    }

    identities
}
