//! Error types for the tagging pipeline
//!
//! Each layer has its own error enum; [`PipelineError`] gathers them at the
//! orchestrator boundary and [`PipelineError::severity`] decides whether a
//! failure stops the run, skips the item, or is an expected negative outcome.

use crate::recognition::FaceError;
use crate::services::identity_registry::RegistryError;
use crate::services::listing_walker::WalkError;
use crate::services::recognition_client::RecognitionError;
use crate::services::tag_writer::WriteError;
use crate::store::StoreError;
use crate::types::IdentityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How far a failure reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Run stops, last persisted checkpoint stays intact
    FatalToRun,
    /// Item is skipped and attributed to its path, run continues
    FatalToItem,
    /// Expected negative outcome, not reported as an error
    Ignorable,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Listing failed: {0}")]
    Listing(#[from] WalkError),

    #[error("Checkpoint I/O failed: {0}")]
    Checkpoint(#[source] facetag_common::Error),

    #[error("No temporary link for {path}: {source}")]
    Link {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Recognition failed for {path}: {source}")]
    Recognition {
        path: String,
        #[source]
        source: RecognitionError,
    },

    #[error("Resolving names for {path} failed: {source}")]
    NameLookup {
        path: String,
        #[source]
        source: facetag_common::Error,
    },

    /// Recognized identity with no enrolled display name
    #[error("No display name for identity {identity_id} in {path}")]
    UnknownIdentity {
        path: String,
        identity_id: IdentityId,
    },

    #[error("Write-back failed: {0}")]
    WriteBack(#[from] WriteError),

    #[error("Enrollment failed: {0}")]
    Enrollment(#[from] RegistryError),
}

impl PipelineError {
    pub fn severity(&self) -> Severity {
        match self {
            PipelineError::Listing(_) | PipelineError::Checkpoint(_) => Severity::FatalToRun,
            PipelineError::Enrollment(RegistryError::CreateGroup { .. }) => Severity::FatalToRun,
            PipelineError::UnknownIdentity { .. } => Severity::Ignorable,
            PipelineError::Link { .. }
            | PipelineError::Recognition { .. }
            | PipelineError::NameLookup { .. }
            | PipelineError::WriteBack(_)
            | PipelineError::Enrollment(_) => Severity::FatalToItem,
        }
    }

    /// Image path the failure is attributed to, if item-scoped
    pub fn path(&self) -> Option<&str> {
        match self {
            PipelineError::Link { path, .. }
            | PipelineError::Recognition { path, .. }
            | PipelineError::NameLookup { path, .. }
            | PipelineError::UnknownIdentity { path, .. } => Some(path),
            PipelineError::WriteBack(WriteError::Store { path, .. }) => Some(path),
            _ => None,
        }
    }

    /// True if a face-service quota rejection caused this failure
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            PipelineError::Recognition {
                source: RecognitionError::Service(FaceError::RateLimitExceeded),
                ..
            }
        )
    }
}
