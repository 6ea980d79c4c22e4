//! Remote file store seam
//!
//! The pipeline talks to the photo store only through [`RemoteStore`].
//! [`dropbox::DropboxClient`] is the production implementation; tests
//! supply in-memory fakes.

pub mod dropbox;

pub use dropbox::DropboxClient;

use crate::types::{
    Cursor, FileEntry, Page, PropertyField, PropertyQuery, SearchPage, TemplateId, TemplateSpec,
};
use async_trait::async_trait;
use thiserror::Error;

/// Remote store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    /// The property group for this template already exists on the file
    #[error("Property group already exists")]
    PropertyGroupAlreadyExists,

    #[error("API error {status}: {summary}")]
    Api {
        status: u16,
        /// Error tag reported by the store, if any
        tag: Option<String>,
        summary: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl StoreError {
    /// Failures worth retrying at the orchestrator boundary
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Operations the pipeline needs from the remote file store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List the first page of a folder
    async fn list_folder(&self, path: &str, limit: Option<u32>) -> Result<Page<FileEntry>, StoreError>;

    /// Continue a listing from a cursor returned by a previous page
    async fn list_folder_continue(&self, cursor: &Cursor) -> Result<Page<FileEntry>, StoreError>;

    /// Short-lived download link for one file
    async fn temporary_link(&self, path: &str) -> Result<String, StoreError>;

    /// Register a metadata template for the current user
    async fn add_template(&self, template: &TemplateSpec) -> Result<TemplateId, StoreError>;

    /// Attach a property group; fails with
    /// [`StoreError::PropertyGroupAlreadyExists`] if one is already attached
    async fn add_properties(
        &self,
        path: &str,
        template_id: &TemplateId,
        fields: &[PropertyField],
    ) -> Result<(), StoreError>;

    /// Replace an existing property group
    async fn overwrite_properties(
        &self,
        path: &str,
        template_id: &TemplateId,
        fields: &[PropertyField],
    ) -> Result<(), StoreError>;

    /// Search property values across the given template fields
    async fn search_properties(&self, query: &PropertyQuery) -> Result<SearchPage, StoreError>;

    /// Continue a property search
    async fn search_properties_continue(&self, cursor: &Cursor) -> Result<SearchPage, StoreError>;
}
