//! Identity registry
//!
//! Enrollment side of recognition: creates the person group, registers a
//! display name as an identity, attaches sample faces, retrains the group
//! and records `identity -> display name` in the checkpoint store so
//! recognition results can be resolved later.

use crate::db::CheckpointStore;
use crate::recognition::{FaceError, FaceService};
use crate::services::listing_walker::{ListingWalker, WalkError, WalkStart};
use crate::services::rate_limiter::Throttle;
use crate::types::{IdentityId, ImageRef};
use futures::{pin_mut, StreamExt};
use std::sync::Arc;
use thiserror::Error;

/// One variant per enrollment step
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Creating person group {group_id} failed: {source}")]
    CreateGroup {
        group_id: String,
        #[source]
        source: FaceError,
    },

    #[error("Registering identity {name:?} failed: {source}")]
    RegisterIdentity {
        name: String,
        #[source]
        source: FaceError,
    },

    /// Every sample face failed to attach
    #[error("No faces attached for {name:?} ({attempted} attempted)")]
    NoFacesAttached { name: String, attempted: usize },

    #[error("Training person group {group_id} failed: {source}")]
    Training {
        group_id: String,
        #[source]
        source: FaceError,
    },

    #[error("Persisting identity {identity_id} failed: {source}")]
    Persist {
        identity_id: IdentityId,
        #[source]
        source: facetag_common::Error,
    },

    #[error("Listing training images failed: {0}")]
    Listing(#[from] WalkError),
}

/// Successful enrollment of one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub identity_id: IdentityId,
    /// Lower-cased display name as stored
    pub display_name: String,
    pub faces_attached: usize,
}

/// Enrollment request: a display name and the folder holding sample photos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonSource {
    pub display_name: String,
    pub folder: String,
}

impl PersonSource {
    /// Parse `"Display Name=/folder/path"`
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, folder) = raw.split_once('=')?;
        let (name, folder) = (name.trim(), folder.trim());
        if name.is_empty() || folder.is_empty() {
            return None;
        }
        Some(Self {
            display_name: name.to_string(),
            folder: folder.to_string(),
        })
    }
}

pub struct IdentityRegistry {
    service: Arc<dyn FaceService>,
    throttle: Arc<Throttle>,
    checkpoints: CheckpointStore,
    group_id: String,
    group_name: String,
}

impl IdentityRegistry {
    pub fn new(
        service: Arc<dyn FaceService>,
        throttle: Arc<Throttle>,
        checkpoints: CheckpointStore,
        group_id: impl Into<String>,
        group_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            throttle,
            checkpoints,
            group_id: group_id.into(),
            group_name: group_name.into(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Create the person group unless it already exists
    pub async fn ensure_group_exists(&self) -> Result<(), RegistryError> {
        self.throttle.acquire().await;
        match self
            .service
            .create_group(&self.group_id, &self.group_name)
            .await
        {
            Ok(()) => {
                tracing::info!(group_id = %self.group_id, "Created person group");
                Ok(())
            }
            Err(FaceError::GroupExists) => {
                tracing::debug!(group_id = %self.group_id, "Person group already exists");
                Ok(())
            }
            Err(source) => Err(RegistryError::CreateGroup {
                group_id: self.group_id.clone(),
                source,
            }),
        }
    }

    /// Register `display_name` with the given sample images
    ///
    /// Failed attachments are skipped; enrollment fails only when none
    /// succeeded. No mapping is written unless every step succeeded.
    pub async fn enroll(
        &self,
        display_name: &str,
        images: &[ImageRef],
    ) -> Result<Enrollment, RegistryError> {
        let name = display_name.to_lowercase();

        self.throttle.acquire().await;
        let identity_id = self
            .service
            .create_person(&self.group_id, &name)
            .await
            .map_err(|source| RegistryError::RegisterIdentity {
                name: name.clone(),
                source,
            })?;

        tracing::info!(name = %name, identity_id = %identity_id, "Registered identity");

        let mut faces_attached = 0;
        for image in images {
            self.throttle.acquire().await;
            match self
                .service
                .add_person_face(&self.group_id, &identity_id, &image.link)
                .await
            {
                Ok(()) => faces_attached += 1,
                Err(e) => {
                    tracing::debug!(
                        name = %name,
                        path = %image.path,
                        error = %e,
                        "Skipping sample face"
                    );
                }
            }
        }

        if faces_attached == 0 {
            return Err(RegistryError::NoFacesAttached {
                name,
                attempted: images.len(),
            });
        }

        self.throttle.acquire().await;
        self.service
            .train_group(&self.group_id)
            .await
            .map_err(|source| RegistryError::Training {
                group_id: self.group_id.clone(),
                source,
            })?;

        self.checkpoints
            .set_display_name(&identity_id, &name)
            .await
            .map_err(|source| RegistryError::Persist {
                identity_id: identity_id.clone(),
                source,
            })?;

        tracing::info!(
            name = %name,
            identity_id = %identity_id,
            faces_attached,
            "Enrollment complete"
        );

        Ok(Enrollment {
            identity_id,
            display_name: name,
            faces_attached,
        })
    }

    /// Enroll every person from their training folder
    ///
    /// Group creation failure is fatal. After that, one person's failure is
    /// logged and the next person is attempted.
    pub async fn bootstrap(
        &self,
        walker: &ListingWalker,
        people: &[PersonSource],
    ) -> Result<Vec<(PersonSource, Result<Enrollment, RegistryError>)>, RegistryError> {
        self.ensure_group_exists().await?;

        let mut results = Vec::with_capacity(people.len());
        for person in people {
            let outcome = match self.collect_samples(walker, &person.folder).await {
                Ok(images) => self.enroll(&person.display_name, &images).await,
                Err(e) => Err(e),
            };

            if let Err(e) = &outcome {
                tracing::warn!(
                    name = %person.display_name,
                    folder = %person.folder,
                    error = %e,
                    "Enrollment failed, continuing with next person"
                );
            }
            results.push((person.clone(), outcome));
        }

        Ok(results)
    }

    /// Every eligible image of a folder with a temporary link
    async fn collect_samples(
        &self,
        walker: &ListingWalker,
        folder: &str,
    ) -> Result<Vec<ImageRef>, RegistryError> {
        let pages = walker.pages(
            WalkStart::Root {
                path: folder.to_string(),
                page_size: None,
            },
            None,
        );
        pin_mut!(pages);

        let mut images = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page?;
            for (image, link) in walker.resolve_refs(&page.page.items).await {
                match link {
                    Ok(image_ref) => images.push(image_ref),
                    Err(e) => {
                        tracing::debug!(path = %image.path, error = %e, "No link for sample image");
                    }
                }
            }
        }

        Ok(images)
    }
}
