//! Gallery and search primitives
//!
//! Read-only pass-throughs for UI and script collaborators. Callers keep
//! their own cursors; nothing here touches the checkpoint space.

use crate::services::listing_walker::{ListingWalker, WalkError, WalkPage};
use crate::services::tag_writer::field_names;
use crate::store::{RemoteStore, StoreError};
use crate::types::{Cursor, ImageRef, PropertyQuery, SearchPage};
use std::sync::Arc;

/// One page of browsable images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryPage {
    /// Images whose temporary link resolved, in listing order
    pub images: Vec<ImageRef>,
    pub cursor: Cursor,
    pub has_more: bool,
}

/// One page of search hits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub images: Vec<ImageRef>,
    /// None when there are no more results
    pub cursor: Option<Cursor>,
}

pub struct Browser {
    store: Arc<dyn RemoteStore>,
    walker: ListingWalker,
}

impl Browser {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let walker = ListingWalker::new(Arc::clone(&store));
        Self { store, walker }
    }

    /// First page of a folder; no watermark applies
    pub async fn first_page(
        &self,
        folder: &str,
        page_size: Option<u32>,
    ) -> Result<GalleryPage, WalkError> {
        let page = self.walker.list_from(folder, page_size, None).await?;
        Ok(self.into_gallery(page).await)
    }

    pub async fn next_page(&self, cursor: &Cursor) -> Result<GalleryPage, WalkError> {
        let page = self.walker.continue_from(cursor, None).await?;
        Ok(self.into_gallery(page).await)
    }

    async fn into_gallery(&self, page: WalkPage) -> GalleryPage {
        let paths: Vec<String> = page.page.items.into_iter().map(|i| i.path).collect();
        GalleryPage {
            images: self.links(&paths).await,
            cursor: page.page.cursor,
            has_more: page.page.has_more,
        }
    }

    /// Images tagged with `name` in any person field
    pub async fn search(&self, name: &str) -> Result<SearchResults, StoreError> {
        let query = PropertyQuery {
            query: name.to_lowercase(),
            field_names: field_names(),
        };
        let page = self.store.search_properties(&query).await?;
        Ok(self.into_results(page).await)
    }

    pub async fn search_continue(&self, cursor: &Cursor) -> Result<SearchResults, StoreError> {
        let page = self.store.search_properties_continue(cursor).await?;
        Ok(self.into_results(page).await)
    }

    async fn into_results(&self, page: SearchPage) -> SearchResults {
        let paths: Vec<String> = page
            .matches
            .into_iter()
            .filter(|m| !m.is_deleted)
            .map(|m| m.path)
            .collect();

        SearchResults {
            images: self.links(&paths).await,
            cursor: page.cursor,
        }
    }

    async fn links(&self, paths: &[String]) -> Vec<ImageRef> {
        let links = self.walker.temporary_links(paths).await;
        paths
            .iter()
            .zip(links)
            .filter_map(|(path, link)| match link {
                Ok(link) => Some(ImageRef {
                    path: path.clone(),
                    link,
                }),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "No temporary link, skipping image");
                    None
                }
            })
            .collect()
    }
}
