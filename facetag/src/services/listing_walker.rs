//! Remote listing walker
//!
//! Turns raw folder listings into pages of eligible images. Eligibility is
//! an image extension allow-list (case-insensitive) plus, when a watermark
//! is given, `last_modified >= watermark`. The returned cursor and
//! `has_more` always come from the unfiltered page, so pagination does not
//! depend on how many entries survived the filter.
//!
//! The walker never retries; that is the orchestrator's call.

use crate::store::{RemoteStore, StoreError};
use crate::types::{Cursor, FileEntry, ImageDescriptor, ImageRef, Page};
use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::Stream;
use std::sync::Arc;
use thiserror::Error;

/// Image extensions eligible for tagging
pub const IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "tiff", "png"];

/// Listing errors, carrying the offending path or cursor
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Listing {path} failed: {source}")]
    List {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Continuing listing from cursor {cursor} failed: {source}")]
    Continue {
        cursor: Cursor,
        #[source]
        source: StoreError,
    },
}

impl WalkError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            WalkError::List { source, .. } | WalkError::Continue { source, .. } => source,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.store_error().is_transient()
    }
}

/// Page of eligible images plus the raw listing size
#[derive(Debug, Clone, PartialEq)]
pub struct WalkPage {
    pub page: Page<ImageDescriptor>,
    /// Number of file entries before filtering
    pub listed: usize,
}

/// Where a walk starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkStart {
    /// Fresh walk of a folder
    Root { path: String, page_size: Option<u32> },
    /// Resume from a persisted cursor
    Cursor(Cursor),
}

/// True if the path ends in an allow-listed image extension
pub fn is_image_path(path: &str) -> bool {
    match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => IMAGE_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        _ => false,
    }
}

/// Keep eligible entries in listing order
pub fn filter_entries(
    entries: Vec<FileEntry>,
    watermark: Option<DateTime<Utc>>,
) -> Vec<ImageDescriptor> {
    entries
        .into_iter()
        .filter(|entry| is_image_path(&entry.path))
        .filter(|entry| watermark.map_or(true, |w| entry.last_modified >= w))
        .map(|entry| ImageDescriptor {
            path: entry.path.to_lowercase(),
            last_modified: entry.last_modified,
            size_bytes: entry.size_bytes,
        })
        .collect()
}

fn into_walk_page(raw: Page<FileEntry>, watermark: Option<DateTime<Utc>>) -> WalkPage {
    let listed = raw.items.len();
    WalkPage {
        page: Page {
            items: filter_entries(raw.items, watermark),
            cursor: raw.cursor,
            has_more: raw.has_more,
        },
        listed,
    }
}

/// Paginated, filtered view over the remote store
#[derive(Clone)]
pub struct ListingWalker {
    store: Arc<dyn RemoteStore>,
}

impl ListingWalker {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// First page of a folder
    pub async fn list_from(
        &self,
        root_path: &str,
        page_size_hint: Option<u32>,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<WalkPage, WalkError> {
        let raw = self
            .store
            .list_folder(root_path, page_size_hint)
            .await
            .map_err(|source| WalkError::List {
                path: root_path.to_string(),
                source,
            })?;

        let page = into_walk_page(raw, watermark);
        tracing::debug!(
            path = %root_path,
            listed = page.listed,
            eligible = page.page.items.len(),
            has_more = page.page.has_more,
            "Listed folder"
        );
        Ok(page)
    }

    /// Next page after `cursor`
    pub async fn continue_from(
        &self,
        cursor: &Cursor,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<WalkPage, WalkError> {
        let raw = self
            .store
            .list_folder_continue(cursor)
            .await
            .map_err(|source| WalkError::Continue {
                cursor: cursor.clone(),
                source,
            })?;

        let page = into_walk_page(raw, watermark);
        tracing::debug!(
            listed = page.listed,
            eligible = page.page.items.len(),
            has_more = page.page.has_more,
            "Continued listing"
        );
        Ok(page)
    }

    /// Fetch one page from either a root or a cursor
    pub async fn fetch(
        &self,
        start: &WalkStart,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<WalkPage, WalkError> {
        match start {
            WalkStart::Root { path, page_size } => self.list_from(path, *page_size, watermark).await,
            WalkStart::Cursor(cursor) => self.continue_from(cursor, watermark).await,
        }
    }

    /// Lazy sequence of pages until `has_more` is false
    ///
    /// The next page is requested only when the stream is polled again.
    pub fn pages(
        &self,
        start: WalkStart,
        watermark: Option<DateTime<Utc>>,
    ) -> impl Stream<Item = Result<WalkPage, WalkError>> + Send + 'static {
        let walker = self.clone();
        try_stream! {
            let mut next = start;
            loop {
                let page = walker.fetch(&next, watermark).await?;
                let has_more = page.page.has_more;
                next = WalkStart::Cursor(page.page.cursor.clone());
                yield page;
                if !has_more {
                    break;
                }
            }
        }
    }

    /// Temporary links for `paths`, requested concurrently
    ///
    /// Results are index-aligned with `paths`, regardless of completion order.
    pub async fn temporary_links(&self, paths: &[String]) -> Vec<Result<String, StoreError>> {
        join_all(paths.iter().map(|path| self.store.temporary_link(path))).await
    }

    /// Pair each descriptor with a temporary link, keeping failures per item
    pub async fn resolve_refs(
        &self,
        images: &[ImageDescriptor],
    ) -> Vec<(ImageDescriptor, Result<ImageRef, StoreError>)> {
        let paths: Vec<String> = images.iter().map(|i| i.path.clone()).collect();
        let links = self.temporary_links(&paths).await;

        images
            .iter()
            .cloned()
            .zip(links)
            .map(|(image, link)| {
                let image_ref = link.map(|link| ImageRef {
                    path: image.path.clone(),
                    link,
                });
                (image, image_ref)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry(path: &str, modified: DateTime<Utc>) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            last_modified: modified,
            size_bytes: 1024,
        }
    }

    #[test]
    fn test_image_extension_allow_list() {
        assert!(is_image_path("/photos/a.jpg"));
        assert!(is_image_path("/photos/a.JPEG"));
        assert!(is_image_path("/photos/scan.Tiff"));
        assert!(is_image_path("/photos/anim.gif"));
        assert!(is_image_path("/photos/c.png"));
        assert!(!is_image_path("/photos/b.txt"));
        assert!(!is_image_path("/photos/raw.cr2"));
        assert!(!is_image_path("/photos/jpg"));
        assert!(!is_image_path("/photos.jpg/readme"));
        assert!(!is_image_path("/photos/archive.jpg.zip"));
    }

    #[test]
    fn test_filter_keeps_listing_order() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entries = vec![
            entry("/p/a.jpg", t),
            entry("/p/b.txt", t),
            entry("/p/c.png", t),
        ];

        let paths: Vec<_> = filter_entries(entries, None)
            .into_iter()
            .map(|d| d.path)
            .collect();
        assert_eq!(paths, vec!["/p/a.jpg", "/p/c.png"]);
    }

    #[test]
    fn test_watermark_boundary_is_inclusive() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entries = vec![
            entry("/p/before.jpg", t - Duration::seconds(1)),
            entry("/p/at.jpg", t),
            entry("/p/after.jpg", t + Duration::seconds(1)),
            entry("/p/notes.txt", t + Duration::seconds(1)),
        ];

        let incremental: Vec<_> = filter_entries(entries.clone(), Some(t))
            .into_iter()
            .map(|d| d.path)
            .collect();
        assert_eq!(incremental, vec!["/p/at.jpg", "/p/after.jpg"]);

        let full: Vec<_> = filter_entries(entries, None)
            .into_iter()
            .map(|d| d.path)
            .collect();
        assert_eq!(full, vec!["/p/before.jpg", "/p/at.jpg", "/p/after.jpg"]);
    }

    #[test]
    fn test_paths_are_lowercased() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let images = filter_entries(vec![entry("/Photos/IMG_01.JPG", t)], None);
        assert_eq!(images[0].path, "/photos/img_01.jpg");
    }

    #[test]
    fn test_walk_page_keeps_unfiltered_pagination_state() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let raw = Page {
            items: vec![entry("/p/notes.txt", t)],
            cursor: Cursor::new("next"),
            has_more: true,
        };

        let page = into_walk_page(raw, None);
        assert!(page.page.items.is_empty());
        assert_eq!(page.listed, 1);
        assert_eq!(page.page.cursor, Cursor::new("next"));
        assert!(page.page.has_more);
    }
}
