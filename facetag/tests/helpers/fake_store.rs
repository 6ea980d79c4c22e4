//! In-memory remote store
//!
//! Folders hold scripted listing pages. Cursors are `"<folder>#<page>"`;
//! only this fake creates or parses them, like a real store adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use facetag::store::{RemoteStore, StoreError};
use facetag::types::{
    Cursor, FileEntry, Page, PropertyField, PropertyQuery, SearchPage, TemplateId, TemplateSpec,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Temporary link the fake issues for `path`
pub fn link_for(path: &str) -> String {
    format!("https://dl.test{}", path)
}

pub fn entry(path: &str, last_modified: DateTime<Utc>) -> FileEntry {
    FileEntry {
        path: path.to_string(),
        last_modified,
        size_bytes: 2048,
    }
}

fn not_found(path: &str) -> StoreError {
    StoreError::Api {
        status: 409,
        tag: Some("path".to_string()),
        summary: format!("path/not_found/ {}", path),
    }
}

#[derive(Default)]
pub struct FakeRemoteStore {
    folders: Mutex<HashMap<String, Vec<Vec<FileEntry>>>>,
    /// Errors returned, in order, by calls for (folder, page)
    listing_failures: Mutex<HashMap<(String, usize), VecDeque<StoreError>>>,
    broken_links: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    properties: Mutex<HashMap<String, Vec<PropertyField>>>,
    search_pages: Mutex<Vec<SearchPage>>,
    search_queries: Mutex<Vec<PropertyQuery>>,
    calls: Mutex<Vec<String>>,
    templates_created: AtomicUsize,
    add_calls: AtomicUsize,
    overwrite_calls: AtomicUsize,
}

impl FakeRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the listing pages of a folder
    pub fn with_folder(self, folder: &str, pages: Vec<Vec<FileEntry>>) -> Self {
        self.set_folder(folder, pages);
        self
    }

    /// Replace the listing pages of a folder
    pub fn set_folder(&self, folder: &str, pages: Vec<Vec<FileEntry>>) {
        self.folders
            .lock()
            .unwrap()
            .insert(folder.to_string(), pages);
    }

    /// Make the next calls for `(folder, page)` fail with `errors`, in order
    pub fn fail_page(&self, folder: &str, page: usize, errors: Vec<StoreError>) {
        self.listing_failures
            .lock()
            .unwrap()
            .insert((folder.to_string(), page), errors.into());
    }

    pub fn break_link(&self, path: &str) {
        self.broken_links.lock().unwrap().insert(path.to_string());
    }

    pub fn fail_writes_for(&self, path: &str) {
        self.failing_writes.lock().unwrap().insert(path.to_string());
    }

    /// Script search results; page `i` continues with cursor `s<i+1>`
    pub fn set_search_pages(&self, pages: Vec<SearchPage>) {
        *self.search_pages.lock().unwrap() = pages;
    }

    pub fn cursor_for(folder: &str, page: usize) -> Cursor {
        Cursor::new(format!("{}#{}", folder, page))
    }

    pub fn properties_of(&self, path: &str) -> Option<Vec<PropertyField>> {
        self.properties.lock().unwrap().get(path).cloned()
    }

    pub fn tagged_paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.properties.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn search_queries(&self) -> Vec<PropertyQuery> {
        self.search_queries.lock().unwrap().clone()
    }

    pub fn templates_created(&self) -> usize {
        self.templates_created.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn overwrite_calls(&self) -> usize {
        self.overwrite_calls.load(Ordering::SeqCst)
    }

    fn page(&self, folder: &str, index: usize) -> Result<Page<FileEntry>, StoreError> {
        if let Some(errors) = self
            .listing_failures
            .lock()
            .unwrap()
            .get_mut(&(folder.to_string(), index))
        {
            if let Some(err) = errors.pop_front() {
                return Err(err);
            }
        }

        let folders = self.folders.lock().unwrap();
        let pages = folders.get(folder).ok_or_else(|| not_found(folder))?;
        let items = pages.get(index).cloned().unwrap_or_default();

        Ok(Page {
            items,
            cursor: Self::cursor_for(folder, index + 1),
            has_more: index + 1 < pages.len(),
        })
    }
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn list_folder(&self, path: &str, _limit: Option<u32>) -> Result<Page<FileEntry>, StoreError> {
        self.calls.lock().unwrap().push(format!("list:{}", path));
        self.page(path, 0)
    }

    async fn list_folder_continue(&self, cursor: &Cursor) -> Result<Page<FileEntry>, StoreError> {
        self.calls.lock().unwrap().push(format!("continue:{}", cursor));
        let (folder, index) = cursor
            .as_str()
            .rsplit_once('#')
            .and_then(|(folder, index)| index.parse::<usize>().ok().map(|i| (folder, i)))
            .ok_or_else(|| StoreError::Api {
                status: 409,
                tag: Some("reset".to_string()),
                summary: "reset/".to_string(),
            })?;
        self.page(folder, index)
    }

    async fn temporary_link(&self, path: &str) -> Result<String, StoreError> {
        if self.broken_links.lock().unwrap().contains(path) {
            return Err(not_found(path));
        }
        Ok(link_for(path))
    }

    async fn add_template(&self, _template: &TemplateSpec) -> Result<TemplateId, StoreError> {
        let n = self.templates_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TemplateId::new(format!("ptid:{}", n)))
    }

    async fn add_properties(
        &self,
        path: &str,
        _template_id: &TemplateId,
        fields: &[PropertyField],
    ) -> Result<(), StoreError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_writes.lock().unwrap().contains(path) {
            return Err(not_found(path));
        }

        let mut properties = self.properties.lock().unwrap();
        if properties.contains_key(path) {
            return Err(StoreError::PropertyGroupAlreadyExists);
        }
        properties.insert(path.to_string(), fields.to_vec());
        Ok(())
    }

    async fn overwrite_properties(
        &self,
        path: &str,
        _template_id: &TemplateId,
        fields: &[PropertyField],
    ) -> Result<(), StoreError> {
        self.overwrite_calls.fetch_add(1, Ordering::SeqCst);
        let mut properties = self.properties.lock().unwrap();
        match properties.get_mut(path) {
            Some(existing) => {
                *existing = fields.to_vec();
                Ok(())
            }
            None => Err(not_found(path)),
        }
    }

    async fn search_properties(&self, query: &PropertyQuery) -> Result<SearchPage, StoreError> {
        self.search_queries.lock().unwrap().push(query.clone());
        Ok(self
            .search_pages
            .lock()
            .unwrap()
            .first()
            .cloned()
            .unwrap_or(SearchPage {
                matches: Vec::new(),
                cursor: None,
            }))
    }

    async fn search_properties_continue(&self, cursor: &Cursor) -> Result<SearchPage, StoreError> {
        let index = cursor
            .as_str()
            .strip_prefix('s')
            .and_then(|i| i.parse::<usize>().ok())
            .ok_or_else(|| StoreError::Parse(format!("unknown search cursor {}", cursor)))?;
        self.search_pages
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or_else(|| StoreError::Parse(format!("no search page {}", index)))
    }
}
