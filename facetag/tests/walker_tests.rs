//! Integration tests for the listing walker

mod helpers;

use chrono::{DateTime, Duration, TimeZone, Utc};
use facetag::services::{ListingWalker, WalkError, WalkStart};
use facetag::store::StoreError;
use futures::TryStreamExt;
use helpers::{entry, link_for, FakeRemoteStore};
use std::sync::Arc;

fn t() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn paths(page: &facetag::services::WalkPage) -> Vec<&str> {
    page.page.items.iter().map(|i| i.path.as_str()).collect()
}

#[tokio::test]
async fn test_eligible_images_keep_listing_order() {
    let store = Arc::new(FakeRemoteStore::new().with_folder(
        "/p",
        vec![vec![entry("/p/a.jpg", t()), entry("/p/b.txt", t()), entry("/p/c.png", t())]],
    ));
    let walker = ListingWalker::new(store);

    let page = walker.list_from("/p", Some(100), None).await.unwrap();

    assert_eq!(paths(&page), vec!["/p/a.jpg", "/p/c.png"]);
    assert_eq!(page.listed, 3);
    assert!(!page.page.has_more);
}

#[tokio::test]
async fn test_watermark_filter() {
    let store = Arc::new(FakeRemoteStore::new().with_folder(
        "/p",
        vec![vec![
            entry("/p/before.jpg", t() - Duration::seconds(1)),
            entry("/p/at.jpg", t()),
            entry("/p/after.png", t() + Duration::seconds(1)),
            entry("/p/after.txt", t() + Duration::seconds(1)),
        ]],
    ));
    let walker = ListingWalker::new(store);

    let incremental = walker.list_from("/p", None, Some(t())).await.unwrap();
    assert_eq!(paths(&incremental), vec!["/p/at.jpg", "/p/after.png"]);

    let full = walker.list_from("/p", None, None).await.unwrap();
    assert_eq!(paths(&full), vec!["/p/before.jpg", "/p/at.jpg", "/p/after.png"]);
}

#[tokio::test]
async fn test_pages_stream_follows_cursors() {
    let store = Arc::new(FakeRemoteStore::new().with_folder(
        "/p",
        vec![
            vec![entry("/p/1.jpg", t())],
            vec![],
            vec![entry("/p/2.gif", t()), entry("/p/3.JPEG", t())],
        ],
    ));
    let walker = ListingWalker::new(store.clone());

    let pages: Vec<_> = walker
        .pages(
            WalkStart::Root {
                path: "/p".to_string(),
                page_size: None,
            },
            None,
        )
        .try_collect()
        .await
        .unwrap();

    assert_eq!(pages.len(), 3);
    assert!(pages[1].page.items.is_empty());
    assert!(pages[1].page.has_more);
    assert_eq!(paths(&pages[2]), vec!["/p/2.gif", "/p/3.jpeg"]);
    assert_eq!(
        store.calls(),
        vec!["list:/p", "continue:/p#1", "continue:/p#2"]
    );
}

#[tokio::test]
async fn test_errors_carry_cursor() {
    let store = Arc::new(FakeRemoteStore::new().with_folder("/p", vec![vec![], vec![]]));
    store.fail_page("/p", 1, vec![StoreError::Network("reset".into())]);
    let walker = ListingWalker::new(store);

    let cursor = FakeRemoteStore::cursor_for("/p", 1);
    let err = walker.continue_from(&cursor, None).await.unwrap_err();

    assert!(matches!(err, WalkError::Continue { cursor: ref c, .. } if *c == cursor));
    assert!(err.is_transient());
    assert!(err.to_string().contains("/p#1"));
}

#[tokio::test]
async fn test_links_are_index_aligned() {
    let store = Arc::new(FakeRemoteStore::new());
    store.break_link("/p/2.jpg");
    let walker = ListingWalker::new(store);

    let requested = vec![
        "/p/1.jpg".to_string(),
        "/p/2.jpg".to_string(),
        "/p/3.jpg".to_string(),
    ];
    let links = walker.temporary_links(&requested).await;

    assert_eq!(links.len(), 3);
    assert_eq!(links[0].as_ref().unwrap(), &link_for("/p/1.jpg"));
    assert!(links[1].is_err());
    assert_eq!(links[2].as_ref().unwrap(), &link_for("/p/3.jpg"));
}
