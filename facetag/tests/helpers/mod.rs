//! Test Helper Utilities
//!
//! Shared fakes and fixtures for facetag integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fake_face;
pub mod fake_store;

pub use db_utils::{create_test_checkpoints, create_test_db};
pub use fake_face::FakeFaceService;
pub use fake_store::{entry, link_for, FakeRemoteStore};

use facetag::db::CheckpointStore;
use facetag::services::{
    EnrichmentOrchestrator, ListingWalker, RecognitionClient, TagWriter, Throttle,
};
use facetag::utils::RetryPolicy;
use facetag_common::events::EventBus;
use facetag_common::time::Clock;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_GROUP_ID: &str = "test-group";

/// Retry policy with millisecond backoff
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    }
}

/// Orchestrator wired to fakes, unthrottled
pub fn create_test_orchestrator(
    store: Arc<FakeRemoteStore>,
    face: Arc<FakeFaceService>,
    checkpoints: CheckpointStore,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
) -> EnrichmentOrchestrator {
    let walker = ListingWalker::new(store.clone());
    let recognizer = RecognitionClient::new(face, Arc::new(Throttle::unthrottled()), TEST_GROUP_ID);
    let writer = TagWriter::new(store, checkpoints.clone());

    EnrichmentOrchestrator::new(walker, recognizer, writer, checkpoints, event_bus)
        .with_clock(clock)
        .with_listing_retry(fast_retry(3))
        .with_checkpoint_retry(fast_retry(3))
}
