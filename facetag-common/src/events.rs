//! Event types for facetag runs
//!
//! Provides the run event definitions and the EventBus used to observe a
//! tagging run from the CLI or any other collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Run lifecycle and per-item events
///
/// Every per-item event carries the image path so no outcome is anonymous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TagEvent {
    /// A tagging run started
    RunStarted {
        run_id: Uuid,
        root_folder: String,
        /// Watermark gating this run, None for full re-walks
        watermark: Option<DateTime<Utc>>,
        /// True when resuming from a persisted cursor
        resumed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A listing page was fetched and filtered
    PageFetched {
        run_id: Uuid,
        page_number: usize,
        listed: usize,
        eligible: usize,
        has_more: bool,
    },

    /// Tags written for one image
    ItemTagged {
        run_id: Uuid,
        path: String,
        names: Vec<String>,
    },

    /// An image was skipped because of a failure
    ItemFailed {
        run_id: Uuid,
        path: String,
        error: String,
    },

    /// The cursor of a completed page was persisted
    CheckpointAdvanced { run_id: Uuid, page_number: usize },

    /// Run finished the walk and advanced the watermark
    RunCompleted {
        run_id: Uuid,
        processed: usize,
        tagged: usize,
        failed: usize,
        watermark: DateTime<Utc>,
        duration_seconds: u64,
    },

    /// Run stopped on a run-level failure
    RunAborted {
        run_id: Uuid,
        processed: usize,
        error: String,
    },

    /// Run stopped on caller request
    RunInterrupted { run_id: Uuid, processed: usize },
}

impl TagEvent {
    /// Run this event belongs to
    pub fn run_id(&self) -> Uuid {
        match self {
            TagEvent::RunStarted { run_id, .. }
            | TagEvent::PageFetched { run_id, .. }
            | TagEvent::ItemTagged { run_id, .. }
            | TagEvent::ItemFailed { run_id, .. }
            | TagEvent::CheckpointAdvanced { run_id, .. }
            | TagEvent::RunCompleted { run_id, .. }
            | TagEvent::RunAborted { run_id, .. }
            | TagEvent::RunInterrupted { run_id, .. } => *run_id,
        }
    }
}

/// Broadcast channel for [`TagEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TagEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TagEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: TagEvent) -> Result<usize, broadcast::error::SendError<TagEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TagEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
