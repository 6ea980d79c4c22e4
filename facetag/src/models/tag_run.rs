//! Tagging run state machine
//!
//! A run progresses Init → Paging → PerItem → Advancing, looping back to
//! Paging until the listing is exhausted, then ends in Done. Aborted and
//! Interrupted are the other terminal states.

use crate::services::enrichment_orchestrator::statistics::RunStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tagging run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// Loading the checkpoint
    Init,
    /// Fetching the next listing page
    Paging,
    /// Recognizing and tagging the images of one page
    PerItem,
    /// Persisting the cursor of a completed page
    Advancing,
    /// Walk completed, watermark advanced
    Done,
    /// Run-level failure, last persisted checkpoint kept
    Aborted,
    /// Stopped on caller request after the in-flight item
    Interrupted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted | RunState::Interrupted)
    }
}

/// Caller-provided run parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Remote folder to walk
    pub root_folder: String,
    /// Listing page size hint
    pub page_size: Option<u32>,
    /// Ignore the watermark and the persisted cursor for this run
    pub reprocess_all: bool,
}

impl RunOptions {
    pub fn new(root_folder: impl Into<String>) -> Self {
        Self {
            root_folder: root_folder.into(),
            page_size: None,
            reprocess_all: false,
        }
    }
}

/// One tagging run (in-memory)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRun {
    pub run_id: Uuid,
    pub state: RunState,
    pub root_folder: String,
    pub reprocess_all: bool,
    pub stats: RunStats,
    /// Watermark stored when the walk completed
    pub watermark: Option<DateTime<Utc>>,
    /// Run-level error for Aborted runs
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TagRun {
    pub fn new(options: &RunOptions) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Init,
            root_folder: options.root_folder.clone(),
            reprocess_all: options.reprocess_all,
            stats: RunStats::default(),
            watermark: None,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_state`, stamping the end time on terminal states
    pub fn transition_to(&mut self, new_state: RunState) {
        tracing::debug!(
            run_id = %self.run_id,
            from = ?self.state,
            to = ?new_state,
            "Run state transition"
        );
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn abort(&mut self, error: String) {
        self.error = Some(error);
        self.transition_to(RunState::Aborted);
    }

    pub fn duration_seconds(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0) as u64
    }
}
