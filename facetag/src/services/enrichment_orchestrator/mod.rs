//! Enrichment orchestrator
//!
//! Drives one tagging run through the [`RunState`] machine:
//!
//! - **Init**: load the checkpoint, or start fresh without a watermark when
//!   the caller asks for a full reprocess
//! - **Paging**: fetch the next page (transient listing failures retried)
//! - **PerItem**: recognize, resolve names, write tags back; any failure is
//!   confined to its image
//! - **Advancing**: persist the page's cursor before the next fetch
//! - **Done**: store the completion watermark and drop the cursor
//!
//! Listing and checkpoint failures end the run in **Aborted** with the last
//! persisted checkpoint untouched. A cancelled token ends it in
//! **Interrupted** once the in-flight item has finished; the current page is
//! not advanced, so the next run re-delivers it.

pub mod statistics;

use crate::db::CheckpointStore;
use crate::error::{PipelineError, Severity};
use crate::models::{RunOptions, RunState, TagRun};
use crate::services::listing_walker::{ListingWalker, WalkError, WalkPage, WalkStart};
use crate::services::recognition_client::RecognitionClient;
use crate::services::tag_writer::{TagWriter, WriteOutcome};
use crate::store::StoreError;
use crate::types::{Cursor, ImageDescriptor, ImageRef};
use crate::utils::{retry_with_backoff, RetryPolicy};
use chrono::{DateTime, Utc};
use facetag_common::events::{EventBus, TagEvent};
use facetag_common::time::{Clock, SystemClock};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use statistics::{ItemFailure, RunStats};

/// Non-error result of one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Tagged {
        names: Vec<String>,
        write: WriteOutcome,
    },
    /// No face detected
    NoFaces,
    /// Faces found but none resolved to an enrolled name
    Unresolved,
}

pub struct EnrichmentOrchestrator {
    walker: ListingWalker,
    recognizer: RecognitionClient,
    writer: TagWriter,
    checkpoints: CheckpointStore,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    listing_retry: RetryPolicy,
    checkpoint_retry: RetryPolicy,
}

impl EnrichmentOrchestrator {
    pub fn new(
        walker: ListingWalker,
        recognizer: RecognitionClient,
        writer: TagWriter,
        checkpoints: CheckpointStore,
        event_bus: EventBus,
    ) -> Self {
        Self {
            walker,
            recognizer,
            writer,
            checkpoints,
            event_bus,
            clock: Arc::new(SystemClock),
            listing_retry: RetryPolicy::listing(),
            checkpoint_retry: RetryPolicy::database_lock(),
        }
    }

    /// Clock used for the completion watermark
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_listing_retry(mut self, policy: RetryPolicy) -> Self {
        self.listing_retry = policy;
        self
    }

    pub fn with_checkpoint_retry(mut self, policy: RetryPolicy) -> Self {
        self.checkpoint_retry = policy;
        self
    }

    /// Execute one run to a terminal state
    ///
    /// Run-level failures are reported through [`TagRun::error`] with the
    /// state set to [`RunState::Aborted`], so the statistics survive.
    pub async fn run(&self, options: RunOptions, cancel: CancellationToken) -> TagRun {
        let mut run = TagRun::new(&options);

        let (mut next, watermark) = match self.init(&options).await {
            Ok(start) => start,
            Err(e) => return self.abort(run, e),
        };

        tracing::info!(
            run_id = %run.run_id,
            root_folder = %options.root_folder,
            reprocess_all = options.reprocess_all,
            resumed = matches!(next, WalkStart::Cursor(_)),
            watermark = ?watermark.map(|w| w.to_rfc3339()),
            "Starting tagging run"
        );

        self.event_bus.emit_lossy(TagEvent::RunStarted {
            run_id: run.run_id,
            root_folder: options.root_folder.clone(),
            watermark,
            resumed: matches!(next, WalkStart::Cursor(_)),
            timestamp: Utc::now(),
        });

        let mut page_number = 0;
        loop {
            if cancel.is_cancelled() {
                return self.interrupt(run);
            }

            run.transition_to(RunState::Paging);
            let page = match self.fetch_page(&next, watermark).await {
                Ok(page) => page,
                Err(e) => return self.abort(run, e),
            };
            page_number += 1;

            run.stats.listed += page.listed;
            run.stats.eligible += page.page.items.len();
            self.event_bus.emit_lossy(TagEvent::PageFetched {
                run_id: run.run_id,
                page_number,
                listed: page.listed,
                eligible: page.page.items.len(),
                has_more: page.page.has_more,
            });

            run.transition_to(RunState::PerItem);
            if !self.process_page(&mut run, &page.page.items, &cancel).await {
                return self.interrupt(run);
            }

            run.transition_to(RunState::Advancing);
            run.stats.pages += 1;

            if page.page.has_more {
                if let Err(e) = self.advance(&page.page.cursor).await {
                    return self.abort(run, e);
                }
                self.event_bus.emit_lossy(TagEvent::CheckpointAdvanced {
                    run_id: run.run_id,
                    page_number,
                });
                tracing::info!(
                    run_id = %run.run_id,
                    page = page_number,
                    progress = %run.stats.display_string(),
                    "Page complete, checkpoint advanced"
                );
                next = WalkStart::Cursor(page.page.cursor);
            } else {
                return match self.complete(self.clock.now()).await {
                    Ok(stored) => self.finish(run, stored),
                    Err(e) => self.abort(run, e),
                };
            }
        }
    }

    /// Starting point and watermark for a run
    async fn init(
        &self,
        options: &RunOptions,
    ) -> Result<(WalkStart, Option<DateTime<Utc>>), PipelineError> {
        let fresh = WalkStart::Root {
            path: options.root_folder.clone(),
            page_size: options.page_size,
        };

        if options.reprocess_all {
            return Ok((fresh, None));
        }

        let checkpoint = retry_with_backoff(
            "load_checkpoint",
            self.checkpoint_retry,
            facetag_common::Error::is_database_locked,
            || self.checkpoints.load(),
        )
        .await
        .map_err(PipelineError::Checkpoint)?;

        let start = match checkpoint.cursor {
            Some(cursor) => WalkStart::Cursor(cursor),
            None => fresh,
        };
        Ok((start, checkpoint.last_modified_watermark))
    }

    async fn fetch_page(
        &self,
        start: &WalkStart,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<WalkPage, PipelineError> {
        retry_with_backoff("list_page", self.listing_retry, WalkError::is_transient, || {
            self.walker.fetch(start, watermark)
        })
        .await
        .map_err(PipelineError::Listing)
    }

    /// Process every image of a page in listing order
    ///
    /// Returns false if cancellation stopped the page early.
    async fn process_page(
        &self,
        run: &mut TagRun,
        items: &[ImageDescriptor],
        cancel: &CancellationToken,
    ) -> bool {
        let resolved = self.walker.resolve_refs(items).await;

        for (image, link) in resolved {
            if cancel.is_cancelled() {
                return false;
            }

            match self.process_item(&image, link).await {
                Ok(outcome) => self.record_outcome(run, &image.path, outcome),
                Err(e) => self.dispatch(run, &image.path, e),
            }
            run.stats.processed += 1;
        }

        true
    }

    /// Recognize, resolve and write back one image
    pub async fn process_item(
        &self,
        image: &ImageDescriptor,
        link: Result<ImageRef, StoreError>,
    ) -> Result<ItemOutcome, PipelineError> {
        let image_ref = link.map_err(|source| PipelineError::Link {
            path: image.path.clone(),
            source,
        })?;

        let result = self
            .recognizer
            .identify(&image_ref)
            .await
            .map_err(|source| PipelineError::Recognition {
                path: image.path.clone(),
                source,
            })?;

        if result.is_empty() {
            return Ok(ItemOutcome::NoFaces);
        }

        let mut names: Vec<String> = Vec::new();
        for identity_id in result.identities {
            let name = self
                .checkpoints
                .display_name(&identity_id)
                .await
                .map_err(|source| PipelineError::NameLookup {
                    path: image.path.clone(),
                    source,
                })?;

            match name {
                Some(name) if !names.contains(&name) => names.push(name),
                Some(_) => {}
                None => {
                    let skipped = PipelineError::UnknownIdentity {
                        path: image.path.clone(),
                        identity_id,
                    };
                    tracing::debug!(severity = ?skipped.severity(), error = %skipped, "Skipping identity");
                }
            }
        }

        if names.is_empty() {
            return Ok(ItemOutcome::Unresolved);
        }

        let write = self.writer.write_tags(&image.path, &names).await?;
        Ok(ItemOutcome::Tagged { names, write })
    }

    fn record_outcome(&self, run: &mut TagRun, path: &str, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Tagged { names, write } => {
                tracing::info!(path = %path, names = ?names, write = ?write, "Tagged image");
                run.stats.tagged += 1;
                self.event_bus.emit_lossy(TagEvent::ItemTagged {
                    run_id: run.run_id,
                    path: path.to_string(),
                    names,
                });
            }
            ItemOutcome::NoFaces => {
                tracing::debug!(path = %path, "No faces");
                run.stats.no_faces += 1;
            }
            ItemOutcome::Unresolved => {
                tracing::debug!(path = %path, "No enrolled identity recognized");
                run.stats.unresolved += 1;
            }
        }
    }

    /// Route a per-item failure by severity
    fn dispatch(&self, run: &mut TagRun, path: &str, error: PipelineError) {
        match error.severity() {
            Severity::Ignorable => {
                tracing::debug!(path = %path, error = %error, "Ignoring");
            }
            Severity::FatalToItem | Severity::FatalToRun => {
                if error.is_rate_limited() {
                    tracing::warn!(path = %path, "Face API quota exceeded, consider a longer throttle interval");
                }
                tracing::warn!(path = %path, error = %error, "Skipping image");
                run.stats.record_failure(path, error.to_string());
                self.event_bus.emit_lossy(TagEvent::ItemFailed {
                    run_id: run.run_id,
                    path: path.to_string(),
                    error: error.to_string(),
                });
            }
        }
    }

    async fn advance(&self, cursor: &Cursor) -> Result<(), PipelineError> {
        retry_with_backoff(
            "save_cursor",
            self.checkpoint_retry,
            facetag_common::Error::is_database_locked,
            || self.checkpoints.save_cursor(cursor),
        )
        .await
        .map_err(PipelineError::Checkpoint)
    }

    async fn complete(&self, watermark: DateTime<Utc>) -> Result<DateTime<Utc>, PipelineError> {
        retry_with_backoff(
            "complete_walk",
            self.checkpoint_retry,
            facetag_common::Error::is_database_locked,
            || self.checkpoints.complete_walk(watermark),
        )
        .await
        .map_err(PipelineError::Checkpoint)
    }

    fn finish(&self, mut run: TagRun, watermark: DateTime<Utc>) -> TagRun {
        run.watermark = Some(watermark);
        run.transition_to(RunState::Done);

        tracing::info!(
            run_id = %run.run_id,
            watermark = %watermark.to_rfc3339(),
            summary = %run.stats.summary(),
            "Tagging run complete"
        );

        self.event_bus.emit_lossy(TagEvent::RunCompleted {
            run_id: run.run_id,
            processed: run.stats.processed,
            tagged: run.stats.tagged,
            failed: run.stats.failed,
            watermark,
            duration_seconds: run.duration_seconds(),
        });
        run
    }

    fn abort(&self, mut run: TagRun, error: PipelineError) -> TagRun {
        tracing::error!(
            run_id = %run.run_id,
            state = ?run.state,
            error = %error,
            "Tagging run aborted, checkpoint left at last completed page"
        );

        run.abort(error.to_string());
        self.event_bus.emit_lossy(TagEvent::RunAborted {
            run_id: run.run_id,
            processed: run.stats.processed,
            error: error.to_string(),
        });
        run
    }

    fn interrupt(&self, mut run: TagRun) -> TagRun {
        tracing::info!(
            run_id = %run.run_id,
            progress = %run.stats.display_string(),
            "Tagging run interrupted, checkpoint left at last completed page"
        );

        run.transition_to(RunState::Interrupted);
        self.event_bus.emit_lossy(TagEvent::RunInterrupted {
            run_id: run.run_id,
            processed: run.stats.processed,
        });
        run
    }
}
