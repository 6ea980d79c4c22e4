//! Pipeline components
//!
//! Leaves first: the throttle, listing walker and recognition client have no
//! dependency on each other. The identity registry and tag writer sit on top
//! of the checkpoint store, and the enrichment orchestrator sequences them all.

pub mod browse;
pub mod enrichment_orchestrator;
pub mod identity_registry;
pub mod listing_walker;
pub mod rate_limiter;
pub mod recognition_client;
pub mod tag_writer;

pub use browse::{Browser, GalleryPage, SearchResults};
pub use enrichment_orchestrator::{EnrichmentOrchestrator, ItemOutcome, RunStats};
pub use identity_registry::{Enrollment, IdentityRegistry, PersonSource, RegistryError};
pub use listing_walker::{ListingWalker, WalkError, WalkPage, WalkStart};
pub use rate_limiter::Throttle;
pub use recognition_client::{RecognitionClient, RecognitionError};
pub use tag_writer::{TagWriter, WriteError, WriteOutcome};
