//! facetag library interface
//!
//! Incremental face tagging for a remote photo store. Exposed as a library
//! so integration tests can drive the pipeline with fake collaborators.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod recognition;
pub mod services;
pub mod store;
pub mod types;
pub mod utils;

pub use crate::error::{PipelineError, Severity};
