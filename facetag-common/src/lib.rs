//! # facetag common library
//!
//! Shared code for the facetag workspace:
//! - Error type used by the checkpoint store and configuration
//! - Bootstrap TOML configuration and root folder resolution
//! - Run event types and the broadcast event bus
//! - Clock abstraction for timestamps

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
