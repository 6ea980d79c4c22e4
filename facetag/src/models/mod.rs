//! Data models for facetag runs

pub mod tag_run;

pub use tag_run::{RunOptions, RunState, TagRun};
