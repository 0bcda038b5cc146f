//! # System Module
//!
//! Occurrence counters and summary statistics kept by every writer.
//!
//! Counting is pure bookkeeping: it never gates a write and never touches
//! the filesystem. The NetworkX writer serializes a snapshot into its
//! metadata file; the CLI prints one after a run.

mod stats;

pub use stats::*;
