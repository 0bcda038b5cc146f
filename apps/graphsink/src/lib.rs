//! # graphsink
//!
//! Library half of the graphsink binary: argument parsing and the command
//! implementations, exposed so integration tests can drive them directly.

pub mod cli;
