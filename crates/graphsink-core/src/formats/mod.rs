//! # Formats Module
//!
//! Decoding of record files handed to graphsink by the upstream loader.
//!
//! File I/O lives in the app layer; everything here works on bytes.

mod records;

pub use records::{RecordFileFormat, detect_format, records_from_bytes};
