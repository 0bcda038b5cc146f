//! # Record Files
//!
//! Two encodings are accepted, told apart by the first non-blank byte:
//! - a JSON array of records (`[ {...}, {...} ]`)
//! - JSON lines, one record per line (blank lines ignored)
//!
//! Every record carries `"kind": "vertex"` or `"kind": "edge"`.
//!
//! ## Limits
//!
//! Input larger than `MAX_RECORD_FILE_SIZE` is rejected before any parsing.

use crate::primitives::MAX_RECORD_FILE_SIZE;
use crate::{GraphSinkError, Record};

/// Encoding of a record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFileFormat {
    JsonArray,
    JsonLines,
}

/// Detect the encoding from the first non-whitespace byte.
pub fn detect_format(bytes: &[u8]) -> RecordFileFormat {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'[') => RecordFileFormat::JsonArray,
        _ => RecordFileFormat::JsonLines,
    }
}

/// Decode a record file.
///
/// This is a pure transformation - no file I/O.
pub fn records_from_bytes(bytes: &[u8]) -> Result<Vec<Record>, GraphSinkError> {
    if bytes.len() > MAX_RECORD_FILE_SIZE {
        return Err(GraphSinkError::Serialization(format!(
            "Record data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_FILE_SIZE
        )));
    }

    match detect_format(bytes) {
        RecordFileFormat::JsonArray => serde_json::from_slice(bytes)
            .map_err(|e| GraphSinkError::Serialization(format!("Invalid record array: {e}"))),
        RecordFileFormat::JsonLines => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| GraphSinkError::Serialization(format!("Record file is not UTF-8: {e}")))?;
            let mut records = Vec::new();
            for (index, line) in text.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let record = serde_json::from_str(line).map_err(|e| {
                    GraphSinkError::Serialization(format!("line {}: {e}", index + 1))
                })?;
                records.push(record);
            }
            Ok(records)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
