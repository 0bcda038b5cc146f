//! # Output Manifest
//!
//! Inventory of a job's output directory: every file graphsink produces,
//! classified by role, with its size and (with the `crypto-hash` feature)
//! a BLAKE3 digest of its content.
//!
//! Entries are sorted by file name so two scans of the same directory
//! serialize identically.

use crate::GraphSinkError;
use crate::primitives::{
    METTA_EXTENSION, NETWORKX_METADATA, NETWORKX_SNAPSHOT, NETWORKX_TEMP_JSON,
    TENANT_CLEANUP_SCRIPT,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Role of one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRole {
    Metta,
    NodeCsv,
    NodeScript,
    EdgeCsv,
    EdgeScript,
    CleanupScript,
    Snapshot,
    Metadata,
    Intermediate,
    Other,
}

impl OutputRole {
    /// Classify a file by name.
    pub fn classify(name: &str) -> Self {
        match name {
            TENANT_CLEANUP_SCRIPT => return Self::CleanupScript,
            NETWORKX_SNAPSHOT => return Self::Snapshot,
            NETWORKX_METADATA => return Self::Metadata,
            NETWORKX_TEMP_JSON => return Self::Intermediate,
            _ => {}
        }
        let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
        match ext {
            e if e == METTA_EXTENSION => Self::Metta,
            "csv" if stem.starts_with("nodes_") => Self::NodeCsv,
            "csv" if stem.starts_with("edges_") => Self::EdgeCsv,
            "cypher" if stem.starts_with("nodes_") => Self::NodeScript,
            "cypher" if stem.starts_with("edges_") => Self::EdgeScript,
            _ => Self::Other,
        }
    }
}

/// One file of the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub role: OutputRole,
    pub bytes: u64,
    /// BLAKE3 hex digest, when built with `crypto-hash`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Every regular file of one output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputManifest {
    pub dir: PathBuf,
    pub entries: Vec<ManifestEntry>,
    pub total_bytes: u64,
}

impl OutputManifest {
    /// Scan `dir` (not recursively).
    pub fn scan(dir: &Path) -> Result<Self, GraphSinkError> {
        let listing = std::fs::read_dir(dir)
            .map_err(|e| GraphSinkError::io(format!("list {}", dir.display()), e))?;

        let mut entries = Vec::new();
        for item in listing {
            let item = item.map_err(|e| GraphSinkError::io("read directory entry", e))?;
            let meta = item
                .metadata()
                .map_err(|e| GraphSinkError::io(format!("stat {}", item.path().display()), e))?;
            if !meta.is_file() {
                continue;
            }
            let name = item.file_name().to_string_lossy().into_owned();
            entries.push(ManifestEntry {
                role: OutputRole::classify(&name),
                digest: digest_file(&item.path())?,
                name,
                bytes: meta.len(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let total_bytes = entries.iter().map(|e| e.bytes).sum();
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
            total_bytes,
        })
    }

    /// Entries playing `role`.
    pub fn by_role(&self, role: OutputRole) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(move |e| e.role == role)
    }
}

#[cfg(feature = "crypto-hash")]
fn digest_file(path: &Path) -> Result<Option<String>, GraphSinkError> {
    let data = std::fs::read(path)
        .map_err(|e| GraphSinkError::io(format!("read {}", path.display()), e))?;
    Ok(Some(blake3::hash(&data).to_hex().to_string()))
}

#[cfg(not(feature = "crypto-hash"))]
fn digest_file(_path: &Path) -> Result<Option<String>, GraphSinkError> {
    Ok(None)
}

// =============================================================================
// TESTS
// =============================================================================
