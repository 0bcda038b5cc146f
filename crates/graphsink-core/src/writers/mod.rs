//! # Writers
//!
//! The three format writers and the trait they share.
//!
//! Every writer takes `&self`, so one instance can be driven by many threads
//! at once; per-file ordering and exclusion come from the shared
//! [`LockRegistry`].

mod metta;
mod neo4j;
mod networkx;

pub use metta::{MettaWriter, render_edge, render_vertex};
pub use neo4j::{Neo4jCsvWriter, edge_script, load_plan, node_script, tenant_cleanup_script};
pub use networkx::{ExchangePhase, GraphConverter, NetworkxWriter, PythonConverter};

use crate::append::LockRegistry;
use crate::config::{WriterConfig, WriterKind};
use crate::system::WriterStats;
use crate::{GraphSinkError, Record};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// WRITE REPORT
// =============================================================================

/// What one `write_nodes` / `write_edges` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Elements rendered to output.
    pub written: usize,
    /// Records not written: wrong variant, or (NetworkX) unknown endpoints.
    pub skipped: usize,
    /// Files appended or regenerated.
    pub files: BTreeSet<PathBuf>,
}

impl WriteReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: WriteReport) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.files.extend(other.files);
    }
}

// =============================================================================
// GRAPH WRITER TRAIT
// =============================================================================

/// A format-specific sink for batches of graph elements.
///
/// Implementations must be `Send + Sync`: callers may submit different
/// batches from several threads concurrently. Each call blocks until its
/// batch is durably written or has failed.
pub trait GraphWriter: Send + Sync {
    /// The format this writer produces.
    fn kind(&self) -> WriterKind;

    /// Write a batch of vertex records.
    fn write_nodes(&self, records: &[Record]) -> Result<WriteReport, GraphSinkError>;

    /// Write a batch of edge records.
    fn write_edges(&self, records: &[Record]) -> Result<WriteReport, GraphSinkError>;

    /// Complete the job. Only writers that buffer in memory need this.
    fn finish(&self) -> Result<(), GraphSinkError> {
        Ok(())
    }

    /// Counters accumulated so far.
    fn stats(&self) -> WriterStats;
}

/// Construct a writer of `kind` with its own lock registry.
pub fn open_writer(
    kind: WriterKind,
    config: WriterConfig,
) -> Result<Box<dyn GraphWriter>, GraphSinkError> {
    open_writer_with_locks(kind, config, Arc::new(LockRegistry::new()))
}

/// Construct a writer of `kind` sharing an existing lock registry.
pub fn open_writer_with_locks(
    kind: WriterKind,
    config: WriterConfig,
    locks: Arc<LockRegistry>,
) -> Result<Box<dyn GraphWriter>, GraphSinkError> {
    Ok(match kind {
        WriterKind::Metta => Box::new(MettaWriter::with_locks(config, locks)?),
        WriterKind::Neo4j => Box::new(Neo4jCsvWriter::with_locks(config, locks)?),
        WriterKind::Networkx => Box::new(NetworkxWriter::new(config)?),
    })
}

/// Validate the configuration and create the output directory.
fn prepare_output_dir(config: &WriterConfig) -> Result<(), GraphSinkError> {
    config.validate()?;
    create_output_dir(&config.output_dir)
}

fn create_output_dir(path: &Path) -> Result<(), GraphSinkError> {
    std::fs::create_dir_all(path).map_err(|source| GraphSinkError::OutputDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Log and count records of the wrong variant.
fn note_mismatched(stats: &crate::system::StatsCollector, mismatched: usize, expected: &str) {
    if mismatched > 0 {
        tracing::warn!(count = mismatched, expected, "skipping records of the wrong kind");
        stats.record_skipped(mismatched);
    }
}
