//! # MeTTa Writer
//!
//! Renders vertices and edges as MeTTa expressions, one `<label>.metta` file
//! per label. Vertices and edges of the same label share a file.
//!
//! ```text
//! (person p_1)
//! (name (person p_1) Ann_Doe)
//! (knows (person p_1) (person p_2))
//! (since (knows (person p_1) (person p_2)) 2019)
//! ```
//!
//! Each batch ends with a blank line.

use super::{GraphWriter, WriteReport, note_mismatched, prepare_output_dir};
use crate::append::LockRegistry;
use crate::config::{WriterConfig, WriterKind};
use crate::grouping::{LabelCase, group_edges_by_label, group_vertices_by_label};
use crate::normalize::{file_stem, normalize_id, symbolic_scalar, symbolic_value};
use crate::primitives::{ID_PROPERTY, METTA_EXTENSION};
use crate::system::{StatsCollector, WriterStats};
use crate::{Edge, GraphSinkError, Properties, Record, Vertex};
use std::path::PathBuf;
use std::sync::Arc;

/// Writer producing one MeTTa file per label.
#[derive(Debug)]
pub struct MettaWriter {
    config: WriterConfig,
    locks: Arc<LockRegistry>,
    stats: StatsCollector,
}

impl MettaWriter {
    pub fn new(config: WriterConfig) -> Result<Self, GraphSinkError> {
        Self::with_locks(config, Arc::new(LockRegistry::new()))
    }

    pub fn with_locks(config: WriterConfig, locks: Arc<LockRegistry>) -> Result<Self, GraphSinkError> {
        prepare_output_dir(&config)?;
        Ok(Self {
            config,
            locks,
            stats: StatsCollector::new(),
        })
    }

    /// Output file for a label.
    pub fn file_for(&self, label: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}.{}", file_stem(label), METTA_EXTENSION))
    }

    fn append_batch(&self, label: &str, rendered: Vec<String>) -> Result<PathBuf, GraphSinkError> {
        let mut body = String::new();
        for expr in rendered {
            body.push_str(&expr);
            body.push('\n');
        }
        body.push('\n');

        let outcome = self
            .locks
            .append_locked(&self.file_for(label), move |_| Ok(body.into_bytes()))?;
        Ok(outcome.path)
    }
}

impl GraphWriter for MettaWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Metta
    }

    fn write_nodes(&self, records: &[Record]) -> Result<WriteReport, GraphSinkError> {
        let grouped = group_vertices_by_label(records, LabelCase::Preserve);
        note_mismatched(&self.stats, grouped.mismatched, "vertex");

        let mut report = WriteReport {
            skipped: grouped.mismatched,
            ..WriteReport::default()
        };
        for (label, vertices) in &grouped.groups {
            let rendered = vertices
                .iter()
                .map(|v| render_vertex(v, self.config.max_value_len))
                .collect();
            let path = self.append_batch(label, rendered)?;

            self.stats.record_vertices(label, vertices.len());
            report.written += vertices.len();
            report.files.insert(path);
        }
        Ok(report)
    }

    fn write_edges(&self, records: &[Record]) -> Result<WriteReport, GraphSinkError> {
        let grouped = group_edges_by_label(records, LabelCase::Preserve);
        note_mismatched(&self.stats, grouped.mismatched, "edge");

        let mut report = WriteReport {
            skipped: grouped.mismatched,
            ..WriteReport::default()
        };
        for (label, edges) in &grouped.groups {
            let rendered = edges
                .iter()
                .map(|e| render_edge(e, self.config.max_value_len))
                .collect();
            let path = self.append_batch(label, rendered)?;

            for edge in edges {
                self.stats.record_edges(&edge.type_key(), 1);
            }
            report.written += edges.len();
            report.files.insert(path);
        }
        Ok(report)
    }

    fn stats(&self) -> WriterStats {
        self.stats.snapshot()
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// `(label id)` for a vertex.
fn vertex_head(v: &Vertex) -> String {
    format!(
        "({} {})",
        symbolic_scalar(&v.label, None),
        symbolic_scalar(&normalize_id(&v.id.to_string()), None)
    )
}

/// `(label (sourceLabel sourceId) (targetLabel targetId))` for an edge.
fn edge_head(e: &Edge) -> String {
    format!(
        "({} ({} {}) ({} {}))",
        symbolic_scalar(&e.label, None),
        symbolic_scalar(&e.source_label, None),
        symbolic_scalar(&normalize_id(&e.source_id.to_string()), None),
        symbolic_scalar(&e.target_label, None),
        symbolic_scalar(&normalize_id(&e.target_id.to_string()), None),
    )
}

/// Head expression followed by one `(key head value)` line per property.
fn render_with_properties(head: String, properties: &Properties, max_len: Option<usize>) -> String {
    let mut out = head.clone();
    for (key, value) in properties {
        if key == ID_PROPERTY {
            continue;
        }
        out.push_str(&format!(
            "\n({} {} {})",
            symbolic_scalar(key, None),
            head,
            symbolic_value(Some(value), max_len)
        ));
    }
    out
}

/// Render one vertex and its properties (no trailing newline).
pub fn render_vertex(v: &Vertex, max_len: Option<usize>) -> String {
    render_with_properties(vertex_head(v), &v.properties, max_len)
}

/// Render one edge and its properties (no trailing newline).
pub fn render_edge(e: &Edge, max_len: Option<usize>) -> String {
    render_with_properties(edge_head(e), &e.properties, max_len)
}

// =============================================================================
// TESTS
// =============================================================================
