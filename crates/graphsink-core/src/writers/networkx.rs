//! # NetworkX Writer
//!
//! Accumulates the whole graph in memory, then writes it once as a
//! node-link JSON document that an external interpreter converts into a
//! pickled `networkx.DiGraph`.
//!
//! ## Dense Identifiers
//!
//! Each distinct normalized vertex id receives the next integer on its first
//! sighting in `write_nodes`. Edges are resolved against that table: an edge
//! with an unknown endpoint is dropped, logged and counted, and the rest of
//! its batch is still written.
//!
//! ## Lifecycle
//!
//! ```text
//! Accumulating --write_graph--> Finalizing --> Done
//!                                         \-> Failed
//! ```
//!
//! `write_graph` is one-shot. Any write after it returns
//! [`GraphSinkError::InvalidState`].

use super::{GraphWriter, WriteReport, note_mismatched, prepare_output_dir};
use crate::config::{WriterConfig, WriterKind};
use crate::grouping::{LabelCase, group_edges_by_type, group_vertices_by_label};
use crate::normalize::{exchange_value, normalize_id};
use crate::primitives::{ID_PROPERTY, NETWORKX_METADATA, NETWORKX_SNAPSHOT, NETWORKX_TEMP_JSON};
use crate::system::{StatsCollector, WriterStats};
use crate::{GraphSinkError, Properties, Record};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard};

// =============================================================================
// CONVERTER BOUNDARY
// =============================================================================

/// Turns the node-link JSON document into a binary graph snapshot.
pub trait GraphConverter: Send + Sync + fmt::Debug {
    fn convert(&self, json_path: &Path, snapshot_path: &Path) -> Result<(), GraphSinkError>;
}

const CONVERT_SCRIPT: &str = r#"
import json, pickle, sys
import networkx as nx

with open(sys.argv[1]) as f:
    data = json.load(f)

g = nx.DiGraph()
for node in data["nodes"]:
    attrs = dict(node)
    g.add_node(attrs.pop("id"), **attrs)
for link in data["links"]:
    attrs = dict(link)
    g.add_edge(attrs.pop("source"), attrs.pop("target"), **attrs)

with open(sys.argv[2], "wb") as f:
    pickle.dump(g, f)
"#;

/// Converter running a Python interpreter with `networkx` installed.
///
/// Paths travel as `sys.argv`, never through the script text.
#[derive(Debug, Clone)]
pub struct PythonConverter {
    interpreter: String,
}

impl PythonConverter {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

impl GraphConverter for PythonConverter {
    fn convert(&self, json_path: &Path, snapshot_path: &Path) -> Result<(), GraphSinkError> {
        let output = Command::new(&self.interpreter)
            .arg("-c")
            .arg(CONVERT_SCRIPT)
            .arg(json_path)
            .arg(snapshot_path)
            .output()
            .map_err(|e| GraphSinkError::io(format!("run {}", self.interpreter), e))?;

        if !output.status.success() {
            let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
            captured.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(GraphSinkError::Conversion {
                status: output.status.to_string(),
                output: captured.trim().to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// WRITER STATE
// =============================================================================

/// Lifecycle phase of a [`NetworkxWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangePhase {
    Accumulating,
    Finalizing,
    Done,
    Failed,
}

#[derive(Debug)]
struct ExchangeState {
    phase: ExchangePhase,
    dense_ids: HashMap<String, u64>,
    nodes: Vec<JsonValue>,
    links: Vec<JsonValue>,
}

impl ExchangeState {
    fn ensure_accumulating(&self) -> Result<(), GraphSinkError> {
        if self.phase == ExchangePhase::Accumulating {
            Ok(())
        } else {
            Err(GraphSinkError::InvalidState(format!(
                "NetworkX writer is {:?}; no further writes accepted",
                self.phase
            )))
        }
    }

    /// Dense id of a normalized id, assigning the next one if unseen.
    ///
    /// The flag is true when the id was assigned by this call.
    fn assign(&mut self, normalized: String) -> (u64, bool) {
        let next = self.dense_ids.len() as u64;
        let dense = *self.dense_ids.entry(normalized).or_insert(next);
        (dense, dense == next)
    }
}

/// Writer producing a NetworkX snapshot of the whole job.
#[derive(Debug)]
pub struct NetworkxWriter {
    config: WriterConfig,
    converter: Box<dyn GraphConverter>,
    state: Mutex<ExchangeState>,
    stats: StatsCollector,
}

impl NetworkxWriter {
    /// Writer converting through `config.python`.
    pub fn new(config: WriterConfig) -> Result<Self, GraphSinkError> {
        let converter = PythonConverter::new(config.python.clone());
        Self::with_converter(config, Box::new(converter))
    }

    pub fn with_converter(
        config: WriterConfig,
        converter: Box<dyn GraphConverter>,
    ) -> Result<Self, GraphSinkError> {
        prepare_output_dir(&config)?;
        Ok(Self {
            config,
            converter,
            state: Mutex::new(ExchangeState {
                phase: ExchangePhase::Accumulating,
                dense_ids: HashMap::new(),
                nodes: Vec::new(),
                links: Vec::new(),
            }),
            stats: StatsCollector::new(),
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ExchangeState>, GraphSinkError> {
        self.state
            .lock()
            .map_err(|_| GraphSinkError::InvalidState("NetworkX state lock poisoned".to_string()))
    }

    pub fn phase(&self) -> Result<ExchangePhase, GraphSinkError> {
        Ok(self.lock_state()?.phase)
    }

    /// Dense id assigned to a raw vertex id, if it has been seen.
    pub fn dense_id(&self, raw: &str) -> Result<Option<u64>, GraphSinkError> {
        Ok(self.lock_state()?.dense_ids.get(&normalize_id(raw)).copied())
    }

    /// Serialize the accumulated graph and convert it to a snapshot.
    ///
    /// Returns the snapshot path. On conversion failure the intermediate
    /// JSON is left in place for diagnosis and the writer becomes `Failed`.
    pub fn write_graph(&self) -> Result<PathBuf, GraphSinkError> {
        let (document, node_count, edge_count) = {
            let mut state = self.lock_state()?;
            state.ensure_accumulating()?;
            state.phase = ExchangePhase::Finalizing;

            let node_count = state.dense_ids.len();
            let edge_count = state.links.len();
            let document = json!({
                "directed": true,
                "multigraph": false,
                "graph": {},
                "nodes": std::mem::take(&mut state.nodes),
                "links": std::mem::take(&mut state.links),
            });
            (document, node_count, edge_count)
        };

        let result = self.persist(&document, node_count, edge_count);

        let mut state = self.lock_state()?;
        state.phase = if result.is_ok() {
            ExchangePhase::Done
        } else {
            ExchangePhase::Failed
        };
        result
    }

    fn persist(
        &self,
        document: &JsonValue,
        node_count: usize,
        edge_count: usize,
    ) -> Result<PathBuf, GraphSinkError> {
        let dir = &self.config.output_dir;
        let json_path = dir.join(NETWORKX_TEMP_JSON);
        let snapshot_path = dir.join(NETWORKX_SNAPSHOT);

        write_json(&json_path, document)?;

        let stats = self.stats.snapshot();
        let metadata = json!({
            "job_id": self.config.job_id,
            "node_count": node_count,
            "edge_count": edge_count,
            "skipped": stats.skipped,
            "node_counters": stats.vertices_by_label,
            "edge_counters": stats.edges_by_type,
        });
        write_json(&dir.join(NETWORKX_METADATA), &metadata)?;

        tracing::info!(nodes = node_count, edges = edge_count, "converting NetworkX graph");
        self.converter.convert(&json_path, &snapshot_path)?;

        if !self.config.keep_intermediate_json {
            std::fs::remove_file(&json_path)
                .map_err(|e| GraphSinkError::io(format!("remove {}", json_path.display()), e))?;
        }
        Ok(snapshot_path)
    }
}

fn write_json(path: &Path, value: &JsonValue) -> Result<(), GraphSinkError> {
    let file = File::create(path)
        .map_err(|e| GraphSinkError::io(format!("create {}", path.display()), e))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, value)
        .map_err(|e| GraphSinkError::Serialization(e.to_string()))?;
    out.flush()
        .map_err(|e| GraphSinkError::io(format!("flush {}", path.display()), e))?;
    out.get_ref()
        .sync_all()
        .map_err(|e| GraphSinkError::io(format!("sync {}", path.display()), e))
}

/// Native JSON properties, `id` excluded and absent values omitted.
fn exchange_properties(properties: &Properties, max_len: Option<usize>) -> JsonMap<String, JsonValue> {
    properties
        .iter()
        .filter(|(key, _)| key.as_str() != ID_PROPERTY)
        .filter_map(|(key, value)| exchange_value(value, max_len).map(|v| (key.clone(), v)))
        .collect()
}

impl GraphWriter for NetworkxWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Networkx
    }

    fn write_nodes(&self, records: &[Record]) -> Result<WriteReport, GraphSinkError> {
        let grouped = group_vertices_by_label(records, LabelCase::Preserve);
        let max_len = self.config.max_value_len;

        // Render outside the lock; only id assignment needs it.
        let rendered: Vec<(String, String, String, JsonMap<String, JsonValue>)> = grouped
            .groups
            .values()
            .flatten()
            .map(|v| {
                let original = v.id.to_string();
                (
                    normalize_id(&original),
                    original,
                    v.label.clone(),
                    exchange_properties(&v.properties, max_len),
                )
            })
            .collect();

        {
            let mut state = self.lock_state()?;
            state.ensure_accumulating()?;
            for (normalized, original, label, mut node) in rendered {
                let (dense, fresh) = state.assign(normalized);
                if fresh {
                    node.insert("id".to_string(), JsonValue::from(dense));
                    node.insert("original_id".to_string(), JsonValue::String(original));
                    node.insert("label".to_string(), JsonValue::String(label));
                    state.nodes.push(JsonValue::Object(node));
                    continue;
                }
                // Node entries are pushed in dense id order, one per id.
                let existing = usize::try_from(dense)
                    .ok()
                    .and_then(|index| state.nodes.get_mut(index));
                if let Some(JsonValue::Object(existing)) = existing {
                    existing.extend(
                        node.into_iter()
                            .filter(|(key, _)| key != "original_id" && key != "label"),
                    );
                }
            }
        }

        note_mismatched(&self.stats, grouped.mismatched, "vertex");
        for (label, vertices) in &grouped.groups {
            self.stats.record_vertices(label, vertices.len());
        }
        Ok(WriteReport {
            written: grouped.element_count(),
            skipped: grouped.mismatched,
            ..WriteReport::default()
        })
    }

    fn write_edges(&self, records: &[Record]) -> Result<WriteReport, GraphSinkError> {
        let grouped = group_edges_by_type(records, LabelCase::Preserve);
        let max_len = self.config.max_value_len;
        let mut unresolved = 0;

        let mut state = self.lock_state()?;
        state.ensure_accumulating()?;

        for (key, edges) in &grouped.groups {
            let mut written = 0;
            for edge in edges {
                let source = state.dense_ids.get(&normalize_id(&edge.source_id.to_string())).copied();
                let target = state.dense_ids.get(&normalize_id(&edge.target_id.to_string())).copied();
                let (Some(source), Some(target)) = (source, target) else {
                    tracing::warn!(
                        source = %edge.source_id,
                        target = %edge.target_id,
                        edge_type = %key,
                        "skipping edge with unknown endpoint"
                    );
                    unresolved += 1;
                    continue;
                };

                let mut link = exchange_properties(&edge.properties, max_len);
                link.insert("source".to_string(), JsonValue::from(source));
                link.insert("target".to_string(), JsonValue::from(target));
                link.insert("type".to_string(), JsonValue::String(key.label.clone()));
                link.insert("source_label".to_string(), JsonValue::String(key.source_label.clone()));
                link.insert("target_label".to_string(), JsonValue::String(key.target_label.clone()));
                state.links.push(JsonValue::Object(link));
                written += 1;
            }
            if written > 0 {
                self.stats.record_edges(key, written);
            }
        }
        drop(state);

        note_mismatched(&self.stats, grouped.mismatched, "edge");
        if unresolved > 0 {
            self.stats.record_skipped(unresolved);
        }

        let skipped = grouped.mismatched + unresolved;
        Ok(WriteReport {
            written: grouped.element_count() - unresolved,
            skipped,
            ..WriteReport::default()
        })
    }

    fn finish(&self) -> Result<(), GraphSinkError> {
        let snapshot = self.write_graph()?;
        tracing::info!(snapshot = %snapshot.display(), "NetworkX snapshot written");
        Ok(())
    }

    fn stats(&self) -> WriterStats {
        self.stats.snapshot()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Edge, PropertyValue, Scalar, Vertex};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Converter that copies the JSON document to the snapshot path.
    #[derive(Debug, Default)]
    struct CopyConverter {
        calls: Arc<AtomicUsize>,
    }

    impl GraphConverter for CopyConverter {
        fn convert(&self, json_path: &Path, snapshot_path: &Path) -> Result<(), GraphSinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::copy(json_path, snapshot_path)
                .map(|_| ())
                .map_err(|e| GraphSinkError::io("copy", e))
        }
    }

    #[derive(Debug)]
    struct FailingConverter;

    impl GraphConverter for FailingConverter {
        fn convert(&self, _: &Path, _: &Path) -> Result<(), GraphSinkError> {
            Err(GraphSinkError::Conversion {
                status: "exit status: 1".to_string(),
                output: "ModuleNotFoundError: No module named 'networkx'".to_string(),
            })
        }
    }

    fn writer(dir: &Path, converter: Box<dyn GraphConverter>) -> NetworkxWriter {
        NetworkxWriter::with_converter(WriterConfig::new(dir, "job"), converter).expect("writer")
    }

    fn read_json(path: PathBuf) -> JsonValue {
        serde_json::from_slice(&std::fs::read(path).expect("read")).expect("decode")
    }

    #[test]
    fn dense_ids_follow_first_sighting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let w = writer(dir.path(), Box::new(CopyConverter::default()));

        w.write_nodes(&[Vertex::new("A", "gene").into(), Vertex::new("B", "gene").into()])
            .expect("nodes");
        w.write_nodes(&[Vertex::new("a", "gene").into()]).expect("again");

        assert_eq!(w.dense_id("A").expect("lock"), Some(0));
        assert_eq!(w.dense_id("B").expect("lock"), Some(1));
        assert_eq!(w.dense_id("C").expect("lock"), None);
    }

    #[test]
    fn repeated_vertex_merges_into_one_node() {
        let dir = tempfile::tempdir().expect("tempdir");
        let w = writer(dir.path(), Box::new(CopyConverter::default()));

        w.write_nodes(&[Vertex::new("A", "gene")
            .with_property("x", PropertyValue::text("1"))
            .into()])
            .expect("first");
        w.write_nodes(&[Vertex::new("a", "Gene")
            .with_property("y", PropertyValue::text("2"))
            .with_property("label", PropertyValue::text("other"))
            .into()])
            .expect("again");

        let doc = read_json(w.write_graph().expect("graph"));
        let nodes = doc["nodes"].as_array().expect("nodes array");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["id"], 0);
        assert_eq!(nodes[0]["original_id"], "A");
        assert_eq!(nodes[0]["label"], "gene");
        assert_eq!(nodes[0]["x"], "1");
        assert_eq!(nodes[0]["y"], "2");

        let meta = read_json(dir.path().join(NETWORKX_METADATA));
        assert_eq!(meta["node_count"], 1);
    }

    #[test]
    fn edge_with_unknown_endpoint_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let w = writer(dir.path(), Box::new(CopyConverter::default()));
        w.write_nodes(&[Vertex::new("1", "gene").into(), Vertex::new("2", "gene").into()])
            .expect("nodes");

        let report = w
            .write_edges(&[
                Edge::new("rel", ("gene", "1"), ("gene", "2")).into(),
                Edge::new("rel", ("gene", "9"), ("gene", "2")).into(),
            ])
            .expect("edges");

        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(w.stats().skipped, 1);
    }

    #[test]
    fn write_graph_produces_node_link_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let calls = Arc::new(AtomicUsize::new(0));
        let w = writer(
            dir.path(),
            Box::new(CopyConverter {
                calls: Arc::clone(&calls),
            }),
        );
        w.write_nodes(&[
            Vertex::new("G:1", "gene")
                .with_property("score", PropertyValue::Scalar(Scalar::Float(0.5)))
                .with_property("note", PropertyValue::Null)
                .into(),
            Vertex::new("G:2", "gene").into(),
        ])
        .expect("nodes");
        w.write_edges(&[Edge::new("rel", ("gene", "G:1"), ("gene", "g 2")).into()])
            .expect("edges");

        let snapshot = w.write_graph().expect("graph");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(w.phase().expect("phase"), ExchangePhase::Done);
        assert!(!dir.path().join(NETWORKX_TEMP_JSON).exists());

        let doc = read_json(snapshot);
        assert_eq!(doc["directed"], true);
        assert_eq!(doc["nodes"][0]["id"], 0);
        assert_eq!(doc["nodes"][0]["original_id"], "G:1");
        assert_eq!(doc["nodes"][0]["score"], 0.5);
        assert!(doc["nodes"][0].get("note").is_none());
        assert_eq!(doc["links"][0]["source"], 0);
        assert_eq!(doc["links"][0]["target"], 1);
        assert_eq!(doc["links"][0]["type"], "rel");

        let meta = read_json(dir.path().join(NETWORKX_METADATA));
        assert_eq!(meta["node_count"], 2);
        assert_eq!(meta["edge_count"], 1);
        assert_eq!(meta["node_counters"]["gene"], 2);
    }

    #[test]
    fn writes_after_finalize_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let w = writer(dir.path(), Box::new(CopyConverter::default()));
        w.finish().expect("finish");

        assert!(matches!(
            w.write_nodes(&[Vertex::new("1", "gene").into()]),
            Err(GraphSinkError::InvalidState(_))
        ));
        assert!(matches!(w.write_graph(), Err(GraphSinkError::InvalidState(_))));
    }

    #[test]
    fn conversion_failure_keeps_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let w = writer(dir.path(), Box::new(FailingConverter));
        w.write_nodes(&[Vertex::new("1", "gene").into()]).expect("nodes");

        let err = w.write_graph().expect_err("conversion fails");
        assert!(matches!(err, GraphSinkError::Conversion { .. }));
        assert_eq!(w.phase().expect("phase"), ExchangePhase::Failed);
        assert!(dir.path().join(NETWORKX_TEMP_JSON).exists());
    }

    #[test]
    fn missing_interpreter_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let converter = PythonConverter::new("graphsink-no-such-interpreter");
        let result = converter.convert(&dir.path().join("a.json"), &dir.path().join("b.pkl"));
        assert!(matches!(result, Err(GraphSinkError::Io { .. })));
    }
}
