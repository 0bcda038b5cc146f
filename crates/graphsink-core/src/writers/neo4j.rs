//! # Neo4j CSV Writer
//!
//! Renders each vertex label and each edge type into a `|`-delimited CSV
//! file plus a companion Cypher script that bulk-loads it with
//! `apoc.periodic.iterate`.
//!
//! ## Files
//!
//! - `nodes_<label>.csv` / `nodes_<label>.cypher`
//! - `edges_<label>_<source>_<target>.csv` / `.cypher`
//!
//! Labels are lowercased. CSV files are appended; scripts are regenerated on
//! every write. Every created node and relationship carries
//! `tenant_id = <job id>`, and edge scripts match endpoints on
//! `(id, tenant_id)`, so jobs sharing a database never cross-match.
//!
//! ## Header Policy
//!
//! The header row is written once, when the file is empty: fixed columns
//! followed by the sorted property keys of that first batch. Property keys
//! first seen in later batches have no column; their values are dropped and
//! a warning is logged. The header is never rewritten.
//!
//! Property keys become columns after the same sanitizing as values, so a
//! key can never split the header. `id` and `tenant_id` are reserved: the
//! scripts set them, and no property column may overwrite them.

use super::{GraphWriter, WriteReport, note_mismatched, prepare_output_dir};
use crate::append::{AppendTarget, LockRegistry};
use crate::config::{WriterConfig, WriterKind};
use crate::grouping::{LabelCase, group_edges_by_type, group_vertices_by_label};
use crate::normalize::{file_stem, normalize_id, tabular_scalar, tabular_value};
use crate::primitives::{
    CSV_DELIMITER, EDGE_FIXED_COLUMNS, ID_PROPERTY, NODE_FIXED_COLUMNS, TENANT_CLEANUP_SCRIPT,
    TENANT_PROPERTY,
};
use crate::system::{StatsCollector, WriterStats};
use crate::{EdgeTypeKey, GraphSinkError, Properties, Record};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::{BTreeMap, BTreeSet, btree_map};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writer producing Neo4j bulk-import bundles.
#[derive(Debug)]
pub struct Neo4jCsvWriter {
    config: WriterConfig,
    locks: Arc<LockRegistry>,
    /// Columns fixed for each CSV file, once its header is on disk.
    headers: DashMap<PathBuf, Arc<[String]>>,
    /// Vertex label behind each node file stem.
    node_labels: DashMap<String, String>,
    /// Edge type behind each edge file stem.
    edge_types: DashMap<String, EdgeTypeKey>,
    stats: StatsCollector,
}

impl Neo4jCsvWriter {
    pub fn new(config: WriterConfig) -> Result<Self, GraphSinkError> {
        Self::with_locks(config, Arc::new(LockRegistry::new()))
    }

    pub fn with_locks(config: WriterConfig, locks: Arc<LockRegistry>) -> Result<Self, GraphSinkError> {
        prepare_output_dir(&config)?;
        Ok(Self {
            config,
            locks,
            headers: DashMap::new(),
            node_labels: DashMap::new(),
            edge_types: DashMap::new(),
            stats: StatsCollector::new(),
        })
    }

    /// File stem shared by the CSV and script of a vertex label.
    pub fn node_stem(label: &str) -> String {
        format!("nodes_{}", script_safe_stem(&label.to_lowercase()))
    }

    /// File stem shared by the CSV and script of an edge type.
    pub fn edge_stem(key: &EdgeTypeKey) -> String {
        let key = key.to_lowercase();
        format!(
            "edges_{}_{}_{}",
            script_safe_stem(&key.label),
            script_safe_stem(&key.source_label),
            script_safe_stem(&key.target_label)
        )
    }

    fn path_for(&self, stem: &str, extension: &str) -> PathBuf {
        self.config.output_dir.join(format!("{stem}.{extension}"))
    }

    /// Scripts in load order: node scripts, then edge scripts.
    pub fn load_plan(&self) -> Result<Vec<PathBuf>, GraphSinkError> {
        load_plan(&self.config.output_dir)
    }

    /// Write the script deleting every element of this job's tenant.
    pub fn write_tenant_cleanup(&self) -> Result<PathBuf, GraphSinkError> {
        let script = tenant_cleanup_script(&self.config.job_id, self.config.import_batch_size);
        self.locks.replace_locked(
            &self.config.output_dir.join(TENANT_CLEANUP_SCRIPT),
            script.as_bytes(),
        )
    }

    /// Decide the columns of a CSV file under its append lock.
    ///
    /// Returns the columns and whether the header row must be written.
    fn resolve_columns(
        &self,
        csv: &Path,
        target: &mut AppendTarget<'_>,
        fixed: &[&str],
        batch_columns: &BTreeMap<String, &str>,
    ) -> Result<(Arc<[String]>, bool), GraphSinkError> {
        if target.was_empty {
            let columns: Arc<[String]> = fixed
                .iter()
                .copied()
                .chain(batch_columns.keys().map(String::as_str))
                .map(str::to_string)
                .collect();
            self.headers.insert(csv.to_path_buf(), Arc::clone(&columns));
            return Ok((columns, true));
        }

        if let Some(columns) = self.headers.get(csv) {
            return Ok((Arc::clone(columns.value()), false));
        }

        // Written by an earlier run: adopt the header on disk.
        let line = target
            .leading_line()
            .map_err(|source| GraphSinkError::Append {
                path: csv.to_path_buf(),
                source,
            })?
            .unwrap_or_default();
        let columns: Arc<[String]> = line.split(CSV_DELIMITER).map(str::to_string).collect();
        self.headers.insert(csv.to_path_buf(), Arc::clone(&columns));
        Ok((columns, false))
    }

    /// Remember the vertex label behind a file stem, refusing a second label.
    fn record_node_label(&self, stem: &str, label: &str) -> Result<(), GraphSinkError> {
        match self.node_labels.entry(stem.to_string()) {
            Entry::Occupied(existing) if existing.get() != label => {
                Err(GraphSinkError::NodeLabelConflict {
                    file: stem.to_string(),
                    existing: existing.get().clone(),
                    incoming: label.to_string(),
                })
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(label.to_string());
                Ok(())
            }
        }
    }

    /// Remember the edge type behind a file stem, refusing a second type.
    fn record_edge_type(&self, stem: &str, key: &EdgeTypeKey) -> Result<(), GraphSinkError> {
        match self.edge_types.entry(stem.to_string()) {
            Entry::Occupied(existing) if existing.get() != key => {
                Err(GraphSinkError::EdgeTypeConflict {
                    file: stem.to_string(),
                    existing: existing.get().clone(),
                    incoming: key.clone(),
                })
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
                Ok(())
            }
        }
    }

    /// Regenerate the import script of an edge file from recorded metadata.
    fn write_edge_script(&self, stem: &str) -> Result<PathBuf, GraphSinkError> {
        let key = self
            .edge_types
            .get(stem)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GraphSinkError::MissingEdgeType(stem.to_string()))?;
        let script = edge_script(&key, &format!("{stem}.csv"), &self.config);
        self.locks
            .replace_locked(&self.path_for(stem, "cypher"), script.as_bytes())
    }
}

impl GraphWriter for Neo4jCsvWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Neo4j
    }

    fn write_nodes(&self, records: &[Record]) -> Result<WriteReport, GraphSinkError> {
        let grouped = group_vertices_by_label(records, LabelCase::Lower);
        note_mismatched(&self.stats, grouped.mismatched, "vertex");

        let mut report = WriteReport {
            skipped: grouped.mismatched,
            ..WriteReport::default()
        };
        let max_len = self.config.max_value_len;

        for (label, vertices) in &grouped.groups {
            let stem = Self::node_stem(label);
            self.record_node_label(&stem, label)?;

            let csv = self.path_for(&stem, "csv");
            let batch_columns =
                property_columns(&csv, vertices.iter().map(|v| &v.properties), &NODE_FIXED_COLUMNS);

            let outcome = self.locks.append_locked(&csv, |target| {
                let (columns, write_header) =
                    self.resolve_columns(&csv, target, &NODE_FIXED_COLUMNS, &batch_columns)?;
                warn_dropped(&csv, &columns, &batch_columns);

                let mut out = String::new();
                if write_header {
                    push_row(&mut out, columns.iter().cloned());
                }
                for v in vertices {
                    let id = tabular_scalar(&normalize_id(&v.id.to_string()), None);
                    push_row(
                        &mut out,
                        columns.iter().map(|col| {
                            if col == ID_PROPERTY {
                                id.clone()
                            } else {
                                let key = batch_columns.get(col.as_str());
                                tabular_value(key.and_then(|k| v.properties.get(*k)), max_len)
                            }
                        }),
                    );
                }
                Ok(out.into_bytes())
            })?;

            let script = node_script(label, &format!("{stem}.csv"), &self.config);
            let script_path = self
                .locks
                .replace_locked(&self.path_for(&stem, "cypher"), script.as_bytes())?;

            self.stats.record_vertices(label, vertices.len());
            report.written += vertices.len();
            report.files.insert(outcome.path);
            report.files.insert(script_path);
        }
        Ok(report)
    }

    fn write_edges(&self, records: &[Record]) -> Result<WriteReport, GraphSinkError> {
        let grouped = group_edges_by_type(records, LabelCase::Lower);
        note_mismatched(&self.stats, grouped.mismatched, "edge");

        let mut report = WriteReport {
            skipped: grouped.mismatched,
            ..WriteReport::default()
        };
        let max_len = self.config.max_value_len;

        for (key, edges) in &grouped.groups {
            let stem = Self::edge_stem(key);
            self.record_edge_type(&stem, key)?;

            let csv = self.path_for(&stem, "csv");
            let batch_columns =
                property_columns(&csv, edges.iter().map(|e| &e.properties), &EDGE_FIXED_COLUMNS);
            let label = tabular_scalar(&key.label, None);
            let source_type = tabular_scalar(&key.source_label, None);
            let target_type = tabular_scalar(&key.target_label, None);

            let outcome = self.locks.append_locked(&csv, |target| {
                let (columns, write_header) =
                    self.resolve_columns(&csv, target, &EDGE_FIXED_COLUMNS, &batch_columns)?;
                warn_dropped(&csv, &columns, &batch_columns);

                let mut out = String::new();
                if write_header {
                    push_row(&mut out, columns.iter().cloned());
                }
                for e in edges {
                    push_row(
                        &mut out,
                        columns.iter().map(|col| match col.as_str() {
                            "source_id" => tabular_scalar(&normalize_id(&e.source_id.to_string()), None),
                            "target_id" => tabular_scalar(&normalize_id(&e.target_id.to_string()), None),
                            "label" => label.clone(),
                            "source_type" => source_type.clone(),
                            "target_type" => target_type.clone(),
                            other => {
                                let key = batch_columns.get(other);
                                tabular_value(key.and_then(|k| e.properties.get(*k)), max_len)
                            }
                        }),
                    );
                }
                Ok(out.into_bytes())
            })?;

            let script_path = self.write_edge_script(&stem)?;

            self.stats.record_edges(key, edges.len());
            report.written += edges.len();
            report.files.insert(outcome.path);
            report.files.insert(script_path);
        }
        Ok(report)
    }

    fn stats(&self) -> WriterStats {
        self.stats.snapshot()
    }
}

// =============================================================================
// CSV HELPERS
// =============================================================================

/// Quotes and backticks end up inside Cypher string literals via the file
/// name, so they are replaced along with path separators.
fn script_safe_stem(label: &str) -> String {
    file_stem(label).replace(['\'', '"', '`'], "_")
}

/// Columns contributed by the property keys of a batch, sorted, each mapped
/// back to the key it reads.
///
/// Keys are sanitized like values. Keys naming a fixed column or `id` are
/// skipped. `tenant_id`, keys that sanitize to nothing, and a second key
/// landing on an already taken column are refused with a warning.
fn property_columns<'a>(
    csv: &Path,
    maps: impl Iterator<Item = &'a Properties>,
    fixed: &[&str],
) -> BTreeMap<String, &'a str> {
    let mut columns: BTreeMap<String, &'a str> = BTreeMap::new();
    let mut refused: BTreeSet<&str> = BTreeSet::new();

    for key in maps.flat_map(|props| props.keys()).map(String::as_str) {
        let column = tabular_scalar(key, None);
        if column == ID_PROPERTY || fixed.contains(&column.as_str()) {
            continue;
        }
        if column.is_empty() || column == TENANT_PROPERTY {
            refused.insert(key);
            continue;
        }
        match columns.entry(column) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(key);
            }
            btree_map::Entry::Occupied(taken) if *taken.get() != key => {
                refused.insert(key);
            }
            btree_map::Entry::Occupied(_) => {}
        }
    }

    if !refused.is_empty() {
        tracing::warn!(
            file = %csv.display(),
            keys = ?refused,
            "reserved or colliding property keys are not written"
        );
    }
    columns
}

fn warn_dropped(csv: &Path, columns: &[String], batch_columns: &BTreeMap<String, &str>) {
    let dropped: Vec<&str> = batch_columns
        .keys()
        .map(String::as_str)
        .filter(|key| !columns.iter().any(|c| c == key))
        .collect();
    if !dropped.is_empty() {
        tracing::warn!(
            file = %csv.display(),
            columns = ?dropped,
            "header already fixed; values of new property keys are dropped"
        );
    }
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(CSV_DELIMITER);
        }
        out.push_str(&field);
    }
    out.push('\n');
}

// =============================================================================
// CYPHER GENERATION
// =============================================================================

/// Backtick-quoted Cypher identifier. Double quotes and backslashes are
/// removed because the statement sits inside a double-quoted string.
fn ident(name: &str) -> String {
    format!("`{}`", name.replace(['"', '\\'], "").replace('`', "``"))
}

fn load_csv_clause(job_id: &str, csv_file: &str) -> String {
    format!(
        "LOAD CSV WITH HEADERS FROM 'file:///{job_id}/{csv_file}' AS row FIELDTERMINATOR '{CSV_DELIMITER}' RETURN row"
    )
}

/// Bulk-import script for one vertex label.
///
/// `csv_file` is resolved relative to the database import directory, under
/// a folder named after the job.
pub fn node_script(label: &str, csv_file: &str, config: &WriterConfig) -> String {
    let job = &config.job_id;
    let label = ident(label);
    format!(
        "CREATE INDEX IF NOT EXISTS FOR (n:{label}) ON (n.id, n.tenant_id);\n\
         \n\
         CALL apoc.periodic.iterate(\n  \
         \"{load}\",\n  \
         \"CREATE (n:{label} {{id: row.id, tenant_id: '{job}'}}) SET n += apoc.map.removeKeys(row, ['{ID_PROPERTY}', '{TENANT_PROPERTY}'])\",\n  \
         {{batchSize: {batch}, parallel: true, concurrency: {concurrency}}}\n\
         ) YIELD batches, total RETURN batches, total;\n",
        load = load_csv_clause(job, csv_file),
        batch = config.import_batch_size,
        concurrency = config.import_concurrency,
    )
}

/// Bulk-import script for one edge type.
///
/// Endpoints are matched by normalized id, label and tenant; a row whose
/// endpoints do not exist creates nothing.
pub fn edge_script(key: &EdgeTypeKey, csv_file: &str, config: &WriterConfig) -> String {
    let job = &config.job_id;
    let fixed = EDGE_FIXED_COLUMNS
        .iter()
        .chain(std::iter::once(&TENANT_PROPERTY))
        .map(|c| format!("'{c}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CALL apoc.periodic.iterate(\n  \
         \"{load}\",\n  \
         \"MATCH (source:{source} {{id: row.source_id, tenant_id: '{job}'}}) \
         MATCH (target:{target} {{id: row.target_id, tenant_id: '{job}'}}) \
         CREATE (source)-[r:{rel} {{tenant_id: '{job}'}}]->(target) \
         SET r += apoc.map.removeKeys(row, [{fixed}])\",\n  \
         {{batchSize: {batch}}}\n\
         ) YIELD batches, total RETURN batches, total;\n",
        load = load_csv_clause(job, csv_file),
        source = ident(&key.source_label),
        target = ident(&key.target_label),
        rel = ident(&key.label),
        batch = config.import_batch_size,
    )
}

/// Script deleting every node (and attached relationship) of a tenant.
pub fn tenant_cleanup_script(job_id: &str, batch_size: usize) -> String {
    format!(
        "CALL apoc.periodic.iterate(\n  \
         \"MATCH (n) WHERE n.tenant_id = '{job_id}' RETURN n\",\n  \
         \"DETACH DELETE n\",\n  \
         {{batchSize: {batch_size}}}\n\
         ) YIELD batches, total RETURN batches, total;\n"
    )
}

/// Generated scripts of an output directory in load order: every node
/// script (sorted), then every edge script (sorted).
pub fn load_plan(output_dir: &Path) -> Result<Vec<PathBuf>, GraphSinkError> {
    let entries = std::fs::read_dir(output_dir)
        .map_err(|e| GraphSinkError::io(format!("list {}", output_dir.display()), e))?;

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GraphSinkError::io("read directory entry", e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".cypher") {
            continue;
        }
        if name.starts_with("nodes_") {
            nodes.push(entry.path());
        } else if name.starts_with("edges_") {
            edges.push(entry.path());
        }
    }
    nodes.sort();
    edges.sort();
    nodes.extend(edges);
    Ok(nodes)
}

// =============================================================================
// TESTS
// =============================================================================
