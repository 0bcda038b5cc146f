//! # Core Type Definitions
//!
//! This module contains the element model every writer consumes:
//! - Identifiers and property values (`ElementId`, `Scalar`, `PropertyValue`)
//! - Graph elements (`Vertex`, `Edge`) and the `Record` wrapper
//! - The structured edge type key (`EdgeTypeKey`)
//! - Error types (`GraphSinkError`)
//!
//! ## Ordering Guarantees
//!
//! Property maps are `BTreeMap`s, so every writer renders properties in
//! lexicographic key order regardless of how the upstream loader built them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque element identifier as produced by the upstream loader.
///
/// Loaders emit either numeric or textual ids; both are stringified before
/// identifier normalization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementId {
    Int(i64),
    Text(String),
}

impl ElementId {
    /// Whether the identifier renders to an empty (or all-whitespace) string.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Int(_) => false,
            Self::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for ElementId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

// =============================================================================
// PROPERTY VALUES
// =============================================================================

/// A single scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A property value: absent (`null`), a scalar, or an ordered list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl PropertyValue {
    /// Convenience constructor for a text scalar.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(s.into()))
    }

    /// Convenience constructor for a list of text scalars.
    pub fn text_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Scalar::Text(s.into())).collect())
    }
}

/// Property map of a vertex or edge.
pub type Properties = BTreeMap<String, PropertyValue>;

// =============================================================================
// GRAPH ELEMENTS
// =============================================================================

/// A labelled vertex with its property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: ElementId,
    pub label: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Vertex {
    pub fn new(id: impl Into<ElementId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Properties::new(),
        }
    }

    /// Builder-style property insertion.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// A labelled, directed edge between two vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub id: Option<ElementId>,
    pub label: String,
    pub source_id: ElementId,
    pub source_label: String,
    pub target_id: ElementId,
    pub target_label: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Edge {
    pub fn new(
        label: impl Into<String>,
        source: (impl Into<String>, impl Into<ElementId>),
        target: (impl Into<String>, impl Into<ElementId>),
    ) -> Self {
        Self {
            id: None,
            label: label.into(),
            source_id: source.1.into(),
            source_label: source.0.into(),
            target_id: target.1.into(),
            target_label: target.0.into(),
            properties: Properties::new(),
        }
    }

    /// Builder-style property insertion.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// The (label, sourceLabel, targetLabel) triple this edge belongs to.
    pub fn type_key(&self) -> EdgeTypeKey {
        EdgeTypeKey::new(&self.label, &self.source_label, &self.target_label)
    }
}

/// A transient wrapper carrying exactly one element through a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Vertex(Vertex),
    Edge(Edge),
}

impl Record {
    pub fn label(&self) -> &str {
        match self {
            Self::Vertex(v) => &v.label,
            Self::Edge(e) => &e.label,
        }
    }
}

impl From<Vertex> for Record {
    fn from(v: Vertex) -> Self {
        Self::Vertex(v)
    }
}

impl From<Edge> for Record {
    fn from(e: Edge) -> Self {
        Self::Edge(e)
    }
}

// =============================================================================
// EDGE TYPE KEY
// =============================================================================

/// Structured composite key of an edge: one key per output file/table.
///
/// Compared structurally; never joined into a string that is parsed back.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeTypeKey {
    pub label: String,
    pub source_label: String,
    pub target_label: String,
}

impl EdgeTypeKey {
    pub fn new(label: &str, source_label: &str, target_label: &str) -> Self {
        Self {
            label: label.to_string(),
            source_label: source_label.to_string(),
            target_label: target_label.to_string(),
        }
    }

    /// Same key with every component lowercased.
    #[must_use]
    pub fn to_lowercase(&self) -> Self {
        Self {
            label: self.label.to_lowercase(),
            source_label: self.source_label.to_lowercase(),
            target_label: self.target_label.to_lowercase(),
        }
    }
}

impl fmt::Display for EdgeTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({})-[{}]->({})",
            self.source_label, self.label, self.target_label
        )
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the writer subsystem.
///
/// - Batch-level failures are returned, never retried internally
/// - Referential problems (unknown edge endpoints) are NOT errors; they are
///   counted in the write report and logged
#[derive(Debug, Error)]
pub enum GraphSinkError {
    /// The output directory could not be created.
    #[error("Cannot create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O failure while holding the append lock for a file.
    #[error("Append to {path:?} failed: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure.
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The external graph conversion process exited unsuccessfully.
    #[error("Graph conversion failed ({status}): {output}")]
    Conversion { status: String, output: String },

    /// An edge import script was requested for a type key never recorded.
    #[error("No edge type recorded for {0}")]
    MissingEdgeType(String),

    /// Two different edge types map onto the same output file.
    #[error("Edge types {existing} and {incoming} both map to {file}")]
    EdgeTypeConflict {
        file: String,
        existing: EdgeTypeKey,
        incoming: EdgeTypeKey,
    },

    /// Two different vertex labels map onto the same output file.
    #[error("Vertex labels '{existing}' and '{incoming}' both map to {file}")]
    NodeLabelConflict {
        file: String,
        existing: String,
        incoming: String,
    },

    /// The writer is not in a state that allows the operation.
    #[error("Invalid writer state: {0}")]
    InvalidState(String),

    /// An input record is malformed.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GraphSinkError {
    /// Wrap an I/O error with a short context description.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_id_display() {
        assert_eq!(ElementId::Int(42).to_string(), "42");
        assert_eq!(ElementId::from("P:1").to_string(), "P:1");
    }

    #[test]
    fn blank_ids_detected() {
        assert!(ElementId::from("   ").is_blank());
        assert!(!ElementId::Int(0).is_blank());
    }

    #[test]
    fn record_decodes_tagged_vertex() {
        let json = r#"{"kind":"vertex","id":"P:1","label":"person",
            "properties":{"name":"Ann Doe","tags":["x","y"],"age":41,"note":null}}"#;
        let record: Record = serde_json::from_str(json).expect("decode");

        let Record::Vertex(v) = record else {
            unreachable!("expected a vertex");
        };
        assert_eq!(v.id, ElementId::from("P:1"));
        assert_eq!(v.properties["name"], PropertyValue::text("Ann Doe"));
        assert_eq!(v.properties["tags"], PropertyValue::text_list(["x", "y"]));
        assert_eq!(v.properties["age"], PropertyValue::Scalar(Scalar::Int(41)));
        assert_eq!(v.properties["note"], PropertyValue::Null);
    }

    #[test]
    fn record_decodes_edge_with_numeric_ids() {
        let json = r#"{"kind":"edge","label":"knows","source_id":1,"source_label":"person",
            "target_id":2,"target_label":"person"}"#;
        let record: Record = serde_json::from_str(json).expect("decode");

        let Record::Edge(e) = record else {
            unreachable!("expected an edge");
        };
        assert_eq!(e.source_id, ElementId::Int(1));
        assert!(e.id.is_none());
        assert!(e.properties.is_empty());
    }

    #[test]
    fn edge_type_key_is_structural() {
        let a = Edge::new("a_b", ("c", "1"), ("d", "2")).type_key();
        let b = Edge::new("a", ("b_c", "1"), ("d", "2")).type_key();
        assert_ne!(a, b);
    }

    #[test]
    fn edge_type_key_lowercase() {
        let key = EdgeTypeKey::new("KNOWS", "Person", "person");
        assert_eq!(key.to_lowercase(), EdgeTypeKey::new("knows", "person", "person"));
    }
}
