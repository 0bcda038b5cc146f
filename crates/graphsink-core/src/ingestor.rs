//! # Ingestor Module
//!
//! Record validation and partitioning ahead of the writers.
//!
//! - Reject malformed records before anything reaches a file
//! - Split a record stream into vertices and edges, preserving order
//! - No enrichment: records are passed through untouched

use crate::primitives::MAX_LABEL_LENGTH;
use crate::{Edge, GraphSinkError, Properties, Record, Vertex};

/// Records of one input, split by variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitioned {
    pub vertices: Vec<Record>,
    pub edges: Vec<Record>,
}

impl Partitioned {
    pub fn len(&self) -> usize {
        self.vertices.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }
}

/// The Ingestor validates records and partitions them for the writers.
pub struct Ingestor;

impl Ingestor {
    /// Validate a record.
    ///
    /// A record is valid if:
    /// - Every label is non-empty and within `MAX_LABEL_LENGTH`
    /// - Every identifier is non-blank
    /// - Every property key is non-empty and within `MAX_LABEL_LENGTH`
    pub fn validate(record: &Record) -> Result<(), GraphSinkError> {
        match record {
            Record::Vertex(v) => Self::validate_vertex(v),
            Record::Edge(e) => Self::validate_edge(e),
        }
    }

    fn validate_vertex(v: &Vertex) -> Result<(), GraphSinkError> {
        check_label("vertex label", &v.label)?;
        if v.id.is_blank() {
            return Err(GraphSinkError::InvalidRecord(format!(
                "vertex of label {:?} has a blank id",
                v.label
            )));
        }
        check_keys(&v.properties)
    }

    fn validate_edge(e: &Edge) -> Result<(), GraphSinkError> {
        check_label("edge label", &e.label)?;
        check_label("source label", &e.source_label)?;
        check_label("target label", &e.target_label)?;
        if e.source_id.is_blank() || e.target_id.is_blank() {
            return Err(GraphSinkError::InvalidRecord(format!(
                "edge {} has a blank endpoint id",
                e.type_key()
            )));
        }
        check_keys(&e.properties)
    }

    /// Validate every record and split them into vertices and edges.
    ///
    /// Stops at the first invalid record; its position is in the error.
    pub fn partition(records: Vec<Record>) -> Result<Partitioned, GraphSinkError> {
        let mut out = Partitioned::default();
        for (index, record) in records.into_iter().enumerate() {
            Self::validate(&record).map_err(|e| match e {
                GraphSinkError::InvalidRecord(msg) => {
                    GraphSinkError::InvalidRecord(format!("record {index}: {msg}"))
                }
                other => other,
            })?;
            match record {
                Record::Vertex(_) => out.vertices.push(record),
                Record::Edge(_) => out.edges.push(record),
            }
        }
        Ok(out)
    }
}

fn check_label(what: &str, label: &str) -> Result<(), GraphSinkError> {
    if label.trim().is_empty() {
        return Err(GraphSinkError::InvalidRecord(format!("{what} is empty")));
    }
    if label.len() > MAX_LABEL_LENGTH {
        return Err(GraphSinkError::InvalidRecord(format!(
            "{what} exceeds {MAX_LABEL_LENGTH} bytes"
        )));
    }
    Ok(())
}

fn check_keys(properties: &Properties) -> Result<(), GraphSinkError> {
    properties
        .keys()
        .try_for_each(|key| check_label("property key", key))
}

// =============================================================================
// TESTS
// =============================================================================
