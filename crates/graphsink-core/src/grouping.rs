//! # Grouping Engine
//!
//! Partitions a batch of records into one group per output target: vertices
//! by label, edges by their structured type key. Order inside a group is the
//! order of the batch.

use crate::{Edge, EdgeTypeKey, Record, Vertex};
use std::collections::BTreeMap;

/// How labels are folded before they become group keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelCase {
    /// Use labels exactly as the loader produced them.
    #[default]
    Preserve,
    /// Lowercase labels (Neo4j CSV output).
    Lower,
}

impl LabelCase {
    fn apply(self, label: &str) -> String {
        match self {
            Self::Preserve => label.to_string(),
            Self::Lower => label.to_lowercase(),
        }
    }
}

/// Elements of one batch grouped by key, plus the count of records of the
/// other variant that were passed in by mistake.
#[derive(Debug)]
pub struct Grouped<'a, K, T> {
    pub groups: BTreeMap<K, Vec<&'a T>>,
    pub mismatched: usize,
}

impl<K, T> Grouped<'_, K, T> {
    /// Total number of grouped elements.
    pub fn element_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Group the vertices of a batch by (folded) label.
pub fn group_vertices_by_label(records: &[Record], case: LabelCase) -> Grouped<'_, String, Vertex> {
    let mut groups: BTreeMap<String, Vec<&Vertex>> = BTreeMap::new();
    let mut mismatched = 0;

    for record in records {
        match record {
            Record::Vertex(v) => groups.entry(case.apply(&v.label)).or_default().push(v),
            Record::Edge(_) => mismatched += 1,
        }
    }

    Grouped { groups, mismatched }
}

/// Group the edges of a batch by type key, with each component folded.
pub fn group_edges_by_type(records: &[Record], case: LabelCase) -> Grouped<'_, EdgeTypeKey, Edge> {
    let mut groups: BTreeMap<EdgeTypeKey, Vec<&Edge>> = BTreeMap::new();
    let mut mismatched = 0;

    for record in records {
        match record {
            Record::Edge(e) => {
                let key = match case {
                    LabelCase::Preserve => e.type_key(),
                    LabelCase::Lower => e.type_key().to_lowercase(),
                };
                groups.entry(key).or_default().push(e);
            }
            Record::Vertex(_) => mismatched += 1,
        }
    }

    Grouped { groups, mismatched }
}

/// Group the edges of a batch by label alone (MeTTa shares one file per label).
pub fn group_edges_by_label(records: &[Record], case: LabelCase) -> Grouped<'_, String, Edge> {
    let mut groups: BTreeMap<String, Vec<&Edge>> = BTreeMap::new();
    let mut mismatched = 0;

    for record in records {
        match record {
            Record::Edge(e) => groups.entry(case.apply(&e.label)).or_default().push(e),
            Record::Vertex(_) => mismatched += 1,
        }
    }

    Grouped { groups, mismatched }
}

// =============================================================================
// TESTS
// =============================================================================
