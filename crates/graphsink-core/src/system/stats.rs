//! # Writer Statistics
//!
//! Per-label and per-edge-type occurrence counters.

use crate::EdgeTypeKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Count of edges written for one edge type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTypeCount {
    #[serde(flatten)]
    pub key: EdgeTypeKey,
    pub count: u64,
}

/// Point-in-time copy of a writer's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterStats {
    pub node_count: u64,
    pub edge_count: u64,
    /// Records not written (unknown endpoints, wrong record variant).
    pub skipped: u64,
    pub vertices_by_label: BTreeMap<String, u64>,
    /// Sorted by type key.
    pub edges_by_type: Vec<EdgeTypeCount>,
}

impl WriterStats {
    /// Labels ordered by descending vertex count, ties by name.
    pub fn top_labels(&self) -> Vec<(&str, u64)> {
        let mut labels: Vec<(&str, u64)> = self
            .vertices_by_label
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        labels.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        labels
    }

    /// Edge types ordered by descending count, ties by key.
    pub fn top_edge_types(&self) -> Vec<&EdgeTypeCount> {
        let mut types: Vec<&EdgeTypeCount> = self.edges_by_type.iter().collect();
        types.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        types
    }
}

// =============================================================================
// COLLECTOR
// =============================================================================

#[derive(Debug, Default)]
struct Counters {
    vertices: BTreeMap<String, u64>,
    edges: BTreeMap<EdgeTypeKey, u64>,
    skipped: u64,
}

/// Thread-safe counters shared by the threads calling one writer.
#[derive(Debug, Default)]
pub struct StatsCollector {
    counters: Mutex<Counters>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Counters) -> R) -> R {
        // Counters stay meaningful after a panic elsewhere; keep using them.
        let mut guard = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn record_vertices(&self, label: &str, n: usize) {
        self.with(|c| {
            let slot = c.vertices.entry(label.to_string()).or_insert(0);
            *slot = slot.saturating_add(n as u64);
        });
    }

    pub fn record_edges(&self, key: &EdgeTypeKey, n: usize) {
        self.with(|c| {
            let slot = c.edges.entry(key.clone()).or_insert(0);
            *slot = slot.saturating_add(n as u64);
        });
    }

    pub fn record_skipped(&self, n: usize) {
        self.with(|c| c.skipped = c.skipped.saturating_add(n as u64));
    }

    pub fn snapshot(&self) -> WriterStats {
        self.with(|c| WriterStats {
            node_count: c.vertices.values().sum(),
            edge_count: c.edges.values().sum(),
            skipped: c.skipped,
            vertices_by_label: c.vertices.clone(),
            edges_by_type: c
                .edges
                .iter()
                .map(|(key, count)| EdgeTypeCount {
                    key: key.clone(),
                    count: *count,
                })
                .collect(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = StatsCollector::new();
        stats.record_vertices("gene", 2);
        stats.record_vertices("gene", 3);
        stats.record_vertices("protein", 1);
        stats.record_edges(&EdgeTypeKey::new("binds", "protein", "gene"), 4);
        stats.record_skipped(1);

        let snap = stats.snapshot();
        assert_eq!(snap.node_count, 6);
        assert_eq!(snap.edge_count, 4);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.vertices_by_label["gene"], 5);
    }

    #[test]
    fn top_labels_sorted_by_count() {
        let stats = StatsCollector::new();
        stats.record_vertices("a", 1);
        stats.record_vertices("b", 5);
        stats.record_vertices("c", 5);

        let snap = stats.snapshot();
        assert_eq!(snap.top_labels(), vec![("b", 5), ("c", 5), ("a", 1)]);
    }

    #[test]
    fn edge_counts_serialize_flat() {
        let stats = StatsCollector::new();
        stats.record_edges(&EdgeTypeKey::new("binds", "protein", "gene"), 2);

        let json = serde_json::to_value(stats.snapshot()).expect("encode");
        assert_eq!(json["edges_by_type"][0]["label"], "binds");
        assert_eq!(json["edges_by_type"][0]["source_label"], "protein");
        assert_eq!(json["edges_by_type"][0]["count"], 2);
    }
}
