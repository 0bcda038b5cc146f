//! # Property-Based Tests
//!
//! Invariants of the pure transforms, checked with proptest.

use graphsink_core::grouping::{group_edges_by_type, group_vertices_by_label};
use graphsink_core::normalize::{symbolic_scalar, tabular_scalar};
use graphsink_core::{Edge, LabelCase, Record, Vertex, normalize_id};
use proptest::collection::vec;
use proptest::prelude::*;

fn record_strategy() -> impl Strategy<Value = Record> {
    prop_oneof![
        ("[a-z0-9]{1,6}", "[a-c]").prop_map(|(id, label)| Vertex::new(id, label).into()),
        ("[a-b]", "[a-c]", "[a-c]").prop_map(|(label, src, tgt)| {
            Edge::new(label, (src, "1"), (tgt, "2")).into()
        }),
    ]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Tabular sanitization is a fixed point after one pass.
    #[test]
    fn tabular_normalization_idempotent(raw in "\\PC{0,40}", max in proptest::option::of(1usize..30)) {
        let once = tabular_scalar(&raw, max);
        prop_assert_eq!(tabular_scalar(&once, max), once.clone());
        prop_assert!(!once.contains(['|', ';', '"', '\'', '\n']));
    }

    /// Symbolic sanitization is a fixed point after one pass.
    #[test]
    fn symbolic_normalization_idempotent(raw in "[a-zA-Z0-9 ()\\\\|;'\"_-]{0,40}", max in proptest::option::of(1usize..30)) {
        let once = symbolic_scalar(&raw, max);
        prop_assert_eq!(symbolic_scalar(&once, max), once.clone());
        prop_assert!(!once.contains([' ', '|', ';', '"', '\'']));
        prop_assert!(!once.ends_with('\\'));
    }

    /// Identifier normalization is idempotent and case-insensitive.
    #[test]
    fn id_normalization_idempotent(raw in "[a-zA-Z0-9 :_]{1,30}") {
        let once = normalize_id(&raw);
        prop_assert_eq!(normalize_id(&once), once.clone());
        prop_assert_eq!(normalize_id(&raw.to_uppercase()), once.clone());
        prop_assert!(!once.contains([' ', ':']));
    }

    /// Grouping loses nothing and keeps batch order inside each group.
    #[test]
    fn grouping_preserves_count_and_order(records in vec(record_strategy(), 0..60)) {
        let vertices = group_vertices_by_label(&records, LabelCase::Preserve);
        let edges = group_edges_by_type(&records, LabelCase::Preserve);

        prop_assert_eq!(vertices.element_count() + vertices.mismatched, records.len());
        prop_assert_eq!(vertices.element_count(), edges.mismatched);
        prop_assert_eq!(edges.element_count() + edges.mismatched, records.len());

        for (label, group) in &vertices.groups {
            let expected: Vec<&Vertex> = records
                .iter()
                .filter_map(|r| match r {
                    Record::Vertex(v) if &v.label == label => Some(v),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(group, &expected);
        }
    }
}
