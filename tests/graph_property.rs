#[macro_use]
extern crate proptest;

use proptest::prelude::prop;

use blockweave::store::{GraphError, GraphStore};
use blockweave::types::{BlockKind, NodeId, Position};

/// Generate a sequence of candidate edges over `n` nodes as index pairs.
/// Self-loops are included on purpose; the store must refuse them.
fn edge_attempts(n: usize) -> impl proptest::strategy::Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..n, 0..n), 0..64)
}

fn seeded_store(n: usize) -> (GraphStore, Vec<NodeId>) {
    let store = GraphStore::new();
    let ids = (0..n)
        .map(|_| store.add_node(BlockKind::Text, Position::default()))
        .collect();
    (store, ids)
}

proptest! {
    /// No sequence of connect attempts can introduce a cycle: after any
    /// prefix of accepted edges, no node is its own ancestor.
    #[test]
    fn prop_store_stays_acyclic(attempts in edge_attempts(8)) {
        let (store, ids) = seeded_store(8);
        for (source, target) in attempts {
            let _ = store.connect(&ids[source], &ids[target]);
            let lineage = store.lineage(&ids[target]);
            prop_assert!(!lineage.ancestors.contains(&ids[target]));
        }
        for id in &ids {
            let lineage = store.lineage(id);
            prop_assert!(!lineage.ancestors.contains(id));
            prop_assert!(!lineage.descendants.contains(id));
        }
    }

    /// Rejected edges leave the store untouched: the edge count only grows
    /// on Ok, and a duplicate of an accepted edge is always refused.
    #[test]
    fn prop_rejections_do_not_mutate(attempts in edge_attempts(6)) {
        let (store, ids) = seeded_store(6);
        for (source, target) in attempts {
            let before = store.edges().len();
            match store.connect(&ids[source], &ids[target]) {
                Ok(_) => {
                    prop_assert_eq!(store.edges().len(), before + 1);
                    prop_assert!(
                        matches!(
                            store.connect(&ids[source], &ids[target]),
                            Err(GraphError::DuplicateEdge { .. })
                        ),
                        "duplicate edge must be refused"
                    );
                }
                Err(_) => prop_assert_eq!(store.edges().len(), before),
            }
        }
    }
}
