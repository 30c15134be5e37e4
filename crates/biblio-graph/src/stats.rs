//! Graph statistics.

use std::collections::BTreeMap;

use biblio_core::{EntityKind, RelKind};
use serde::Serialize;

use crate::error::GraphResult;
use crate::store::GraphStore;

/// Node count per label and relationship count per type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: BTreeMap<EntityKind, usize>,
    pub relationships: BTreeMap<RelKind, usize>,
    pub total_nodes: usize,
    pub total_relationships: usize,
}

impl GraphStats {
    pub async fn collect<S: GraphStore + ?Sized>(store: &S) -> GraphResult<Self> {
        let mut stats = GraphStats::default();
        for kind in EntityKind::ALL {
            let count = store.node_count(kind).await?;
            stats.total_nodes += count;
            stats.nodes.insert(kind, count);
        }
        for rel in RelKind::ALL {
            let count = store.edge_count(rel).await?;
            stats.total_relationships += count;
            stats.relationships.insert(rel, count);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryGraph;
    use biblio_core::{EdgeId, Properties};

    #[tokio::test]
    async fn test_collect_counts_every_kind() {
        let graph = MemoryGraph::new();
        for key in 1..=3 {
            graph.upsert_node(EntityKind::Book, key, &Properties::new()).await.unwrap();
        }
        graph.upsert_node(EntityKind::Category, 1, &Properties::new()).await.unwrap();
        graph.upsert_edge(&EdgeId::new(RelKind::BelongsTo, 2, 1)).await.unwrap();

        let stats = GraphStats::collect(&graph).await.unwrap();
        assert_eq!(stats.nodes[&EntityKind::Book], 3);
        assert_eq!(stats.nodes[&EntityKind::Member], 0);
        assert_eq!(stats.relationships[&RelKind::BelongsTo], 1);
        assert_eq!(stats.total_nodes, 4);
        assert_eq!(stats.total_relationships, 1);
    }
}
