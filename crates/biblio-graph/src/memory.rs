//! In-process graph store.
//!
//! Holds nodes and edges in ordered maps behind one lock, so every read is
//! deterministic. Declared constraints are enforced on upsert the way Neo4j
//! enforces them: a second node of the same kind with an equal non-null
//! value for a constrained property is rejected.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use biblio_core::{EdgeId, EntityKind, NodeId, Properties, PropertyValue, RelKind};
use tokio::sync::RwLock;

use crate::error::{GraphError, GraphResult};
use crate::store::{ClearStats, GraphNode, GraphStore};

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<NodeId, Properties>,
    edges: BTreeSet<EdgeId>,
    constraints: BTreeSet<(EntityKind, String)>,
}

impl Inner {
    fn check_constraints(&self, id: NodeId, properties: &Properties) -> GraphResult<()> {
        let key_property = id.kind.key_property();
        if let Some(value) = properties.get(key_property) {
            if value.as_int() != Some(id.key) {
                return Err(GraphError::constraint(
                    id,
                    format!("{key_property} = {value} conflicts with the node key"),
                ));
            }
        }

        for (kind, property) in &self.constraints {
            if *kind != id.kind || property == key_property {
                continue;
            }
            let Some(value) = properties.get(property).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self
                .nodes
                .range(NodeId::new(id.kind, i64::MIN)..=NodeId::new(id.kind, i64::MAX))
                .any(|(other, props)| *other != id && props.get(property) == Some(value));
            if clash {
                return Err(GraphError::constraint(
                    id,
                    format!("{}.{property} = {value} already exists", id.kind.label()),
                ));
            }
        }
        Ok(())
    }
}

/// [`GraphStore`] kept entirely in memory.
#[derive(Default)]
pub struct MemoryGraph {
    inner: RwLock<Inner>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edges whose endpoints are not both stored; empty for a consistent graph.
    pub async fn dangling_edges(&self) -> Vec<EdgeId> {
        let inner = self.inner.read().await;
        inner
            .edges
            .iter()
            .filter(|e| !inner.nodes.contains_key(&e.from) || !inner.nodes.contains_key(&e.to))
            .copied()
            .collect()
    }

    pub async fn constraints(&self) -> Vec<(EntityKind, String)> {
        self.inner.read().await.constraints.iter().cloned().collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ensure_constraint(&self, kind: EntityKind, property: &str) -> GraphResult<()> {
        self.inner.write().await.constraints.insert((kind, property.to_string()));
        Ok(())
    }

    async fn upsert_node(&self, kind: EntityKind, key: i64, properties: &Properties) -> GraphResult<bool> {
        let id = NodeId::new(kind, key);
        let mut inner = self.inner.write().await;
        inner.check_constraints(id, properties)?;

        let mut stored = properties.clone();
        stored.insert(kind.key_property().to_string(), PropertyValue::Int(key));
        // Null clears a property, matching `SET n.p = null`.
        stored.retain(|_, v| !v.is_null());

        match inner.nodes.entry(id) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                for (name, value) in properties {
                    if value.is_null() {
                        existing.remove(name);
                    }
                }
                existing.extend(stored);
                Ok(false)
            }
            Entry::Vacant(entry) => {
                entry.insert(stored);
                Ok(true)
            }
        }
    }

    async fn upsert_edge(&self, edge: &EdgeId) -> GraphResult<bool> {
        let mut inner = self.inner.write().await;
        for endpoint in [edge.from, edge.to] {
            if !inner.nodes.contains_key(&endpoint) {
                return Err(GraphError::MissingEndpoint {
                    edge: *edge,
                    missing: endpoint,
                });
            }
        }
        Ok(inner.edges.insert(*edge))
    }

    async fn clear_all(&self) -> GraphResult<ClearStats> {
        let mut inner = self.inner.write().await;
        let stats = ClearStats {
            nodes_deleted: inner.nodes.len(),
            relationships_deleted: inner.edges.len(),
        };
        inner.nodes.clear();
        inner.edges.clear();
        Ok(stats)
    }

    async fn node_count(&self, kind: EntityKind) -> GraphResult<usize> {
        Ok(self.inner.read().await.nodes.keys().filter(|id| id.kind == kind).count())
    }

    async fn edge_count(&self, rel: RelKind) -> GraphResult<usize> {
        Ok(self.inner.read().await.edges.iter().filter(|e| e.rel == rel).count())
    }

    async fn node_keys(&self, kind: EntityKind) -> GraphResult<Vec<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .keys()
            .filter(|id| id.kind == kind)
            .map(|id| id.key)
            .collect())
    }

    async fn incident_edges(&self, nodes: &[NodeId]) -> GraphResult<Vec<EdgeId>> {
        let wanted: BTreeSet<&NodeId> = nodes.iter().collect();
        let inner = self.inner.read().await;
        Ok(inner
            .edges
            .iter()
            .filter(|e| wanted.contains(&e.from) || wanted.contains(&e.to))
            .copied()
            .collect())
    }

    async fn fetch_nodes(&self, ids: &[NodeId]) -> GraphResult<Vec<GraphNode>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                inner.nodes.get(id).map(|properties| GraphNode {
                    id: *id,
                    properties: properties.clone(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, PropertyValue)]) -> Properties {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    async fn stored(graph: &MemoryGraph, id: NodeId) -> Properties {
        let mut nodes = graph.fetch_nodes(&[id]).await.unwrap();
        nodes.pop().unwrap().properties
    }

    #[tokio::test]
    async fn test_upsert_node_merges_by_identity() {
        let graph = MemoryGraph::new();
        let first = props(&[("name", "Jane Austen".into())]);
        assert!(graph.upsert_node(EntityKind::Author, 2, &first).await.unwrap());
        let second = props(&[("name", "J. Austen".into())]);
        assert!(!graph.upsert_node(EntityKind::Author, 2, &second).await.unwrap());

        assert_eq!(graph.node_count(EntityKind::Author).await.unwrap(), 1);
        let stored = stored(&graph, NodeId::new(EntityKind::Author, 2)).await;
        assert_eq!(stored["name"], PropertyValue::from("J. Austen"));
        assert_eq!(stored["id"], PropertyValue::Int(2));
    }

    #[tokio::test]
    async fn test_null_property_is_removed() {
        let graph = MemoryGraph::new();
        graph
            .upsert_node(EntityKind::Member, 1, &props(&[("phone", "555-1234".into())]))
            .await
            .unwrap();
        graph
            .upsert_node(EntityKind::Member, 1, &props(&[("phone", PropertyValue::Null)]))
            .await
            .unwrap();
        let stored = stored(&graph, NodeId::new(EntityKind::Member, 1)).await;
        assert!(!stored.contains_key("phone"));
    }

    #[tokio::test]
    async fn test_declared_constraint_rejects_duplicate_value() {
        let graph = MemoryGraph::new();
        graph.ensure_constraint(EntityKind::Book, "isbn").await.unwrap();
        graph
            .upsert_node(EntityKind::Book, 1, &props(&[("isbn", "978-0".into())]))
            .await
            .unwrap();

        let err = graph
            .upsert_node(EntityKind::Book, 2, &props(&[("isbn", "978-0".into())]))
            .await
            .unwrap_err();
        match err {
            GraphError::ConstraintViolation { identity, .. } => assert_eq!(identity, "Book#2"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_conflicting_key_property_is_rejected() {
        let graph = MemoryGraph::new();
        let err = graph
            .upsert_node(EntityKind::Loan, 5, &props(&[("id", PropertyValue::Int(6))]))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::ConstraintViolation { .. }));
    }

    #[tokio::test]
    async fn test_edge_requires_both_endpoints() {
        let graph = MemoryGraph::new();
        graph.upsert_node(EntityKind::Author, 1, &Properties::new()).await.unwrap();
        let edge = EdgeId::new(RelKind::Wrote, 1, 10);

        let err = graph.upsert_edge(&edge).await.unwrap_err();
        assert!(matches!(err, GraphError::MissingEndpoint { missing, .. } if missing.key == 10));

        graph.upsert_node(EntityKind::Book, 10, &Properties::new()).await.unwrap();
        assert!(graph.upsert_edge(&edge).await.unwrap());
        assert!(!graph.upsert_edge(&edge).await.unwrap());
        assert_eq!(graph.edge_count(RelKind::Wrote).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_reports_deleted() {
        let graph = MemoryGraph::new();
        graph.upsert_node(EntityKind::Author, 1, &Properties::new()).await.unwrap();
        graph.upsert_node(EntityKind::Book, 1, &Properties::new()).await.unwrap();
        graph.upsert_edge(&EdgeId::new(RelKind::Wrote, 1, 1)).await.unwrap();

        let stats = graph.clear_all().await.unwrap();
        assert_eq!(stats, ClearStats { nodes_deleted: 2, relationships_deleted: 1 });
        assert_eq!(graph.node_count(EntityKind::Book).await.unwrap(), 0);
    }
}
