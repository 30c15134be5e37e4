//! The graph store boundary.

use async_trait::async_trait;
use biblio_core::{EdgeId, EntityKind, NodeId, Properties, RelKind};
use serde::Serialize;

use crate::error::GraphResult;

/// A node read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub properties: Properties,
}

/// What `clear_all` removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearStats {
    pub nodes_deleted: usize,
    pub relationships_deleted: usize,
}

/// Natural-key upserts and the reads the sampler and statistics need.
///
/// Re-applying the same upserts leaves the store unchanged: nodes merge on
/// `(kind, key)` and edges on `(type, from, to)`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Declare a uniqueness constraint. Repeated calls are no-ops.
    async fn ensure_constraint(&self, kind: EntityKind, property: &str) -> GraphResult<()>;

    /// Create or update a node; `true` when it did not exist before.
    async fn upsert_node(&self, kind: EntityKind, key: i64, properties: &Properties) -> GraphResult<bool>;

    /// Create an edge between two existing nodes; `true` when it is new.
    ///
    /// Fails with `GraphError::MissingEndpoint` when either node is absent.
    async fn upsert_edge(&self, edge: &EdgeId) -> GraphResult<bool>;

    /// Remove every node and edge.
    async fn clear_all(&self) -> GraphResult<ClearStats>;

    async fn node_count(&self, kind: EntityKind) -> GraphResult<usize>;

    async fn edge_count(&self, rel: RelKind) -> GraphResult<usize>;

    /// Natural keys of every node of `kind`, ascending.
    async fn node_keys(&self, kind: EntityKind) -> GraphResult<Vec<i64>>;

    /// Every edge touching any of `nodes`, each reported once, in identity order.
    async fn incident_edges(&self, nodes: &[NodeId]) -> GraphResult<Vec<EdgeId>>;

    /// The stored nodes among `ids`; unknown ids are skipped.
    async fn fetch_nodes(&self, ids: &[NodeId]) -> GraphResult<Vec<GraphNode>>;
}
