//! Source snapshot to graph materialization.
//!
//! Nodes are upserted per entity kind, with kinds loaded concurrently since
//! they touch disjoint labels. Relationships run only after every node load
//! has committed; an association whose endpoint is absent is recorded as a
//! referential gap and skipped.

pub mod nodes;
pub mod relationships;

use std::collections::BTreeMap;

use biblio_core::{EntityKind, ReferentialGap, RelKind, SourceSnapshot};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GraphResult;
use crate::store::GraphStore;

/// Result of a materialization pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub relationships_created: usize,
    pub relationships_matched: usize,
    /// Records processed per label or relationship type.
    pub counts: BTreeMap<String, usize>,
    pub gaps: Vec<ReferentialGap>,
}

impl SyncResult {
    pub fn merge(&mut self, other: SyncResult) {
        self.nodes_created += other.nodes_created;
        self.nodes_updated += other.nodes_updated;
        self.relationships_created += other.relationships_created;
        self.relationships_matched += other.relationships_matched;
        for (name, count) in other.counts {
            *self.counts.entry(name).or_insert(0) += count;
        }
        self.gaps.extend(other.gaps);
    }
}

async fn load_kind<S: GraphStore + ?Sized>(
    store: &S,
    snapshot: &SourceSnapshot,
    kind: EntityKind,
) -> GraphResult<SyncResult> {
    let mut result = SyncResult::default();
    let projected = nodes::project(snapshot, kind);

    for (key, properties) in &projected {
        if store.upsert_node(kind, *key, properties).await? {
            result.nodes_created += 1;
        } else {
            result.nodes_updated += 1;
        }
    }

    info!(entity = kind.label(), count = projected.len(), "Nodes synced");
    result.counts.insert(kind.label().to_string(), projected.len());
    Ok(result)
}

async fn load_rel<S: GraphStore + ?Sized>(
    store: &S,
    snapshot: &SourceSnapshot,
    rel: RelKind,
) -> GraphResult<SyncResult> {
    let mut result = SyncResult::default();
    let mut linked = 0;

    for edge in relationships::project(snapshot, rel) {
        match store.upsert_edge(&edge).await {
            Ok(true) => result.relationships_created += 1,
            Ok(false) => result.relationships_matched += 1,
            Err(err) => match err.as_gap() {
                Some(gap) => {
                    warn!(relationship = rel.as_str(), %gap, "Skipping edge with missing endpoint");
                    result.gaps.push(gap);
                    continue;
                }
                None => return Err(err),
            },
        }
        linked += 1;
    }

    info!(relationship = rel.as_str(), count = linked, gaps = result.gaps.len(), "Relationships synced");
    result.counts.insert(rel.as_str().to_string(), linked);
    Ok(result)
}

/// Upsert every node in the snapshot, one concurrent worker per entity kind.
///
/// The first store failure (a constraint violation, say) fails the whole
/// pass; already-written nodes stay, and re-running is safe.
pub async fn materialize_nodes<S: GraphStore + ?Sized>(
    store: &S,
    snapshot: &SourceSnapshot,
) -> GraphResult<SyncResult> {
    let results = try_join_all(EntityKind::ALL.into_iter().map(|kind| load_kind(store, snapshot, kind))).await?;

    let mut total = SyncResult::default();
    for result in results {
        total.merge(result);
    }
    info!(
        nodes_created = total.nodes_created,
        nodes_updated = total.nodes_updated,
        "Graph nodes materialized"
    );
    Ok(total)
}

/// Upsert every relationship in the snapshot. Call only after
/// [`materialize_nodes`] has completed.
pub async fn materialize_relationships<S: GraphStore + ?Sized>(
    store: &S,
    snapshot: &SourceSnapshot,
) -> GraphResult<SyncResult> {
    let results = try_join_all(RelKind::ALL.into_iter().map(|rel| load_rel(store, snapshot, rel))).await?;

    let mut total = SyncResult::default();
    for result in results {
        total.merge(result);
    }
    info!(
        relationships_created = total.relationships_created,
        gaps = total.gaps.len(),
        "Graph relationships materialized"
    );
    Ok(total)
}
