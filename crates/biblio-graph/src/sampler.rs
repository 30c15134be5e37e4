//! Bounded, connectivity-preserving subgraph sampling.
//!
//! Kinds small relative to the budget are included whole. The transactional
//! hub kind (loans, by default) is sampled next, each hub admitted together
//! with its enabled neighbours as one unit so rendered chains are complete.
//! Leftover budget goes to nodes adjacent to what is already selected.
//! A hub kind small enough to be included whole still pulls in its
//! neighbours first; large kinds then share what is left. Without an enabled
//! hub, large kinds are sampled independently.
//!
//! The returned edge set only contains edges with both endpoints selected,
//! and the node count never exceeds the budget.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use biblio_core::{EdgeId, EntityKind, NodeId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphResult;
use crate::store::{GraphNode, GraphStore};

/// Hubs whose incident edges are fetched per store round trip.
const HUB_BATCH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Kind through which most relationships flow.
    pub hub: Option<EntityKind>,
    /// A kind is small when its count is at most `budget * small_fraction`.
    pub small_fraction: f64,
    pub default_budget: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            hub: Some(EntityKind::Loan),
            small_fraction: 0.1,
            default_budget: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleRequest {
    pub budget: usize,
    pub kinds: BTreeSet<EntityKind>,
    pub seed: Option<u64>,
}

impl SampleRequest {
    pub fn new(budget: usize, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            budget,
            kinds: kinds.into_iter().collect(),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A transient node/edge set for one render.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SampledSubgraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<EdgeId>,
    /// Hub kind used, if any.
    pub hub: Option<EntityKind>,
    /// Whether enabled nodes were left out to respect the budget.
    pub truncated: bool,
}

impl SampledSubgraph {
    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }
}

/// Insertion-ordered set of selected nodes with a hard budget.
struct Selection {
    order: Vec<NodeId>,
    seen: HashSet<NodeId>,
    budget: usize,
}

impl Selection {
    fn new(budget: usize) -> Self {
        Self {
            order: Vec::new(),
            seen: HashSet::new(),
            budget,
        }
    }

    fn remaining(&self) -> usize {
        self.budget - self.order.len()
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.seen.contains(id)
    }

    /// Add `ids` only if all of them fit.
    fn admit_all(&mut self, ids: &[NodeId]) -> bool {
        let fresh: Vec<NodeId> = ids.iter().filter(|id| !self.seen.contains(id)).copied().collect();
        if fresh.len() > self.remaining() {
            return false;
        }
        for id in fresh {
            self.push(id);
        }
        true
    }

    fn push(&mut self, id: NodeId) -> bool {
        if self.remaining() == 0 || !self.seen.insert(id) {
            return false;
        }
        self.order.push(id);
        true
    }
}

pub struct Sampler<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    config: SamplerConfig,
}

impl<'a, S: GraphStore + ?Sized> Sampler<'a, S> {
    pub fn new(store: &'a S, config: SamplerConfig) -> Self {
        Self { store, config }
    }

    pub async fn sample(&self, request: &SampleRequest) -> GraphResult<SampledSubgraph> {
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut counts = BTreeMap::new();
        for &kind in &request.kinds {
            counts.insert(kind, self.store.node_count(kind).await?);
        }
        let available: usize = counts.values().sum();
        let mut selection = Selection::new(request.budget);

        // Small kinds, smallest first; one that no longer fits is sampled as large.
        let threshold = (request.budget as f64 * self.config.small_fraction).floor() as usize;
        let mut small: Vec<(usize, EntityKind)> = counts
            .iter()
            .filter(|(_, &count)| count <= threshold)
            .map(|(&kind, &count)| (count, kind))
            .collect();
        small.sort();

        let mut large: Vec<EntityKind> = counts
            .iter()
            .filter(|(_, &count)| count > threshold)
            .map(|(&kind, _)| kind)
            .collect();

        for (count, kind) in small {
            if count <= selection.remaining() {
                for key in self.store.node_keys(kind).await? {
                    selection.push(NodeId::new(kind, key));
                }
            } else {
                large.push(kind);
            }
        }

        let hub = self.config.hub.filter(|hub| request.kinds.contains(hub));
        match hub {
            Some(hub) if large.contains(&hub) => {
                self.sample_hubs(hub, &request.kinds, &mut selection, &mut rng).await?;
                self.fill_adjacent(hub, &request.kinds, &mut selection, &mut rng).await?;
            }
            Some(hub) => {
                self.sample_hubs(hub, &request.kinds, &mut selection, &mut rng).await?;
                large.sort();
                self.sample_independent(&large, &mut selection, &mut rng).await?;
            }
            None => {
                large.sort();
                self.sample_independent(&large, &mut selection, &mut rng).await?;
            }
        }

        let selected: HashSet<NodeId> = selection.order.iter().copied().collect();
        let edges: Vec<EdgeId> = self
            .store
            .incident_edges(&selection.order)
            .await?
            .into_iter()
            .filter(|e| selected.contains(&e.from) && selected.contains(&e.to))
            .collect();
        let nodes = self.store.fetch_nodes(&selection.order).await?;

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            budget = request.budget,
            hub = ?hub,
            "Sampled subgraph"
        );
        Ok(SampledSubgraph {
            truncated: nodes.len() < available,
            nodes,
            edges,
            hub,
        })
    }

    /// Admit each hub with its enabled neighbours, or not at all. Hubs
    /// already selected only bring in their neighbours.
    async fn sample_hubs(
        &self,
        hub: EntityKind,
        enabled: &BTreeSet<EntityKind>,
        selection: &mut Selection,
        rng: &mut StdRng,
    ) -> GraphResult<()> {
        let mut keys = self.store.node_keys(hub).await?;
        keys.shuffle(rng);

        for batch in keys.chunks(HUB_BATCH) {
            if selection.remaining() == 0 {
                break;
            }
            let hubs: Vec<NodeId> = batch.iter().map(|&key| NodeId::new(hub, key)).collect();
            let edges = self.store.incident_edges(&hubs).await?;

            for id in hubs {
                let mut unit = vec![id];
                unit.extend(
                    edges
                        .iter()
                        .filter_map(|e| e.other(&id))
                        .filter(|n| enabled.contains(&n.kind)),
                );
                selection.admit_all(&unit);
                if selection.remaining() == 0 {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Non-hub neighbours of the selection; hubs only enter with their chain.
    async fn fill_adjacent(
        &self,
        hub: EntityKind,
        enabled: &BTreeSet<EntityKind>,
        selection: &mut Selection,
        rng: &mut StdRng,
    ) -> GraphResult<()> {
        if selection.remaining() == 0 || selection.order.is_empty() {
            return Ok(());
        }
        let edges = self.store.incident_edges(&selection.order).await?;
        let mut candidates: Vec<NodeId> = edges
            .iter()
            .flat_map(|e| [e.from, e.to])
            .filter(|n| n.kind != hub && enabled.contains(&n.kind) && !selection.contains(n))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        candidates.shuffle(rng);

        for id in candidates {
            if !selection.push(id) && selection.remaining() == 0 {
                break;
            }
        }
        Ok(())
    }

    async fn sample_independent(
        &self,
        kinds: &[EntityKind],
        selection: &mut Selection,
        rng: &mut StdRng,
    ) -> GraphResult<()> {
        if kinds.is_empty() {
            return Ok(());
        }
        let share = selection.remaining() / kinds.len();
        let mut extra = selection.remaining() % kinds.len();

        for &kind in kinds {
            let quota = share + usize::from(extra > 0);
            extra = extra.saturating_sub(1);

            let mut keys = self.store.node_keys(kind).await?;
            keys.shuffle(rng);
            let mut taken = 0;
            for key in keys {
                if taken == quota {
                    break;
                }
                if selection.push(NodeId::new(kind, key)) {
                    taken += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryGraph;
    use biblio_core::{Properties, RelKind};

    /// `members` members, `books` books, one staff member, and `loans` loans
    /// cycling through members and books.
    async fn library(members: i64, books: i64, loans: i64) -> MemoryGraph {
        let graph = MemoryGraph::new();
        let empty = Properties::new();
        for key in 1..=members {
            graph.upsert_node(EntityKind::Member, key, &empty).await.unwrap();
        }
        for key in 1..=books {
            graph.upsert_node(EntityKind::Book, key, &empty).await.unwrap();
        }
        graph.upsert_node(EntityKind::Staff, 1, &empty).await.unwrap();
        for key in 1..=loans {
            graph.upsert_node(EntityKind::Loan, key, &empty).await.unwrap();
            let member = (key - 1) % members + 1;
            let book = (key - 1) % books + 1;
            graph.upsert_edge(&EdgeId::new(RelKind::Borrowed, member, key)).await.unwrap();
            graph.upsert_edge(&EdgeId::new(RelKind::Contains, key, book)).await.unwrap();
            graph.upsert_edge(&EdgeId::new(RelKind::ProcessedBy, key, 1)).await.unwrap();
        }
        graph
    }

    fn assert_closed(sample: &SampledSubgraph) {
        let ids = sample.node_ids();
        for edge in &sample.edges {
            assert!(ids.contains(&edge.from) && ids.contains(&edge.to), "dangling {edge}");
        }
    }

    #[tokio::test]
    async fn test_hub_sample_respects_budget_and_closure() {
        let graph = library(40, 60, 200).await;
        let request = SampleRequest::new(
            50,
            [EntityKind::Member, EntityKind::Book, EntityKind::Loan, EntityKind::Staff],
        )
        .with_seed(11);
        let sample = Sampler::new(&graph, SamplerConfig::default()).sample(&request).await.unwrap();

        assert!(sample.nodes.len() <= 50);
        assert_eq!(sample.hub, Some(EntityKind::Loan));
        assert!(sample.truncated);
        assert_closed(&sample);

        // Staff is small and always present; every sampled loan keeps its chain.
        let ids = sample.node_ids();
        assert!(ids.contains(&NodeId::new(EntityKind::Staff, 1)));
        for loan in ids.iter().filter(|id| id.kind == EntityKind::Loan) {
            let member = (loan.key - 1) % 40 + 1;
            let book = (loan.key - 1) % 60 + 1;
            assert!(ids.contains(&NodeId::new(EntityKind::Member, member)));
            assert!(ids.contains(&NodeId::new(EntityKind::Book, book)));
        }
    }

    #[tokio::test]
    async fn test_small_hub_kind_keeps_its_chains() {
        // Eight loans are below the small threshold of a 100-node budget.
        let graph = library(200, 200, 8).await;
        let request = SampleRequest::new(100, [EntityKind::Member, EntityKind::Book, EntityKind::Loan])
            .with_seed(1);
        let sample = Sampler::new(&graph, SamplerConfig::default()).sample(&request).await.unwrap();

        assert_eq!(sample.hub, Some(EntityKind::Loan));
        assert_eq!(sample.nodes.len(), 100);
        assert_closed(&sample);

        let ids = sample.node_ids();
        for key in 1..=8 {
            assert!(ids.contains(&NodeId::new(EntityKind::Loan, key)));
            assert!(ids.contains(&NodeId::new(EntityKind::Member, key)), "loan {key} lost its member");
            assert!(ids.contains(&NodeId::new(EntityKind::Book, key)), "loan {key} lost its book");
        }
        assert_eq!(sample.edges.len(), 16);
    }

    #[tokio::test]
    async fn test_seeded_sample_is_reproducible() {
        let graph = library(20, 20, 80).await;
        let request = SampleRequest::new(30, EntityKind::ALL).with_seed(3);
        let sampler = Sampler::new(&graph, SamplerConfig::default());
        let a = sampler.sample(&request).await.unwrap();
        let b = sampler.sample(&request).await.unwrap();
        assert_eq!(a.node_ids(), b.node_ids());
        assert_eq!(a.edges, b.edges);
    }

    #[tokio::test]
    async fn test_everything_fits_when_budget_is_large() {
        let graph = library(3, 3, 5).await;
        let request = SampleRequest::new(100, EntityKind::ALL).with_seed(1);
        let sample = Sampler::new(&graph, SamplerConfig::default()).sample(&request).await.unwrap();
        assert_eq!(sample.nodes.len(), 12);
        assert_eq!(sample.edges.len(), 15);
        assert!(!sample.truncated);
    }

    #[tokio::test]
    async fn test_without_hub_large_kinds_share_budget() {
        let graph = library(30, 30, 60).await;
        let request = SampleRequest::new(20, [EntityKind::Member, EntityKind::Book]).with_seed(5);
        let sample = Sampler::new(&graph, SamplerConfig::default()).sample(&request).await.unwrap();

        assert_eq!(sample.hub, None);
        let ids = sample.node_ids();
        assert_eq!(ids.iter().filter(|id| id.kind == EntityKind::Member).count(), 10);
        assert_eq!(ids.iter().filter(|id| id.kind == EntityKind::Book).count(), 10);
        // Members and books are not directly related.
        assert!(sample.edges.is_empty());
    }

    #[tokio::test]
    async fn test_unseeded_sample_still_closed() {
        let graph = library(25, 25, 120).await;
        for budget in [0, 1, 7, 33] {
            let request = SampleRequest::new(budget, EntityKind::ALL);
            let sample = Sampler::new(&graph, SamplerConfig::default()).sample(&request).await.unwrap();
            assert!(sample.nodes.len() <= budget);
            assert_closed(&sample);
        }
    }
}
