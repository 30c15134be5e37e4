//! # Biblio Graph
//!
//! Property-graph side of the library sync.
//!
//! Materializes source records into nodes and relationships through the
//! [`GraphStore`] boundary, prepares uniqueness constraints, reports
//! statistics, and samples bounded, connected subgraphs for rendering.
//! [`GraphClient`] is the Neo4j-backed store; [`MemoryGraph`] keeps
//! everything in process.

pub mod client;
pub mod error;
pub mod memory;
pub mod neo4j;
pub mod sampler;
pub mod schema;
pub mod stats;
pub mod store;
pub mod sync;

pub use client::{GraphClient, GraphConfig};
pub use error::{GraphError, GraphResult};
pub use memory::MemoryGraph;
pub use sampler::{SampleRequest, SampledSubgraph, Sampler, SamplerConfig};
pub use schema::prepare_schema;
pub use stats::GraphStats;
pub use store::{ClearStats, GraphNode, GraphStore};
pub use sync::{materialize_nodes, materialize_relationships, SyncResult};
