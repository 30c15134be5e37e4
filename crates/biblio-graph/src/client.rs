//! Neo4j connection client.

use neo4rs::{ConfigBuilder, Graph, Query};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{GraphError, GraphResult};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
            max_connections: 8,
        }
    }
}

/// Handle to one Neo4j database, built once per run and shared by reference.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect and verify the server answers.
    ///
    /// neo4rs creates its pool lazily, so a `RETURN 1` ping forces the bolt
    /// handshake and an unreachable server fails here instead of mid-load.
    pub async fn connect(config: &GraphConfig) -> GraphResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections.max(1))
            .fetch_size(500)
            .build()?;

        let graph = Graph::connect(neo4j_config).await?;
        graph.run(Query::new("RETURN 1".to_string())).await?;
        debug!(uri = %config.uri, database = %config.database, "Connected to Neo4j");

        Ok(Self { graph })
    }

    /// Run a Cypher statement that returns no rows.
    pub async fn execute(&self, query: Query) -> GraphResult<()> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Run a Cypher query and collect every row.
    pub async fn query(&self, query: Query) -> GraphResult<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// First row's `field`, or `None` when the query returned nothing.
    pub async fn query_scalar<T: DeserializeOwned>(&self, query: Query, field: &str) -> GraphResult<Option<T>> {
        let rows = self.query(query).await?;
        match rows.into_iter().next() {
            Some(row) => row.get(field).map(Some).map_err(|e| GraphError::decode(field, e)),
            None => Ok(None),
        }
    }
}
