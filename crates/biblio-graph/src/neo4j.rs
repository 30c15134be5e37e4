//! [`GraphStore`] over Neo4j.
//!
//! Upserts use Cypher `MERGE` on the natural key, so the store itself
//! guarantees one node per identity once the uniqueness constraints exist.
//! Labels, relationship types and property names are spliced into the query
//! text (Cypher cannot parameterize them); they come from closed enums or
//! are checked by [`validate_property`]. Values always travel as parameters.
//! Ad-hoc reads go through [`ensure_read_only`] before they reach the server.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use biblio_core::{EdgeId, EntityKind, NodeId, Properties, PropertyValue, RelKind};
use neo4rs::{BoltNull, BoltType, Query};
use tracing::debug;

use crate::client::GraphClient;
use crate::error::{GraphError, GraphResult};
use crate::store::{ClearStats, GraphNode, GraphStore};

/// Cypher property names this store accepts.
pub fn validate_property(name: &str) -> GraphResult<&str> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(GraphError::InvalidProperty(name.to_string()))
    }
}

/// Clauses and procedures that can change the graph.
const WRITE_CLAUSES: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "FOREACH", "LOAD", "CALL",
];

/// Reject Cypher that could write. Keywords inside string literals, backtick
/// identifiers and `//` comments are ignored, as are words used as property
/// keys, labels or parameters (`n.set`, `:Set`, `$set`).
pub fn ensure_read_only(cypher: &str) -> GraphResult<()> {
    let chars: Vec<char> = cypher.chars().collect();
    let mut i = 0;
    let mut prev = ' ';
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
                prev = c;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_ascii_uppercase();
                if !matches!(prev, '.' | ':' | '$') && WRITE_CLAUSES.contains(&word.as_str()) {
                    return Err(GraphError::WriteClause(word));
                }
                prev = 'a';
            }
            c if c.is_whitespace() => i += 1,
            c => {
                prev = c;
                i += 1;
            }
        }
    }
    Ok(())
}

fn bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Null => BoltType::Null(BoltNull),
        PropertyValue::Bool(v) => BoltType::from(*v),
        PropertyValue::Int(v) => BoltType::from(*v),
        PropertyValue::Float(v) => BoltType::from(*v),
        PropertyValue::Text(v) => BoltType::from(v.clone()),
    }
}

/// Neo4j reports uniqueness failures as `Neo.ClientError.Schema.ConstraintValidationFailed`.
fn classify(err: neo4rs::Error, identity: impl ToString) -> GraphError {
    let message = err.to_string();
    if message.contains("ConstraintValidationFailed") {
        GraphError::constraint(identity, message)
    } else {
        GraphError::Neo4j(err)
    }
}

fn keys_by_kind(ids: &[NodeId]) -> BTreeMap<EntityKind, Vec<i64>> {
    let mut grouped: BTreeMap<EntityKind, Vec<i64>> = BTreeMap::new();
    for id in ids {
        grouped.entry(id.kind).or_default().push(id.key);
    }
    grouped
}

impl GraphClient {
    async fn count(&self, cypher: String) -> GraphResult<usize> {
        let count: i64 = self.query_scalar(Query::new(cypher), "count").await?.unwrap_or(0);
        Ok(count.max(0) as usize)
    }

    async fn node_exists(&self, id: NodeId) -> GraphResult<bool> {
        let cypher = format!("MATCH (n:{} {{id: $key}}) RETURN count(n) AS count", id.kind.label());
        let found: i64 = self
            .query_scalar(Query::new(cypher).param("key", id.key), "count")
            .await?
            .unwrap_or(0);
        Ok(found > 0)
    }

    /// Run a read-only parameterized query and return the named columns of
    /// every row as JSON objects.
    pub async fn read_query(
        &self,
        cypher: &str,
        params: &Properties,
        columns: &[String],
    ) -> GraphResult<Vec<serde_json::Map<String, serde_json::Value>>> {
        ensure_read_only(cypher)?;
        let mut query = Query::new(cypher.to_string());
        for (name, value) in params {
            query = query.param(validate_property(name)?, bolt(value));
        }

        let rows = self.query(query).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let mut object = serde_json::Map::new();
            for column in columns {
                let value: serde_json::Value = row.get(column).map_err(|e| GraphError::decode(column, e))?;
                object.insert(column.clone(), value);
            }
            results.push(object);
        }
        debug!(rows = results.len(), "Read query finished");
        Ok(results)
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn ensure_constraint(&self, kind: EntityKind, property: &str) -> GraphResult<()> {
        let property = validate_property(property)?;
        let label = kind.label();
        let cypher = format!(
            "CREATE CONSTRAINT constraint_{}_{property} IF NOT EXISTS \
             FOR (n:{label}) REQUIRE n.{property} IS UNIQUE",
            label.to_lowercase()
        );
        self.execute(Query::new(cypher)).await.map_err(|e| match e {
            GraphError::Neo4j(err) => classify(err, format!("{label}.{property}")),
            other => other,
        })
    }

    async fn upsert_node(&self, kind: EntityKind, key: i64, properties: &Properties) -> GraphResult<bool> {
        let id = NodeId::new(kind, key);
        let key_property = kind.key_property();

        let mut assignments = Vec::new();
        let mut query_params = Vec::new();
        for (i, (name, value)) in properties.iter().filter(|(name, _)| name.as_str() != key_property).enumerate() {
            assignments.push(format!("n.{} = $p{i}", validate_property(name)?));
            query_params.push((format!("p{i}"), bolt(value)));
        }
        let set_clause = if assignments.is_empty() {
            String::new()
        } else {
            format!("SET {}", assignments.join(", "))
        };

        let label = kind.label();
        let cypher = format!(
            "OPTIONAL MATCH (existing:{label} {{{key_property}: $key}}) \
             WITH count(existing) = 0 AS created \
             MERGE (n:{label} {{{key_property}: $key}}) \
             {set_clause} \
             RETURN created"
        );
        let mut query = Query::new(cypher).param("key", key);
        for (name, value) in query_params {
            query = query.param(&name, value);
        }

        let rows = self.query(query).await.map_err(|e| match e {
            GraphError::Neo4j(err) => classify(err, id),
            other => other,
        })?;
        match rows.into_iter().next() {
            Some(row) => row.get::<bool>("created").map_err(|e| GraphError::decode("created", e)),
            None => Ok(false),
        }
    }

    async fn upsert_edge(&self, edge: &EdgeId) -> GraphResult<bool> {
        let cypher = format!(
            "MATCH (a:{from} {{id: $from}}) \
             MATCH (b:{to} {{id: $to}}) \
             OPTIONAL MATCH (a)-[existing:{rel}]->(b) \
             WITH a, b, count(existing) = 0 AS created \
             MERGE (a)-[:{rel}]->(b) \
             RETURN created",
            from = edge.from.kind.label(),
            to = edge.to.kind.label(),
            rel = edge.rel.as_str(),
        );
        let query = Query::new(cypher).param("from", edge.from.key).param("to", edge.to.key);
        let rows = self.query(query).await.map_err(|e| match e {
            GraphError::Neo4j(err) => classify(err, edge),
            other => other,
        })?;

        if let Some(row) = rows.into_iter().next() {
            return row.get::<bool>("created").map_err(|e| GraphError::decode("created", e));
        }

        // The MATCH found no pair: report which endpoint is absent.
        let missing = if self.node_exists(edge.from).await? { edge.to } else { edge.from };
        Err(GraphError::MissingEndpoint { edge: *edge, missing })
    }

    async fn clear_all(&self) -> GraphResult<ClearStats> {
        let relationships_deleted = self.count("MATCH ()-[r]->() RETURN count(r) AS count".to_string()).await?;
        let nodes_deleted = self.count("MATCH (n) RETURN count(n) AS count".to_string()).await?;
        self.execute(Query::new("MATCH (n) DETACH DELETE n".to_string())).await?;
        Ok(ClearStats {
            nodes_deleted,
            relationships_deleted,
        })
    }

    async fn node_count(&self, kind: EntityKind) -> GraphResult<usize> {
        self.count(format!("MATCH (n:{}) RETURN count(n) AS count", kind.label())).await
    }

    async fn edge_count(&self, rel: RelKind) -> GraphResult<usize> {
        self.count(format!("MATCH ()-[r:{}]->() RETURN count(r) AS count", rel.as_str())).await
    }

    async fn node_keys(&self, kind: EntityKind) -> GraphResult<Vec<i64>> {
        let cypher = format!("MATCH (n:{}) RETURN n.id AS id ORDER BY id", kind.label());
        let rows = self.query(Query::new(cypher)).await?;
        rows.into_iter()
            .map(|row| row.get::<i64>("id").map_err(|e| GraphError::decode("id", e)))
            .collect()
    }

    async fn incident_edges(&self, nodes: &[NodeId]) -> GraphResult<Vec<EdgeId>> {
        let mut edges = BTreeSet::new();
        for (kind, keys) in keys_by_kind(nodes) {
            let cypher = format!(
                "MATCH (a:{})-[r]-() WHERE a.id IN $keys \
                 RETURN DISTINCT type(r) AS rel, startNode(r).id AS from_key, endNode(r).id AS to_key",
                kind.label()
            );
            let rows = self.query(Query::new(cypher).param("keys", keys)).await?;
            for row in rows {
                let rel: String = row.get("rel").map_err(|e| GraphError::decode("rel", e))?;
                let from_key: i64 = row.get("from_key").map_err(|e| GraphError::decode("from_key", e))?;
                let to_key: i64 = row.get("to_key").map_err(|e| GraphError::decode("to_key", e))?;
                // Relationship types outside the library model are ignored.
                if let Some(rel) = RelKind::from_type_name(&rel) {
                    edges.insert(EdgeId::new(rel, from_key, to_key));
                }
            }
        }
        Ok(edges.into_iter().collect())
    }

    async fn fetch_nodes(&self, ids: &[NodeId]) -> GraphResult<Vec<GraphNode>> {
        let mut found: HashMap<NodeId, Properties> = HashMap::new();
        for (kind, keys) in keys_by_kind(ids) {
            let cypher = format!(
                "MATCH (n:{}) WHERE n.id IN $keys RETURN n.id AS id, properties(n) AS props",
                kind.label()
            );
            let rows = self.query(Query::new(cypher).param("keys", keys)).await?;
            for row in rows {
                let key: i64 = row.get("id").map_err(|e| GraphError::decode("id", e))?;
                let raw: HashMap<String, serde_json::Value> =
                    row.get("props").map_err(|e| GraphError::decode("props", e))?;
                let properties = raw
                    .into_iter()
                    .map(|(name, value)| {
                        serde_json::from_value::<PropertyValue>(value)
                            .map(|v| (name, v))
                            .map_err(|e| GraphError::decode("props", e))
                    })
                    .collect::<GraphResult<Properties>>()?;
                found.insert(NodeId::new(kind, key), properties);
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| {
                found.remove(id).map(|properties| GraphNode { id: *id, properties })
            })
            .collect())
    }
}
