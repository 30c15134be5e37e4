//! Graph store errors.

use biblio_core::{EdgeId, NodeId, ReferentialGap, SyncError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Constraint violation on {identity}: {message}")]
    ConstraintViolation { identity: String, message: String },

    #[error("Edge {edge} has no endpoint {missing}")]
    MissingEndpoint { edge: EdgeId, missing: NodeId },

    #[error("Invalid property name '{0}'")]
    InvalidProperty(String),

    #[error("Read query contains write clause '{0}'")]
    WriteClause(String),

    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Failed to decode '{field}': {message}")]
    Decode { field: String, message: String },
}

pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub fn constraint(identity: impl ToString, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            identity: identity.to_string(),
            message: message.into(),
        }
    }

    pub fn decode(field: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            field: field.to_string(),
            message: err.to_string(),
        }
    }

    /// A missing endpoint as a skippable referential gap.
    pub fn as_gap(&self) -> Option<ReferentialGap> {
        match self {
            GraphError::MissingEndpoint { edge, missing } => {
                Some(ReferentialGap::new(edge.rel.as_str(), edge, missing))
            }
            _ => None,
        }
    }
}

impl From<GraphError> for SyncError {
    fn from(err: GraphError) -> Self {
        if let Some(gap) = err.as_gap() {
            return SyncError::ReferentialGap(gap);
        }
        match err {
            GraphError::ConstraintViolation { identity, message } => {
                SyncError::ConstraintViolation { identity, message }
            }
            other => SyncError::store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_core::{EntityKind, RelKind};

    #[test]
    fn test_missing_endpoint_becomes_gap() {
        let edge = EdgeId::new(RelKind::Wrote, 4, 9);
        let err = GraphError::MissingEndpoint {
            edge,
            missing: NodeId::new(EntityKind::Book, 9),
        };
        match SyncError::from(err) {
            SyncError::ReferentialGap(gap) => {
                assert_eq!(gap.origin, "WROTE");
                assert_eq!(gap.missing, "Book#9");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_constraint_keeps_identity() {
        let err: SyncError = GraphError::constraint(NodeId::new(EntityKind::Member, 3), "duplicate").into();
        assert!(err.aborts_pipeline());
        assert!(err.to_string().contains("Member#3"));
    }
}
