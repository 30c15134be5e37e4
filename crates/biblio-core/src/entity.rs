//! Entity and relationship kinds of the library graph.
//!
//! Both are closed enums: adding a kind is a compile-checked change in every
//! `match` that materializes, samples or reports on it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Node types materialized into the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Member,
    Book,
    Author,
    Category,
    Staff,
    Loan,
    Fine,
}

impl EntityKind {
    /// Every kind, in load order.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Member,
        EntityKind::Book,
        EntityKind::Author,
        EntityKind::Category,
        EntityKind::Staff,
        EntityKind::Loan,
        EntityKind::Fine,
    ];

    /// The graph node label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Member => "Member",
            EntityKind::Book => "Book",
            EntityKind::Author => "Author",
            EntityKind::Category => "Category",
            EntityKind::Staff => "Staff",
            EntityKind::Loan => "Loan",
            EntityKind::Fine => "Fine",
        }
    }

    /// Property holding the natural key; carries the uniqueness constraint.
    pub fn key_property(&self) -> &'static str {
        "id"
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a kind name is not recognised.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown {what}: '{value}'")]
pub struct ParseKindError {
    pub what: &'static str,
    pub value: String,
}

impl FromStr for EntityKind {
    type Err = ParseKindError;

    /// Case-insensitive, accepts singular or plural (`loan`, `Loans`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let singular = match lowered.strip_suffix("ies") {
            Some(stem) => format!("{stem}y"),
            None => lowered.strip_suffix('s').unwrap_or(&lowered).to_string(),
        };
        Self::ALL
            .into_iter()
            .find(|kind| {
                let label = kind.label().to_lowercase();
                label == lowered || label == singular
            })
            .ok_or_else(|| ParseKindError {
                what: "entity kind",
                value: s.to_string(),
            })
    }
}

/// Relationship types materialized into the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelKind {
    Wrote,
    BelongsTo,
    Borrowed,
    Contains,
    ProcessedBy,
    HasFine,
}

impl RelKind {
    pub const ALL: [RelKind; 6] = [
        RelKind::Wrote,
        RelKind::BelongsTo,
        RelKind::Borrowed,
        RelKind::Contains,
        RelKind::ProcessedBy,
        RelKind::HasFine,
    ];

    /// The relationship type name used in Cypher.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelKind::Wrote => "WROTE",
            RelKind::BelongsTo => "BELONGS_TO",
            RelKind::Borrowed => "BORROWED",
            RelKind::Contains => "CONTAINS",
            RelKind::ProcessedBy => "PROCESSED_BY",
            RelKind::HasFine => "HAS_FINE",
        }
    }

    /// `(from, to)` node kinds; direction matches the stored edge.
    pub fn endpoints(&self) -> (EntityKind, EntityKind) {
        match self {
            RelKind::Wrote => (EntityKind::Author, EntityKind::Book),
            RelKind::BelongsTo => (EntityKind::Book, EntityKind::Category),
            RelKind::Borrowed => (EntityKind::Member, EntityKind::Loan),
            RelKind::Contains => (EntityKind::Loan, EntityKind::Book),
            RelKind::ProcessedBy => (EntityKind::Loan, EntityKind::Staff),
            RelKind::HasFine => (EntityKind::Loan, EntityKind::Fine),
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rel| rel.as_str() == name)
    }
}

impl fmt::Display for RelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node identity: `(type tag, natural key)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub kind: EntityKind,
    pub key: i64,
}

impl NodeId {
    pub fn new(kind: EntityKind, key: i64) -> Self {
        Self { kind, key }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.label(), self.key)
    }
}

/// Edge identity: `(relationship type, source identity, target identity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    pub rel: RelKind,
    pub from: NodeId,
    pub to: NodeId,
}

impl EdgeId {
    /// Build an edge whose endpoint kinds come from the relationship type.
    pub fn new(rel: RelKind, from_key: i64, to_key: i64) -> Self {
        let (from_kind, to_kind) = rel.endpoints();
        Self {
            rel,
            from: NodeId::new(from_kind, from_key),
            to: NodeId::new(to_kind, to_key),
        }
    }

    /// The endpoint opposite `node`, if `node` is an endpoint.
    pub fn other(&self, node: &NodeId) -> Option<NodeId> {
        if self.from == *node {
            Some(self.to)
        } else if self.to == *node {
            Some(self.from)
        } else {
            None
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.from, self.rel, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("loan".parse::<EntityKind>().unwrap(), EntityKind::Loan);
        assert_eq!("Members".parse::<EntityKind>().unwrap(), EntityKind::Member);
        assert_eq!("CATEGORY".parse::<EntityKind>().unwrap(), EntityKind::Category);
        assert!("shelf".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_label_round_trip_for_every_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.label().parse::<EntityKind>(), Ok(kind));
        }
        for rel in RelKind::ALL {
            assert_eq!(RelKind::from_type_name(rel.as_str()), Some(rel));
        }
    }

    #[test]
    fn test_edge_other_endpoint() {
        let edge = EdgeId::new(RelKind::Borrowed, 7, 11);
        let member = NodeId::new(EntityKind::Member, 7);
        let loan = NodeId::new(EntityKind::Loan, 11);
        assert_eq!(edge.other(&member), Some(loan));
        assert_eq!(edge.other(&loan), Some(member));
        assert_eq!(edge.other(&NodeId::new(EntityKind::Loan, 12)), None);
        assert_eq!(edge.to_string(), "(Member#7)-[:BORROWED]->(Loan#11)");
    }
}
