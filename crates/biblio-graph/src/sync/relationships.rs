//! Association → edge projections.

use std::collections::BTreeSet;

use biblio_core::{EdgeId, RelKind, SourceSnapshot};

/// Distinct edges of `rel` implied by the snapshot, in identity order.
///
/// Duplicate source associations collapse into one edge.
pub fn project(snapshot: &SourceSnapshot, rel: RelKind) -> Vec<EdgeId> {
    let edges: BTreeSet<EdgeId> = match rel {
        RelKind::Wrote => snapshot
            .book_authors
            .iter()
            .map(|ba| EdgeId::new(rel, ba.author_id, ba.book_id))
            .collect(),
        RelKind::BelongsTo => snapshot
            .book_categories
            .iter()
            .map(|bc| EdgeId::new(rel, bc.book_id, bc.category_id))
            .collect(),
        RelKind::Borrowed => snapshot
            .loans
            .iter()
            .map(|l| EdgeId::new(rel, l.member_id, l.id))
            .collect(),
        RelKind::Contains => snapshot
            .loans
            .iter()
            .map(|l| EdgeId::new(rel, l.id, l.book_id))
            .collect(),
        RelKind::ProcessedBy => snapshot
            .loans
            .iter()
            .map(|l| EdgeId::new(rel, l.id, l.staff_id))
            .collect(),
        RelKind::HasFine => snapshot
            .fines
            .iter()
            .map(|f| EdgeId::new(rel, f.loan_id, f.id))
            .collect(),
    };
    edges.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_core::{BookAuthorRecord, EntityKind, NodeId};

    #[test]
    fn test_duplicate_associations_collapse() {
        let mut snapshot = SourceSnapshot::default();
        for _ in 0..2 {
            snapshot.book_authors.push(BookAuthorRecord { book_id: 5, author_id: 3 });
        }
        let edges = project(&snapshot, RelKind::Wrote);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, NodeId::new(EntityKind::Author, 3));
        assert_eq!(edges[0].to, NodeId::new(EntityKind::Book, 5));
    }
}
