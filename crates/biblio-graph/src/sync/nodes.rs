//! Record → node projections.

use biblio_core::{EntityKind, Properties, PropertyValue, SourceSnapshot};

fn properties<const N: usize>(pairs: [(&str, PropertyValue); N]) -> Properties {
    pairs.into_iter().map(|(name, value)| (name.to_string(), value)).collect()
}

/// `(natural key, properties)` of every node of `kind` in the snapshot.
///
/// People get a derived `name`; dates are ISO strings.
pub fn project(snapshot: &SourceSnapshot, kind: EntityKind) -> Vec<(i64, Properties)> {
    match kind {
        EntityKind::Member => snapshot
            .members
            .iter()
            .map(|m| {
                (
                    m.id,
                    properties([
                        ("first_name", m.first_name.as_str().into()),
                        ("last_name", m.last_name.as_str().into()),
                        ("name", m.full_name().into()),
                        ("email", m.email.clone().into()),
                        ("phone", m.phone.clone().into()),
                        ("membership_date", m.membership_date.into()),
                        ("status", m.status.as_str().into()),
                    ]),
                )
            })
            .collect(),
        EntityKind::Book => snapshot
            .books
            .iter()
            .map(|b| {
                (
                    b.id,
                    properties([
                        ("isbn", b.isbn.clone().into()),
                        ("title", b.title.as_str().into()),
                        ("publication_year", b.publication_year.into()),
                        ("copies_available", b.copies_available.into()),
                    ]),
                )
            })
            .collect(),
        EntityKind::Author => snapshot
            .authors
            .iter()
            .map(|a| {
                (
                    a.id,
                    properties([
                        ("first_name", a.first_name.as_str().into()),
                        ("last_name", a.last_name.as_str().into()),
                        ("name", a.full_name().into()),
                    ]),
                )
            })
            .collect(),
        EntityKind::Category => snapshot
            .categories
            .iter()
            .map(|c| {
                (
                    c.id,
                    properties([
                        ("name", c.name.as_str().into()),
                        ("description", c.description.clone().into()),
                    ]),
                )
            })
            .collect(),
        EntityKind::Staff => snapshot
            .staff
            .iter()
            .map(|s| {
                (
                    s.id,
                    properties([
                        ("first_name", s.first_name.as_str().into()),
                        ("last_name", s.last_name.as_str().into()),
                        ("name", s.full_name().into()),
                        ("email", s.email.clone().into()),
                        ("role", s.role.as_str().into()),
                        ("hire_date", s.hire_date.into()),
                    ]),
                )
            })
            .collect(),
        EntityKind::Loan => snapshot
            .loans
            .iter()
            .map(|l| {
                (
                    l.id,
                    properties([
                        ("loan_date", l.loan_date.into()),
                        ("due_date", l.due_date.into()),
                        ("return_date", l.return_date.into()),
                        ("status", l.status.as_str().into()),
                    ]),
                )
            })
            .collect(),
        EntityKind::Fine => snapshot
            .fines
            .iter()
            .map(|f| {
                (
                    f.id,
                    properties([
                        ("amount", f.amount.into()),
                        ("issue_date", f.issue_date.into()),
                        ("paid_status", f.paid_status.as_str().into()),
                    ]),
                )
            })
            .collect(),
    }
}
