//! The source reader boundary and the typed snapshot it produces.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::BiblioResult;
use crate::record::*;

/// Reads complete row sets from the transactional store.
///
/// Implementations validate every row into a [`SourceRecord`]; an
/// unreachable store is reported as `SyncError::SourceUnavailable`.
pub trait SourceReader: Send + Sync {
    /// All rows of `table`, ordered by natural key.
    fn fetch_table(&self, table: SourceTable) -> BiblioResult<Vec<SourceRecord>>;

    /// Read every table into one typed snapshot.
    fn read_snapshot(&self) -> BiblioResult<SourceSnapshot> {
        let mut snapshot = SourceSnapshot::default();
        for table in SourceTable::ALL {
            let rows = self.fetch_table(table)?;
            debug!(table = table.name(), rows = rows.len(), "Fetched source table");
            for row in rows {
                snapshot.push(row);
            }
        }
        Ok(snapshot)
    }
}

/// Every source table of one run, read once and shared by all stages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSnapshot {
    pub members: Vec<MemberRecord>,
    pub books: Vec<BookRecord>,
    pub authors: Vec<AuthorRecord>,
    pub categories: Vec<CategoryRecord>,
    pub staff: Vec<StaffRecord>,
    pub loans: Vec<LoanRecord>,
    pub fines: Vec<FineRecord>,
    pub book_authors: Vec<BookAuthorRecord>,
    pub book_categories: Vec<BookCategoryRecord>,
}

impl SourceSnapshot {
    pub fn push(&mut self, record: SourceRecord) {
        match record {
            SourceRecord::Member(r) => self.members.push(r),
            SourceRecord::Book(r) => self.books.push(r),
            SourceRecord::Author(r) => self.authors.push(r),
            SourceRecord::Category(r) => self.categories.push(r),
            SourceRecord::Staff(r) => self.staff.push(r),
            SourceRecord::Loan(r) => self.loans.push(r),
            SourceRecord::Fine(r) => self.fines.push(r),
            SourceRecord::BookAuthor(r) => self.book_authors.push(r),
            SourceRecord::BookCategory(r) => self.book_categories.push(r),
        }
    }

    pub fn row_count(&self, table: SourceTable) -> usize {
        match table {
            SourceTable::Member => self.members.len(),
            SourceTable::Book => self.books.len(),
            SourceTable::Author => self.authors.len(),
            SourceTable::Category => self.categories.len(),
            SourceTable::Staff => self.staff.len(),
            SourceTable::Loan => self.loans.len(),
            SourceTable::Fine => self.fines.len(),
            SourceTable::BookAuthor => self.book_authors.len(),
            SourceTable::BookCategory => self.book_categories.len(),
        }
    }

    /// Total fine amount per loan id.
    pub fn fine_totals(&self) -> HashMap<i64, f64> {
        let mut totals = HashMap::new();
        for fine in &self.fines {
            *totals.entry(fine.loan_id).or_insert(0.0) += fine.amount;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    struct FixedSource(Vec<SourceRecord>);

    impl SourceReader for FixedSource {
        fn fetch_table(&self, table: SourceTable) -> BiblioResult<Vec<SourceRecord>> {
            Ok(self.0.iter().filter(|r| r.table() == table).cloned().collect())
        }
    }

    struct DownSource;

    impl SourceReader for DownSource {
        fn fetch_table(&self, _table: SourceTable) -> BiblioResult<Vec<SourceRecord>> {
            Err(SyncError::SourceUnavailable("connection refused".into()))
        }
    }

    #[test]
    fn test_snapshot_distributes_rows() {
        let source = FixedSource(vec![
            SourceRecord::Category(CategoryRecord {
                id: 1,
                name: "Poetry".into(),
                description: None,
            }),
            SourceRecord::BookCategory(BookCategoryRecord { book_id: 2, category_id: 1 }),
            SourceRecord::BookCategory(BookCategoryRecord { book_id: 3, category_id: 1 }),
        ]);

        let snapshot = source.read_snapshot().unwrap();
        assert_eq!(snapshot.row_count(SourceTable::Category), 1);
        assert_eq!(snapshot.row_count(SourceTable::BookCategory), 2);
        assert_eq!(snapshot.row_count(SourceTable::Loan), 0);
    }

    #[test]
    fn test_snapshot_propagates_unavailable_source() {
        let err = DownSource.read_snapshot().unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable(_)));
    }

    #[test]
    fn test_fine_totals_sum_per_loan() {
        let mut snapshot = SourceSnapshot::default();
        for (id, loan_id, amount) in [(1, 10, 2.5), (2, 10, 1.0), (3, 11, 4.0)] {
            snapshot.fines.push(FineRecord {
                id,
                loan_id,
                amount,
                issue_date: None,
                paid_status: "unpaid".into(),
            });
        }
        let totals = snapshot.fine_totals();
        assert_eq!(totals[&10], 3.5);
        assert_eq!(totals[&11], 4.0);
    }
}
