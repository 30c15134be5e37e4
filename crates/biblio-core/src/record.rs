//! Typed source records, one struct per relational table.
//!
//! Rows are validated into these types at the read boundary; nothing past the
//! source reader handles untyped column maps.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tables read from the transactional store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    Member,
    Book,
    Author,
    Category,
    Staff,
    Loan,
    Fine,
    BookAuthor,
    BookCategory,
}

impl SourceTable {
    pub const ALL: [SourceTable; 9] = [
        SourceTable::Member,
        SourceTable::Book,
        SourceTable::Author,
        SourceTable::Category,
        SourceTable::Staff,
        SourceTable::Loan,
        SourceTable::Fine,
        SourceTable::BookAuthor,
        SourceTable::BookCategory,
    ];

    /// SQL table name.
    pub fn name(&self) -> &'static str {
        match self {
            SourceTable::Member => "member",
            SourceTable::Book => "book",
            SourceTable::Author => "author",
            SourceTable::Category => "category",
            SourceTable::Staff => "staff",
            SourceTable::Loan => "loan",
            SourceTable::Fine => "fine",
            SourceTable::BookAuthor => "book_author",
            SourceTable::BookCategory => "book_category",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Natural key of a source row. Association rows are keyed by their pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NaturalKey {
    Id(i64),
    Pair(i64, i64),
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Id(id) => write!(f, "{id}"),
            NaturalKey::Pair(a, b) => write!(f, "({a}, {b})"),
        }
    }
}

fn join_name(first: &str, last: &str) -> String {
    format!("{first} {last}").trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub membership_date: Option<NaiveDate>,
    pub status: String,
}

impl MemberRecord {
    pub fn full_name(&self) -> String {
        join_name(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: i64,
    pub isbn: Option<String>,
    pub title: String,
    pub publication_year: Option<i64>,
    pub copies_available: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl AuthorRecord {
    pub fn full_name(&self) -> String {
        join_name(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: String,
    pub hire_date: Option<NaiveDate>,
}

impl StaffRecord {
    pub fn full_name(&self) -> String {
        join_name(&self.first_name, &self.last_name)
    }
}

/// One checkout. The transactional event behind the fact grain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: i64,
    pub member_id: i64,
    pub book_id: i64,
    pub staff_id: i64,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineRecord {
    pub id: i64,
    pub loan_id: i64,
    pub amount: f64,
    pub issue_date: Option<NaiveDate>,
    pub paid_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookAuthorRecord {
    pub book_id: i64,
    pub author_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCategoryRecord {
    pub book_id: i64,
    pub category_id: i64,
}

/// A validated row from any source table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum SourceRecord {
    Member(MemberRecord),
    Book(BookRecord),
    Author(AuthorRecord),
    Category(CategoryRecord),
    Staff(StaffRecord),
    Loan(LoanRecord),
    Fine(FineRecord),
    BookAuthor(BookAuthorRecord),
    BookCategory(BookCategoryRecord),
}

impl SourceRecord {
    pub fn table(&self) -> SourceTable {
        match self {
            SourceRecord::Member(_) => SourceTable::Member,
            SourceRecord::Book(_) => SourceTable::Book,
            SourceRecord::Author(_) => SourceTable::Author,
            SourceRecord::Category(_) => SourceTable::Category,
            SourceRecord::Staff(_) => SourceTable::Staff,
            SourceRecord::Loan(_) => SourceTable::Loan,
            SourceRecord::Fine(_) => SourceTable::Fine,
            SourceRecord::BookAuthor(_) => SourceTable::BookAuthor,
            SourceRecord::BookCategory(_) => SourceTable::BookCategory,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        match self {
            SourceRecord::Member(r) => NaturalKey::Id(r.id),
            SourceRecord::Book(r) => NaturalKey::Id(r.id),
            SourceRecord::Author(r) => NaturalKey::Id(r.id),
            SourceRecord::Category(r) => NaturalKey::Id(r.id),
            SourceRecord::Staff(r) => NaturalKey::Id(r.id),
            SourceRecord::Loan(r) => NaturalKey::Id(r.id),
            SourceRecord::Fine(r) => NaturalKey::Id(r.id),
            SourceRecord::BookAuthor(r) => NaturalKey::Pair(r.book_id, r.author_id),
            SourceRecord::BookCategory(r) => NaturalKey::Pair(r.book_id, r.category_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_trims_missing_last_name() {
        let author = AuthorRecord {
            id: 19,
            first_name: "Homer".into(),
            last_name: String::new(),
        };
        assert_eq!(author.full_name(), "Homer");
    }

    #[test]
    fn test_association_natural_key() {
        let record = SourceRecord::BookCategory(BookCategoryRecord {
            book_id: 3,
            category_id: 8,
        });
        assert_eq!(record.table(), SourceTable::BookCategory);
        assert_eq!(record.natural_key(), NaturalKey::Pair(3, 8));
        assert_eq!(record.natural_key().to_string(), "(3, 8)");
    }
}
