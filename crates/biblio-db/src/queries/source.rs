//! Source-table queries.
//!
//! Every row is validated into a typed record here. Dates are stored as ISO
//! text; a value that does not parse is an `InvalidRow` naming the table and
//! natural key, and so is a NULL in a required column.

use biblio_core::{
    AuthorRecord, BiblioResult, BookAuthorRecord, BookCategoryRecord, BookRecord, CategoryRecord,
    FineRecord, LoanRecord, MemberRecord, SourceReader, SourceRecord, SourceTable, StaffRecord,
    SyncError,
};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::pool::{DbError, DbPool, DbResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_date(table: SourceTable, key: i64, column: &str, raw: Option<String>) -> DbResult<Option<NaiveDate>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => {
            // Accept DATETIME values by keeping the date part.
            let date_part = text.get(..10).unwrap_or(text);
            NaiveDate::parse_from_str(date_part, DATE_FORMAT)
                .map(Some)
                .map_err(|e| DbError::InvalidRow {
                    table: table.name().to_string(),
                    key: key.to_string(),
                    reason: format!("{column} = '{text}': {e}"),
                })
        }
    }
}

fn required_date(table: SourceTable, key: i64, column: &str, raw: Option<String>) -> DbResult<NaiveDate> {
    parse_date(table, key, column, raw)?.ok_or_else(|| DbError::InvalidRow {
        table: table.name().to_string(),
        key: key.to_string(),
        reason: format!("{column} is required"),
    })
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

/// Natural key of the row being read, for error messages.
fn row_key(table: SourceTable, row: &Row<'_>) -> String {
    let part = |idx: usize| {
        row.get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map_or_else(|| "?".to_string(), |v| v.to_string())
    };
    match table {
        SourceTable::BookAuthor | SourceTable::BookCategory => format!("({}, {})", part(0), part(1)),
        _ => part(0),
    }
}

/// A NULL in a required column or a value of the wrong type is an invalid
/// record, not an unreachable source.
fn invalid_column(table: SourceTable, row: &Row<'_>, err: rusqlite::Error) -> DbError {
    let (idx, problem) = match &err {
        rusqlite::Error::InvalidColumnType(idx, _, Type::Null) => (*idx, "is required".to_string()),
        rusqlite::Error::InvalidColumnType(idx, _, ty) => (*idx, format!("has unexpected type {ty}")),
        rusqlite::Error::FromSqlConversionFailure(idx, _, e) => (*idx, format!("cannot be converted: {e}")),
        _ => return DbError::from(err),
    };
    let column = row
        .as_ref()
        .column_name(idx)
        .map_or_else(|_| format!("column {idx}"), str::to_string);
    DbError::InvalidRow {
        table: table.name().to_string(),
        key: row_key(table, row),
        reason: format!("{column} {problem}"),
    }
}

/// Read every row of `sql`, classifying column failures per row.
fn read_rows<R>(
    conn: &Connection,
    table: SourceTable,
    sql: &str,
    read: impl Fn(&Row<'_>) -> rusqlite::Result<R>,
) -> DbResult<Vec<R>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read(row).map_err(|e| invalid_column(table, row, e))?);
    }
    Ok(out)
}

/// Read rows, then run a validation step that may reject them.
fn collect_validated<T, R>(
    conn: &Connection,
    table: SourceTable,
    sql: &str,
    read: impl Fn(&Row<'_>) -> rusqlite::Result<R>,
    validate: impl Fn(R) -> DbResult<T>,
) -> DbResult<Vec<T>> {
    read_rows(conn, table, sql, read)?.into_iter().map(validate).collect()
}

pub fn list_members(pool: &DbPool) -> DbResult<Vec<MemberRecord>> {
    pool.with_conn(|conn| {
        collect_validated(
            conn,
            SourceTable::Member,
            "SELECT id, first_name, last_name, email, phone, membership_date, status
             FROM member ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
            |(id, first_name, last_name, email, phone, membership_date, status)| {
                Ok(MemberRecord {
                    id,
                    first_name,
                    last_name: last_name.unwrap_or_default(),
                    email,
                    phone,
                    membership_date: parse_date(SourceTable::Member, id, "membership_date", membership_date)?,
                    status: status.unwrap_or_else(|| "active".to_string()),
                })
            },
        )
    })
}

pub fn list_books(pool: &DbPool) -> DbResult<Vec<BookRecord>> {
    pool.with_conn(|conn| {
        read_rows(
            conn,
            SourceTable::Book,
            "SELECT id, isbn, title, publication_year, copies_available FROM book ORDER BY id",
            |row| {
                Ok(BookRecord {
                    id: row.get(0)?,
                    isbn: row.get(1)?,
                    title: row.get(2)?,
                    publication_year: row.get(3)?,
                    copies_available: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                })
            },
        )
    })
}

pub fn list_authors(pool: &DbPool) -> DbResult<Vec<AuthorRecord>> {
    pool.with_conn(|conn| {
        read_rows(
            conn,
            SourceTable::Author,
            "SELECT id, first_name, last_name FROM author ORDER BY id",
            |row| {
                Ok(AuthorRecord {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            },
        )
    })
}

pub fn list_categories(pool: &DbPool) -> DbResult<Vec<CategoryRecord>> {
    pool.with_conn(|conn| {
        read_rows(
            conn,
            SourceTable::Category,
            "SELECT id, name, description FROM category ORDER BY id",
            |row| {
                Ok(CategoryRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )
    })
}

pub fn list_staff(pool: &DbPool) -> DbResult<Vec<StaffRecord>> {
    pool.with_conn(|conn| {
        collect_validated(
            conn,
            SourceTable::Staff,
            "SELECT id, first_name, last_name, email, role, hire_date FROM staff ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
            |(id, first_name, last_name, email, role, hire_date)| {
                Ok(StaffRecord {
                    id,
                    first_name,
                    last_name: last_name.unwrap_or_default(),
                    email,
                    role: role.unwrap_or_else(|| "assistant".to_string()),
                    hire_date: parse_date(SourceTable::Staff, id, "hire_date", hire_date)?,
                })
            },
        )
    })
}

pub fn list_loans(pool: &DbPool) -> DbResult<Vec<LoanRecord>> {
    pool.with_conn(|conn| {
        collect_validated(
            conn,
            SourceTable::Loan,
            "SELECT id, member_id, book_id, staff_id, loan_date, due_date, return_date, status
             FROM loan ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            },
            |(id, member_id, book_id, staff_id, loan_date, due_date, return_date, status)| {
                let table = SourceTable::Loan;
                Ok(LoanRecord {
                    id,
                    member_id,
                    book_id,
                    staff_id,
                    loan_date: required_date(table, id, "loan_date", loan_date)?,
                    due_date: required_date(table, id, "due_date", due_date)?,
                    return_date: parse_date(table, id, "return_date", return_date)?,
                    status: status.unwrap_or_else(|| "active".to_string()),
                })
            },
        )
    })
}

pub fn list_fines(pool: &DbPool) -> DbResult<Vec<FineRecord>> {
    pool.with_conn(|conn| {
        collect_validated(
            conn,
            SourceTable::Fine,
            "SELECT id, loan_id, amount, issue_date, paid_status FROM fine ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
            |(id, loan_id, amount, issue_date, paid_status)| {
                Ok(FineRecord {
                    id,
                    loan_id,
                    amount: amount.unwrap_or(0.0),
                    issue_date: parse_date(SourceTable::Fine, id, "issue_date", issue_date)?,
                    paid_status: paid_status.unwrap_or_else(|| "unpaid".to_string()),
                })
            },
        )
    })
}

pub fn list_book_authors(pool: &DbPool) -> DbResult<Vec<BookAuthorRecord>> {
    pool.with_conn(|conn| {
        read_rows(
            conn,
            SourceTable::BookAuthor,
            "SELECT book_id, author_id FROM book_author ORDER BY book_id, author_id",
            |row| {
                Ok(BookAuthorRecord {
                    book_id: row.get(0)?,
                    author_id: row.get(1)?,
                })
            },
        )
    })
}

pub fn list_book_categories(pool: &DbPool) -> DbResult<Vec<BookCategoryRecord>> {
    pool.with_conn(|conn| {
        read_rows(
            conn,
            SourceTable::BookCategory,
            "SELECT book_id, category_id FROM book_category ORDER BY book_id, category_id",
            |row| {
                Ok(BookCategoryRecord {
                    book_id: row.get(0)?,
                    category_id: row.get(1)?,
                })
            },
        )
    })
}

/// Fetch one table as tagged records.
pub fn fetch_table(pool: &DbPool, table: SourceTable) -> DbResult<Vec<SourceRecord>> {
    let records = match table {
        SourceTable::Member => list_members(pool)?.into_iter().map(SourceRecord::Member).collect(),
        SourceTable::Book => list_books(pool)?.into_iter().map(SourceRecord::Book).collect(),
        SourceTable::Author => list_authors(pool)?.into_iter().map(SourceRecord::Author).collect(),
        SourceTable::Category => list_categories(pool)?
            .into_iter()
            .map(SourceRecord::Category)
            .collect(),
        SourceTable::Staff => list_staff(pool)?.into_iter().map(SourceRecord::Staff).collect(),
        SourceTable::Loan => list_loans(pool)?.into_iter().map(SourceRecord::Loan).collect(),
        SourceTable::Fine => list_fines(pool)?.into_iter().map(SourceRecord::Fine).collect(),
        SourceTable::BookAuthor => list_book_authors(pool)?
            .into_iter()
            .map(SourceRecord::BookAuthor)
            .collect(),
        SourceTable::BookCategory => list_book_categories(pool)?
            .into_iter()
            .map(SourceRecord::BookCategory)
            .collect(),
    };
    Ok(records)
}

fn insert_record(conn: &Connection, record: &SourceRecord) -> rusqlite::Result<usize> {
    match record {
        SourceRecord::Member(m) => conn.execute(
            "INSERT OR REPLACE INTO member (id, first_name, last_name, email, phone, membership_date, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![m.id, m.first_name, m.last_name, m.email, m.phone, format_date(m.membership_date), m.status],
        ),
        SourceRecord::Book(b) => conn.execute(
            "INSERT OR REPLACE INTO book (id, isbn, title, publication_year, copies_available)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![b.id, b.isbn, b.title, b.publication_year, b.copies_available],
        ),
        SourceRecord::Author(a) => conn.execute(
            "INSERT OR REPLACE INTO author (id, first_name, last_name) VALUES (?1, ?2, ?3)",
            params![a.id, a.first_name, a.last_name],
        ),
        SourceRecord::Category(c) => conn.execute(
            "INSERT OR REPLACE INTO category (id, name, description) VALUES (?1, ?2, ?3)",
            params![c.id, c.name, c.description],
        ),
        SourceRecord::Staff(s) => conn.execute(
            "INSERT OR REPLACE INTO staff (id, first_name, last_name, email, role, hire_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![s.id, s.first_name, s.last_name, s.email, s.role, format_date(s.hire_date)],
        ),
        SourceRecord::Loan(l) => conn.execute(
            "INSERT OR REPLACE INTO loan (id, member_id, book_id, staff_id, loan_date, due_date, return_date, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                l.id,
                l.member_id,
                l.book_id,
                l.staff_id,
                format_date(Some(l.loan_date)),
                format_date(Some(l.due_date)),
                format_date(l.return_date),
                l.status
            ],
        ),
        SourceRecord::Fine(f) => conn.execute(
            "INSERT OR REPLACE INTO fine (id, loan_id, amount, issue_date, paid_status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![f.id, f.loan_id, f.amount, format_date(f.issue_date), f.paid_status],
        ),
        SourceRecord::BookAuthor(r) => conn.execute(
            "INSERT OR IGNORE INTO book_author (book_id, author_id) VALUES (?1, ?2)",
            params![r.book_id, r.author_id],
        ),
        SourceRecord::BookCategory(r) => conn.execute(
            "INSERT OR IGNORE INTO book_category (book_id, category_id) VALUES (?1, ?2)",
            params![r.book_id, r.category_id],
        ),
    }
}

/// Write source rows in one transaction. Existing ids are replaced.
pub fn insert_records(pool: &DbPool, records: &[SourceRecord]) -> DbResult<usize> {
    pool.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        let mut written = 0;
        for record in records {
            written += insert_record(&tx, record)?;
        }
        tx.commit()?;
        Ok(written)
    })
}

/// [`SourceReader`] over a SQLite source database.
#[derive(Clone)]
pub struct SqliteSource {
    pool: DbPool,
}

impl SqliteSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl SourceReader for SqliteSource {
    fn fetch_table(&self, table: SourceTable) -> BiblioResult<Vec<SourceRecord>> {
        fetch_table(&self.pool, table).map_err(|e| match e {
            DbError::InvalidRow { .. } => SyncError::from(e),
            other => SyncError::SourceUnavailable(format!("reading '{}': {other}", table.name())),
        })
    }
}
