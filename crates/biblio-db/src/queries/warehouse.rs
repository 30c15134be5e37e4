//! Star-schema warehouse writes and lookups.
//!
//! Every insert is keyed by a caller-supplied surrogate key and replaces any
//! row already holding that key, so re-applying a batch is idempotent.

use std::collections::{BTreeMap, HashMap};

use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::debug;

use crate::pool::{DbPool, DbResult};

/// Tables of the dimensional model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseTable {
    DimDate,
    DimMember,
    DimBook,
    DimAuthor,
    DimStaff,
    DimCategory,
    FactLoan,
    BridgeBookCategory,
    BridgeBookAuthor,
}

impl WarehouseTable {
    pub const ALL: [WarehouseTable; 9] = [
        WarehouseTable::DimDate,
        WarehouseTable::DimMember,
        WarehouseTable::DimBook,
        WarehouseTable::DimAuthor,
        WarehouseTable::DimStaff,
        WarehouseTable::DimCategory,
        WarehouseTable::FactLoan,
        WarehouseTable::BridgeBookCategory,
        WarehouseTable::BridgeBookAuthor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WarehouseTable::DimDate => "dim_date",
            WarehouseTable::DimMember => "dim_member",
            WarehouseTable::DimBook => "dim_book",
            WarehouseTable::DimAuthor => "dim_author",
            WarehouseTable::DimStaff => "dim_staff",
            WarehouseTable::DimCategory => "dim_category",
            WarehouseTable::FactLoan => "fact_loan",
            WarehouseTable::BridgeBookCategory => "bridge_book_category",
            WarehouseTable::BridgeBookAuthor => "bridge_book_author",
        }
    }

    /// `(surrogate key column, natural key column)` for keyed tables.
    pub fn key_columns(&self) -> Option<(&'static str, &'static str)> {
        match self {
            WarehouseTable::DimDate => Some(("date_key", "date_key")),
            WarehouseTable::DimMember => Some(("member_key", "source_member_id")),
            WarehouseTable::DimBook => Some(("book_key", "source_book_id")),
            WarehouseTable::DimAuthor => Some(("author_key", "source_author_id")),
            WarehouseTable::DimStaff => Some(("staff_key", "source_staff_id")),
            WarehouseTable::DimCategory => Some(("category_key", "source_category_id")),
            WarehouseTable::FactLoan => Some(("loan_key", "source_loan_id")),
            WarehouseTable::BridgeBookCategory | WarehouseTable::BridgeBookAuthor => None,
        }
    }
}

/// A row insertable into one warehouse table.
pub trait WarehouseRow {
    const TABLE: WarehouseTable;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateDimRow {
    pub date_key: i64,
    pub full_date: String,
    pub year: i32,
    pub quarter: u32,
    pub month_name: String,
    pub month_num: u32,
    pub day: u32,
    pub day_name: String,
    pub day_of_week: u32,
    pub week_of_year: u32,
    pub is_weekend: bool,
}

impl WarehouseRow for DateDimRow {
    const TABLE: WarehouseTable = WarehouseTable::DimDate;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR REPLACE INTO dim_date
             (date_key, full_date, year, quarter, month_name, month_num, day, day_name, day_of_week, week_of_year, is_weekend)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.date_key,
                self.full_date,
                self.year,
                self.quarter,
                self.month_name,
                self.month_num,
                self.day,
                self.day_name,
                self.day_of_week,
                self.week_of_year,
                self.is_weekend
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberDimRow {
    pub member_key: i64,
    pub source_member_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub membership_date: Option<String>,
    pub membership_year: Option<i32>,
    pub status: String,
}

impl WarehouseRow for MemberDimRow {
    const TABLE: WarehouseTable = WarehouseTable::DimMember;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR REPLACE INTO dim_member
             (member_key, source_member_id, first_name, last_name, full_name, email, phone, membership_date, membership_year, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.member_key,
                self.source_member_id,
                self.first_name,
                self.last_name,
                self.full_name,
                self.email,
                self.phone,
                self.membership_date,
                self.membership_year,
                self.status
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookDimRow {
    pub book_key: i64,
    pub source_book_id: i64,
    pub isbn: Option<String>,
    pub title: String,
    pub authors: String,
    pub publication_year: Option<i64>,
    pub total_copies: i64,
}

impl WarehouseRow for BookDimRow {
    const TABLE: WarehouseTable = WarehouseTable::DimBook;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR REPLACE INTO dim_book
             (book_key, source_book_id, isbn, title, authors, publication_year, total_copies)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.book_key,
                self.source_book_id,
                self.isbn,
                self.title,
                self.authors,
                self.publication_year,
                self.total_copies
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorDimRow {
    pub author_key: i64,
    pub source_author_id: i64,
    pub full_name: String,
}

impl WarehouseRow for AuthorDimRow {
    const TABLE: WarehouseTable = WarehouseTable::DimAuthor;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR REPLACE INTO dim_author (author_key, source_author_id, full_name)
             VALUES (?1, ?2, ?3)",
            params![self.author_key, self.source_author_id, self.full_name],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffDimRow {
    pub staff_key: i64,
    pub source_staff_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
    pub hire_date: Option<String>,
    pub hire_year: Option<i32>,
}

impl WarehouseRow for StaffDimRow {
    const TABLE: WarehouseTable = WarehouseTable::DimStaff;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR REPLACE INTO dim_staff
             (staff_key, source_staff_id, first_name, last_name, full_name, email, role, hire_date, hire_year)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.staff_key,
                self.source_staff_id,
                self.first_name,
                self.last_name,
                self.full_name,
                self.email,
                self.role,
                self.hire_date,
                self.hire_year
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDimRow {
    pub category_key: i64,
    pub source_category_id: i64,
    pub category_name: String,
    pub description: Option<String>,
}

impl WarehouseRow for CategoryDimRow {
    const TABLE: WarehouseTable = WarehouseTable::DimCategory;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR REPLACE INTO dim_category (category_key, source_category_id, category_name, description)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.category_key,
                self.source_category_id,
                self.category_name,
                self.description
            ],
        )
    }
}

/// One checkout at fact grain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactLoanRow {
    pub loan_key: i64,
    pub source_loan_id: i64,
    pub date_key: i64,
    pub return_date_key: Option<i64>,
    pub member_key: i64,
    pub book_key: i64,
    pub staff_key: i64,
    pub loan_count: i64,
    pub loan_duration_days: Option<i64>,
    pub days_overdue: i64,
    pub fine_amount: f64,
}

impl WarehouseRow for FactLoanRow {
    const TABLE: WarehouseTable = WarehouseTable::FactLoan;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR REPLACE INTO fact_loan
             (loan_key, source_loan_id, date_key, return_date_key, member_key, book_key, staff_key,
              loan_count, loan_duration_days, days_overdue, fine_amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.loan_key,
                self.source_loan_id,
                self.date_key,
                self.return_date_key,
                self.member_key,
                self.book_key,
                self.staff_key,
                self.loan_count,
                self.loan_duration_days,
                self.days_overdue,
                self.fine_amount
            ],
        )
    }
}

/// Many-to-many bridge tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeTable {
    BookCategory,
    BookAuthor,
}

impl BridgeTable {
    pub fn table(&self) -> WarehouseTable {
        match self {
            BridgeTable::BookCategory => WarehouseTable::BridgeBookCategory,
            BridgeTable::BookAuthor => WarehouseTable::BridgeBookAuthor,
        }
    }

    pub fn name(&self) -> &'static str {
        self.table().name()
    }

    fn child_column(&self) -> &'static str {
        match self {
            BridgeTable::BookCategory => "category_key",
            BridgeTable::BookAuthor => "author_key",
        }
    }
}

/// `(parent, child, weight)` for one association.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BridgeRow {
    pub parent_key: i64,
    pub child_key: i64,
    pub weight: f64,
}

/// Bulk insert rows in one transaction; returns rows written.
pub fn insert_rows<R: WarehouseRow>(pool: &DbPool, rows: &[R]) -> DbResult<usize> {
    pool.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        let mut written = 0;
        for row in rows {
            written += row.insert(&tx)?;
        }
        tx.commit()?;
        debug!(table = R::TABLE.name(), rows = written, "Inserted warehouse rows");
        Ok(written)
    })
}

/// Replace every bridge row of the given parents with `rows`, atomically.
pub fn replace_bridge_rows(
    pool: &DbPool,
    bridge: BridgeTable,
    parents: &[i64],
    rows: &[BridgeRow],
) -> DbResult<usize> {
    let delete_sql = format!("DELETE FROM {} WHERE book_key = ?1", bridge.name());
    let insert_sql = format!(
        "INSERT OR REPLACE INTO {} (book_key, {}, weight_factor) VALUES (?1, ?2, ?3)",
        bridge.name(),
        bridge.child_column()
    );

    pool.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        {
            let mut delete = tx.prepare(&delete_sql)?;
            for parent in parents {
                delete.execute([parent])?;
            }
            let mut insert = tx.prepare(&insert_sql)?;
            for row in rows {
                insert.execute(params![row.parent_key, row.child_key, row.weight])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    })
}

/// Bridge rows currently stored, ordered by parent then child.
pub fn list_bridge_rows(pool: &DbPool, bridge: BridgeTable) -> DbResult<Vec<BridgeRow>> {
    let sql = format!(
        "SELECT book_key, {child}, weight_factor FROM {table} ORDER BY book_key, {child}",
        child = bridge.child_column(),
        table = bridge.name()
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(BridgeRow {
                parent_key: row.get(0)?,
                child_key: row.get(1)?,
                weight: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Natural key → surrogate key for a dimension or the fact table.
pub fn load_key_map(pool: &DbPool, table: WarehouseTable) -> DbResult<HashMap<i64, i64>> {
    let Some((surrogate, natural)) = table.key_columns() else {
        return Ok(HashMap::new());
    };
    let sql = format!("SELECT {natural}, {surrogate} FROM {}", table.name());
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let pairs = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        pairs.collect::<Result<HashMap<_, _>, _>>().map_err(Into::into)
    })
}

/// Delete every warehouse row, facts and bridges first.
pub fn clear_warehouse(pool: &DbPool) -> DbResult<usize> {
    pool.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for table in WarehouseTable::ALL.iter().rev() {
            deleted += tx.execute(&format!("DELETE FROM {}", table.name()), [])?;
        }
        tx.commit()?;
        Ok(deleted)
    })
}

/// Row count per warehouse table.
pub fn table_counts(pool: &DbPool) -> DbResult<BTreeMap<&'static str, usize>> {
    pool.with_conn(|conn| {
        let mut counts = BTreeMap::new();
        for table in WarehouseTable::ALL {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| row.get(0))?;
            counts.insert(table.name(), count as usize);
        }
        Ok(counts)
    })
}

/// Fact and bridge rows whose foreign keys do not resolve to a dimension row.
pub fn referential_violations(pool: &DbPool) -> DbResult<usize> {
    const CHECKS: &[&str] = &[
        "SELECT COUNT(*) FROM fact_loan f LEFT JOIN dim_date d ON f.date_key = d.date_key WHERE d.date_key IS NULL",
        "SELECT COUNT(*) FROM fact_loan f LEFT JOIN dim_date d ON f.return_date_key = d.date_key
         WHERE f.return_date_key IS NOT NULL AND d.date_key IS NULL",
        "SELECT COUNT(*) FROM fact_loan f LEFT JOIN dim_member m ON f.member_key = m.member_key WHERE m.member_key IS NULL",
        "SELECT COUNT(*) FROM fact_loan f LEFT JOIN dim_book b ON f.book_key = b.book_key WHERE b.book_key IS NULL",
        "SELECT COUNT(*) FROM fact_loan f LEFT JOIN dim_staff s ON f.staff_key = s.staff_key WHERE s.staff_key IS NULL",
        "SELECT COUNT(*) FROM bridge_book_category bc LEFT JOIN dim_book b ON bc.book_key = b.book_key
         LEFT JOIN dim_category c ON bc.category_key = c.category_key
         WHERE b.book_key IS NULL OR c.category_key IS NULL",
        "SELECT COUNT(*) FROM bridge_book_author ba LEFT JOIN dim_book b ON ba.book_key = b.book_key
         LEFT JOIN dim_author a ON ba.author_key = a.author_key
         WHERE b.book_key IS NULL OR a.author_key IS NULL",
    ];

    pool.with_conn(|conn| {
        let mut total = 0;
        for sql in CHECKS {
            let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            total += count as usize;
        }
        Ok(total)
    })
}

/// Sum of bridge weights per parent key.
pub fn bridge_weight_totals(pool: &DbPool, bridge: BridgeTable) -> DbResult<BTreeMap<i64, f64>> {
    let sql = format!(
        "SELECT book_key, SUM(weight_factor) FROM {} GROUP BY book_key",
        bridge.name()
    );
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        rows.collect::<Result<BTreeMap<_, _>, _>>().map_err(Into::into)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_warehouse_migrations;

    fn warehouse() -> DbPool {
        let pool = DbPool::in_memory().unwrap();
        run_warehouse_migrations(&pool).unwrap();
        pool
    }

    fn category(key: i64, source: i64) -> CategoryDimRow {
        CategoryDimRow {
            category_key: key,
            source_category_id: source,
            category_name: format!("Category {source}"),
            description: None,
        }
    }

    #[test]
    fn test_insert_is_idempotent_by_surrogate_key() {
        let pool = warehouse();
        let rows = vec![category(1, 10), category(2, 20)];
        insert_rows(&pool, &rows).unwrap();
        insert_rows(&pool, &rows).unwrap();

        let counts = table_counts(&pool).unwrap();
        assert_eq!(counts["dim_category"], 2);

        let keys = load_key_map(&pool, WarehouseTable::DimCategory).unwrap();
        assert_eq!(keys[&10], 1);
        assert_eq!(keys[&20], 2);
    }

    #[test]
    fn test_replace_bridge_rows_drops_stale_children() {
        let pool = warehouse();
        let first = [
            BridgeRow { parent_key: 1, child_key: 1, weight: 0.5 },
            BridgeRow { parent_key: 1, child_key: 2, weight: 0.5 },
        ];
        replace_bridge_rows(&pool, BridgeTable::BookCategory, &[1], &first).unwrap();

        let second = [BridgeRow { parent_key: 1, child_key: 2, weight: 1.0 }];
        replace_bridge_rows(&pool, BridgeTable::BookCategory, &[1], &second).unwrap();

        let stored = list_bridge_rows(&pool, BridgeTable::BookCategory).unwrap();
        assert_eq!(stored, second.to_vec());
        let totals = bridge_weight_totals(&pool, BridgeTable::BookCategory).unwrap();
        assert_eq!(totals[&1], 1.0);
    }

    #[test]
    fn test_clear_and_violations() {
        let pool = warehouse();
        insert_rows(
            &pool,
            &[FactLoanRow {
                loan_key: 1,
                source_loan_id: 1,
                date_key: 20240101,
                return_date_key: None,
                member_key: 1,
                book_key: 1,
                staff_key: 1,
                loan_count: 1,
                loan_duration_days: None,
                days_overdue: 0,
                fine_amount: 0.0,
            }],
        )
        .unwrap();

        // No dimensions were loaded: date, member, book and staff are all dangling.
        assert_eq!(referential_violations(&pool).unwrap(), 4);

        assert_eq!(clear_warehouse(&pool).unwrap(), 1);
        assert_eq!(referential_violations(&pool).unwrap(), 0);
    }
}
