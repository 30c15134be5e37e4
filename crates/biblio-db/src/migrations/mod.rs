//! Database migrations.
//!
//! Source and warehouse schemas are tracked independently; each must live in
//! its own database file since both record their version in `user_version`.

use crate::pool::{DbError, DbPool, DbResult};
use rusqlite_migration::{Migrations, M};
use tracing::debug;

/// Transactional source schema.
const SOURCE_SCHEMA: &str = include_str!("source.sql");

/// Star-schema warehouse.
const WAREHOUSE_SCHEMA: &str = include_str!("warehouse.sql");

fn run(pool: &DbPool, schema: &'static str) -> DbResult<()> {
    let migrations = Migrations::new(vec![M::up(schema)]);

    pool.with_conn_mut(|conn| {
        migrations
            .to_latest(conn)
            .map_err(|e| DbError::Migration(e.to_string()))
    })
}

/// Create the source tables. Used by seeding and tests.
pub fn run_source_migrations(pool: &DbPool) -> DbResult<()> {
    run(pool, SOURCE_SCHEMA)?;
    debug!("Source schema ready");
    Ok(())
}

/// Create the warehouse tables. Safe to call on every run.
pub fn run_warehouse_migrations(pool: &DbPool) -> DbResult<()> {
    run(pool, WAREHOUSE_SCHEMA)?;
    debug!("Warehouse schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(pool: &DbPool, name: &str) -> bool {
        pool.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )?;
            Ok(count == 1)
        })
        .unwrap()
    }

    #[test]
    fn test_warehouse_migrations_are_repeatable() {
        let pool = DbPool::in_memory().unwrap();
        run_warehouse_migrations(&pool).unwrap();
        run_warehouse_migrations(&pool).unwrap();

        for table in ["dim_date", "dim_member", "fact_loan", "bridge_book_category"] {
            assert!(table_exists(&pool, table), "missing {table}");
        }
    }

    #[test]
    fn test_source_migrations() {
        let pool = DbPool::in_memory().unwrap();
        run_source_migrations(&pool).unwrap();
        assert!(table_exists(&pool, "loan"));
        assert!(table_exists(&pool, "book_category"));
    }
}
