use biblio_core::{SourceReader, SourceTable, SyncError};
use biblio_db::seed::{generate, seed_source, SeedConfig};
use biblio_db::{DbPool, SqliteSource};
use chrono::NaiveDate;

fn config() -> SeedConfig {
    SeedConfig {
        members: 15,
        authors: 6,
        books: 20,
        staff: 3,
        loans: 80,
        ..SeedConfig::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }
}

#[test]
fn test_seeded_file_reads_back_as_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.db");
    let summary = seed_source(&DbPool::open(&path).unwrap(), &config()).unwrap();

    let source = SqliteSource::new(DbPool::open_existing(&path).unwrap());
    let snapshot = source.read_snapshot().unwrap();
    for (table, rows) in &summary.tables {
        assert_eq!(snapshot.row_count(*table), *rows, "{}", table.name());
    }
    assert_eq!(snapshot.members.len(), 15);
    assert!(snapshot.loans.windows(2).all(|w| w[0].id < w[1].id));
}

#[test]
fn test_generation_is_deterministic_per_seed() {
    assert_eq!(generate(&config()), generate(&config()));
    let other = SeedConfig { seed: 7, ..config() };
    assert_ne!(generate(&config()), generate(&other));
}

#[test]
fn test_unparsable_date_is_invalid_record() {
    let pool = DbPool::in_memory().unwrap();
    seed_source(&pool, &config()).unwrap();
    pool.with_conn(|conn| {
        conn.execute("UPDATE loan SET due_date = 'next tuesday' WHERE id = 3", [])?;
        Ok(())
    })
    .unwrap();

    let err = SqliteSource::new(pool).fetch_table(SourceTable::Loan).unwrap_err();
    match err {
        SyncError::InvalidRecord { table, key, reason } => {
            assert_eq!(table, "loan");
            assert_eq!(key, "3");
            assert!(reason.contains("due_date"));
        }
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}

#[test]
fn test_null_in_required_column_is_invalid_record() {
    // A source database created outside our migrations, without NOT NULL.
    let pool = DbPool::in_memory().unwrap();
    pool.with_conn(|conn| {
        conn.execute_batch(
            "CREATE TABLE book (id INTEGER PRIMARY KEY, isbn TEXT, title TEXT,
                                publication_year INTEGER, copies_available INTEGER);
             INSERT INTO book VALUES (1, '978-0', 'Dune', 1965, 2);
             INSERT INTO book VALUES (2, '978-1', NULL, 1969, 1);",
        )?;
        Ok(())
    })
    .unwrap();

    let err = SqliteSource::new(pool).fetch_table(SourceTable::Book).unwrap_err();
    match err {
        SyncError::InvalidRecord { table, key, reason } => {
            assert_eq!(table, "book");
            assert_eq!(key, "2");
            assert_eq!(reason, "title is required");
        }
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}
