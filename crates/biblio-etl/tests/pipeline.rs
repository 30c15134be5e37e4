use std::sync::Arc;

use async_trait::async_trait;
use biblio_core::{
    AuthorRecord, BiblioResult, BookAuthorRecord, BookRecord, EdgeId, EntityKind, LoanRecord,
    MemberRecord, NodeId, Properties, RelKind, SourceReader, SourceRecord, SourceTable, SyncError,
    SyncMode,
};
use biblio_db::migrations::run_source_migrations;
use biblio_db::queries::source::insert_records;
use biblio_db::queries::warehouse::{load_key_map, referential_violations, table_counts, WarehouseTable};
use biblio_db::seed::{seed_source, SeedConfig};
use biblio_db::{DbPool, SqliteSource};
use biblio_etl::{CancelFlag, Pipeline, RunState, Stage, StageStatus};
use biblio_graph::{ClearStats, GraphError, GraphNode, GraphResult, GraphStats, GraphStore, MemoryGraph};
use chrono::NaiveDate;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn seeded_source() -> DbPool {
    let pool = DbPool::in_memory().unwrap();
    let config = SeedConfig {
        members: 25,
        authors: 10,
        books: 40,
        staff: 4,
        loans: 150,
        ..SeedConfig::new(today())
    };
    seed_source(&pool, &config).unwrap();
    pool
}

fn reader(pool: &DbPool) -> Arc<dyn SourceReader> {
    Arc::new(SqliteSource::new(pool.clone()))
}

fn warehouse() -> DbPool {
    DbPool::in_memory().unwrap()
}

fn pipeline<'a, S: GraphStore + ?Sized>(source: &DbPool, graph: &'a S, warehouse: &DbPool) -> Pipeline<'a, S> {
    Pipeline::new(reader(source), graph, warehouse.clone()).with_today(today())
}

struct DownSource;

impl SourceReader for DownSource {
    fn fetch_table(&self, _table: SourceTable) -> BiblioResult<Vec<SourceRecord>> {
        Err(SyncError::SourceUnavailable("connection refused".into()))
    }
}

enum Fault {
    /// Book upserts hit a uniqueness violation.
    BookConstraint,
    /// Book upserts fail with a non-constraint store error.
    BookStore,
    /// The flag is raised while targets are being cleared.
    CancelOnClear(CancelFlag),
}

struct FaultyGraph {
    inner: MemoryGraph,
    fault: Fault,
}

#[async_trait]
impl GraphStore for FaultyGraph {
    async fn ensure_constraint(&self, kind: EntityKind, property: &str) -> GraphResult<()> {
        self.inner.ensure_constraint(kind, property).await
    }

    async fn upsert_node(&self, kind: EntityKind, key: i64, properties: &Properties) -> GraphResult<bool> {
        match (&self.fault, kind) {
            (Fault::BookConstraint, EntityKind::Book) => {
                Err(GraphError::constraint(NodeId::new(kind, key), "isbn already exists"))
            }
            (Fault::BookStore, EntityKind::Book) => Err(GraphError::InvalidProperty("bad-name".into())),
            _ => self.inner.upsert_node(kind, key, properties).await,
        }
    }

    async fn upsert_edge(&self, edge: &EdgeId) -> GraphResult<bool> {
        self.inner.upsert_edge(edge).await
    }

    async fn clear_all(&self) -> GraphResult<ClearStats> {
        if let Fault::CancelOnClear(flag) = &self.fault {
            flag.cancel();
        }
        self.inner.clear_all().await
    }

    async fn node_count(&self, kind: EntityKind) -> GraphResult<usize> {
        self.inner.node_count(kind).await
    }

    async fn edge_count(&self, rel: RelKind) -> GraphResult<usize> {
        self.inner.edge_count(rel).await
    }

    async fn node_keys(&self, kind: EntityKind) -> GraphResult<Vec<i64>> {
        self.inner.node_keys(kind).await
    }

    async fn incident_edges(&self, nodes: &[NodeId]) -> GraphResult<Vec<EdgeId>> {
        self.inner.incident_edges(nodes).await
    }

    async fn fetch_nodes(&self, ids: &[NodeId]) -> GraphResult<Vec<GraphNode>> {
        self.inner.fetch_nodes(ids).await
    }
}

#[tokio::test]
async fn test_full_sync_twice_yields_identical_counts() {
    let source = seeded_source();
    let graph = MemoryGraph::new();
    let warehouse = warehouse();

    let first = pipeline(&source, &graph, &warehouse).run(SyncMode::Full).await;
    assert!(first.is_success(), "{:?}", first.stages);
    let graph_before = GraphStats::collect(&graph).await.unwrap();
    let tables_before = table_counts(&warehouse).unwrap();
    let keys_before = load_key_map(&warehouse, WarehouseTable::DimBook).unwrap();

    let second = pipeline(&source, &graph, &warehouse).run(SyncMode::Full).await;
    assert!(second.is_success());
    assert_eq!(GraphStats::collect(&graph).await.unwrap(), graph_before);
    assert_eq!(table_counts(&warehouse).unwrap(), tables_before);
    assert_eq!(load_key_map(&warehouse, WarehouseTable::DimBook).unwrap(), keys_before);
    assert_eq!(second.counts["fact_loan"], first.counts["fact_loan"]);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_full_sync_is_referentially_complete() {
    let source = seeded_source();
    let graph = MemoryGraph::new();
    let warehouse = warehouse();

    let report = pipeline(&source, &graph, &warehouse).run(SyncMode::Full).await;
    assert_eq!(report.state, RunState::Complete);
    assert!(report.gaps.is_empty());
    assert!(report.anomalies.is_empty());
    assert!(graph.dangling_edges().await.is_empty());
    assert_eq!(referential_violations(&warehouse).unwrap(), 0);

    let stats = GraphStats::collect(&graph).await.unwrap();
    assert_eq!(stats.nodes[&EntityKind::Loan], 150);
    assert_eq!(report.counts["fact_loan"], 150);
    assert_eq!(report.counts["Loan"], 150);
    for stage in Stage::ALL {
        assert_eq!(report.status(stage), Some(&StageStatus::Completed), "{stage}");
    }
}

#[tokio::test]
async fn test_authors_and_books_scenario() {
    let source = DbPool::in_memory().unwrap();
    run_source_migrations(&source).unwrap();
    let mut records = Vec::new();
    for (id, first, last) in [(1, "Ursula", "Le Guin"), (2, "Octavia", "Butler"), (3, "Italo", "Calvino")] {
        records.push(SourceRecord::Author(AuthorRecord {
            id,
            first_name: first.into(),
            last_name: last.into(),
        }));
    }
    for id in 1..=5 {
        records.push(SourceRecord::Book(BookRecord {
            id,
            isbn: Some(format!("978-0-0000-{id:04}")),
            title: format!("Book {id}"),
            publication_year: Some(1970 + id),
            copies_available: 2,
        }));
    }
    for (author_id, book_id) in [(1, 1), (1, 2), (2, 3), (3, 4), (3, 5)] {
        records.push(SourceRecord::BookAuthor(BookAuthorRecord { book_id, author_id }));
    }
    insert_records(&source, &records).unwrap();

    let graph = MemoryGraph::new();
    let warehouse = warehouse();
    let report = pipeline(&source, &graph, &warehouse).run(SyncMode::Full).await;

    assert!(report.is_success());
    assert!(report.gaps.is_empty());
    let stats = GraphStats::collect(&graph).await.unwrap();
    assert_eq!(stats.nodes[&EntityKind::Author], 3);
    assert_eq!(stats.nodes[&EntityKind::Book], 5);
    assert_eq!(stats.relationships[&RelKind::Wrote], 5);
    assert_eq!(report.counts["WROTE"], 5);
    assert_eq!(report.counts["bridge_book_author"], 5);
}

#[tokio::test]
async fn test_unavailable_source_writes_nothing() {
    let graph = MemoryGraph::new();
    let warehouse = warehouse();
    let report = Pipeline::new(Arc::new(DownSource), &graph, warehouse.clone())
        .run(SyncMode::Full)
        .await;

    assert_eq!(report.state, RunState::Failed(Stage::Prepare));
    assert!(report.aborted);
    assert!(matches!(report.status(Stage::Prepare), Some(StageStatus::Failed(_))));
    for stage in &Stage::ALL[1..] {
        assert!(matches!(report.status(*stage), Some(StageStatus::Skipped(_))), "{stage}");
    }
    assert!(graph.constraints().await.is_empty());
    assert_eq!(GraphStats::collect(&graph).await.unwrap().total_nodes, 0);
    // Not even the warehouse schema was created.
    assert!(table_counts(&warehouse).is_err());
}

#[tokio::test]
async fn test_constraint_violation_aborts_later_phases() {
    let source = seeded_source();
    let graph = FaultyGraph {
        inner: MemoryGraph::new(),
        fault: Fault::BookConstraint,
    };
    let warehouse = warehouse();
    let report = pipeline(&source, &graph, &warehouse).run(SyncMode::Full).await;

    assert_eq!(report.state, RunState::Failed(Stage::GraphNodes));
    assert_eq!(report.status(Stage::Dimensions), Some(&StageStatus::Completed));
    for stage in [Stage::GraphRelationships, Stage::Facts, Stage::Bridges] {
        assert_eq!(
            report.status(stage),
            Some(&StageStatus::Skipped("pipeline aborted".into())),
            "{stage}"
        );
    }
    assert_eq!(table_counts(&warehouse).unwrap()["fact_loan"], 0);
}

#[tokio::test]
async fn test_store_failure_skips_only_dependents() {
    let source = seeded_source();
    let graph = FaultyGraph {
        inner: MemoryGraph::new(),
        fault: Fault::BookStore,
    };
    let warehouse = warehouse();
    let report = pipeline(&source, &graph, &warehouse).run(SyncMode::Full).await;

    assert_eq!(report.state, RunState::Failed(Stage::GraphNodes));
    assert!(!report.aborted);
    assert!(matches!(report.status(Stage::GraphRelationships), Some(StageStatus::Skipped(_))));
    for stage in [Stage::Dimensions, Stage::Facts, Stage::Bridges] {
        assert_eq!(report.status(stage), Some(&StageStatus::Completed), "{stage}");
    }
    assert_eq!(table_counts(&warehouse).unwrap()["fact_loan"], 150);
    assert_eq!(referential_violations(&warehouse).unwrap(), 0);
}

#[tokio::test]
async fn test_cancel_is_honoured_between_phases() {
    let source = seeded_source();
    let cancel = CancelFlag::new();
    let graph = FaultyGraph {
        inner: MemoryGraph::new(),
        fault: Fault::CancelOnClear(cancel.clone()),
    };
    let warehouse = warehouse();
    let report = pipeline(&source, &graph, &warehouse)
        .with_cancel(cancel)
        .run(SyncMode::Full)
        .await;

    // Prepare was already running, so it completes.
    assert_eq!(report.status(Stage::Prepare), Some(&StageStatus::Completed));
    for stage in &Stage::ALL[1..] {
        assert_eq!(report.status(*stage), Some(&StageStatus::Cancelled), "{stage}");
    }
    assert_eq!(report.state, RunState::Cancelled(Stage::GraphNodes));
    assert!(!report.is_success());
    assert_eq!(GraphStats::collect(&graph).await.unwrap().total_nodes, 0);
}

#[tokio::test]
async fn test_incremental_keeps_keys_and_appends() {
    let source = seeded_source();
    let graph = MemoryGraph::new();
    let warehouse = warehouse();

    assert!(pipeline(&source, &graph, &warehouse).run(SyncMode::Full).await.is_success());
    let members_before = load_key_map(&warehouse, WarehouseTable::DimMember).unwrap();
    let max_key = members_before.values().copied().max().unwrap();

    insert_records(
        &source,
        &[
            SourceRecord::Member(MemberRecord {
                id: 1_000,
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email: None,
                phone: None,
                membership_date: Some(today()),
                status: "active".into(),
            }),
            SourceRecord::Loan(LoanRecord {
                id: 5_000,
                member_id: 1_000,
                book_id: 1,
                staff_id: 1,
                loan_date: today(),
                due_date: today() + chrono::Duration::days(14),
                return_date: None,
                status: "active".into(),
            }),
        ],
    )
    .unwrap();

    let report = pipeline(&source, &graph, &warehouse).run(SyncMode::Incremental).await;
    assert!(report.is_success());
    assert!(!report.counts.contains_key("warehouse_rows_deleted"));

    let members_after = load_key_map(&warehouse, WarehouseTable::DimMember).unwrap();
    for (natural, key) in &members_before {
        assert_eq!(members_after[natural], *key);
    }
    assert_eq!(members_after[&1_000], max_key + 1);
    assert_eq!(table_counts(&warehouse).unwrap()["fact_loan"], 151);
    assert_eq!(GraphStats::collect(&graph).await.unwrap().nodes[&EntityKind::Member], 26);

    let tables = table_counts(&warehouse).unwrap();
    assert!(pipeline(&source, &graph, &warehouse).run(SyncMode::Incremental).await.is_success());
    assert_eq!(table_counts(&warehouse).unwrap(), tables);
    assert_eq!(referential_violations(&warehouse).unwrap(), 0);
}
