//! The sync orchestrator.
//!
//! A run reads the source once, prepares both targets, then executes three
//! phases separated by hard barriers:
//!
//! 1. graph nodes ∥ dimensions
//! 2. graph relationships ∥ facts
//! 3. bridges
//!
//! Nothing is rolled back on failure. Every component is idempotent, so the
//! recovery for a failed run is another run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use biblio_core::{BiblioResult, SourceReader, SourceSnapshot, SourceTable, SyncError, SyncMode};
use biblio_db::migrations::run_warehouse_migrations;
use biblio_db::queries::warehouse::clear_warehouse;
use biblio_db::{DbPool, DbResult};
use biblio_graph::{materialize_nodes, materialize_relationships, prepare_schema, GraphStore, SyncResult};
use biblio_olap::{load_bridges, load_dimensions, load_facts, DimensionKeys};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::report::{RunReport, StageOutcome};
use crate::stage::{RunState, Stage};

/// Shared flag checked at every phase boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run a warehouse operation on the blocking pool.
async fn blocking<T, F>(task: F) -> BiblioResult<T>
where
    F: FnOnce() -> DbResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result.map_err(SyncError::from),
        Err(err) => Err(SyncError::store(format!("warehouse task failed: {err}"))),
    }
}

fn node_outcome(result: SyncResult) -> StageOutcome {
    StageOutcome {
        counts: result.counts,
        gaps: result.gaps,
        anomalies: Vec::new(),
    }
    .count("nodes_created", result.nodes_created)
    .count("nodes_updated", result.nodes_updated)
}

fn relationship_outcome(result: SyncResult) -> StageOutcome {
    StageOutcome {
        counts: result.counts,
        gaps: result.gaps,
        anomalies: Vec::new(),
    }
    .count("relationships_created", result.relationships_created)
    .count("relationships_matched", result.relationships_matched)
}

pub struct Pipeline<'a, S: GraphStore + ?Sized> {
    source: Arc<dyn SourceReader>,
    graph: &'a S,
    warehouse: DbPool,
    today: NaiveDate,
    cancel: CancelFlag,
}

impl<'a, S: GraphStore + ?Sized> Pipeline<'a, S> {
    pub fn new(source: Arc<dyn SourceReader>, graph: &'a S, warehouse: DbPool) -> Self {
        Self {
            source,
            graph,
            warehouse,
            today: chrono::Local::now().date_naive(),
            cancel: CancelFlag::new(),
        }
    }

    /// Reference date for open-loan measures.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, mode: SyncMode) -> RunReport {
        let mut report = RunReport::new(mode);
        info!(run_id = %report.run_id, %mode, "Sync started");

        if let Some(snapshot) = self.prepare(&mut report, mode).await {
            let keys = self.load_entities(&mut report, &snapshot).await;
            self.load_links(&mut report, &snapshot, keys.as_ref()).await;
            self.normalize(&mut report, &snapshot, keys.as_ref()).await;
        } else {
            for stage in &Stage::ALL[1..] {
                self.gate(&mut report, *stage);
            }
        }

        report.finish();
        if report.is_success() {
            info!(run_id = %report.run_id, gaps = report.gaps.len(), "Sync complete");
        } else {
            error!(run_id = %report.run_id, state = %report.state, "Sync did not complete");
        }
        report
    }

    /// Record why `stage` cannot start, or return `true` when it may.
    fn gate(&self, report: &mut RunReport, stage: Stage) -> bool {
        if self.cancel.is_cancelled() {
            warn!(%stage, "Cancelled before stage");
            report.cancel(stage);
            return false;
        }
        if let Some(reason) = report.blocker(stage) {
            warn!(%stage, reason = %reason, "Skipping stage");
            report.skip(stage, reason);
            return false;
        }
        true
    }

    fn settle(&self, report: &mut RunReport, stage: Stage, result: BiblioResult<StageOutcome>) {
        match result {
            Ok(outcome) => {
                info!(%stage, gaps = outcome.gaps.len(), "Stage completed");
                report.complete(stage, outcome);
            }
            Err(err) => {
                error!(%stage, error = %err, "Stage failed");
                report.fail(stage, &err);
            }
        }
    }

    async fn prepare(&self, report: &mut RunReport, mode: SyncMode) -> Option<Arc<SourceSnapshot>> {
        if !self.gate(report, Stage::Prepare) {
            return None;
        }
        report.state = RunState::Preparing;
        match self.run_prepare(mode).await {
            Ok((snapshot, outcome)) => {
                self.settle(report, Stage::Prepare, Ok(outcome));
                Some(snapshot)
            }
            Err(err) => {
                self.settle(report, Stage::Prepare, Err(err));
                None
            }
        }
    }

    /// Read the source before any write, so an unreachable source leaves
    /// both targets untouched.
    async fn run_prepare(&self, mode: SyncMode) -> BiblioResult<(Arc<SourceSnapshot>, StageOutcome)> {
        let source = Arc::clone(&self.source);
        let snapshot = tokio::task::spawn_blocking(move || source.read_snapshot())
            .await
            .map_err(|e| SyncError::SourceUnavailable(format!("source read task failed: {e}")))??;

        let mut outcome = StageOutcome::default();
        for table in SourceTable::ALL {
            outcome.counts.insert(format!("source.{}", table.name()), snapshot.row_count(table));
        }

        let constraints = prepare_schema(self.graph).await?;
        let pool = self.warehouse.clone();
        blocking(move || run_warehouse_migrations(&pool)).await?;
        outcome = outcome.count("graph_constraints", constraints);

        if mode.clears_targets() {
            let cleared = self.graph.clear_all().await?;
            let pool = self.warehouse.clone();
            let deleted = blocking(move || clear_warehouse(&pool)).await?;
            info!(
                nodes = cleared.nodes_deleted,
                relationships = cleared.relationships_deleted,
                warehouse_rows = deleted,
                "Targets cleared"
            );
            outcome = outcome
                .count("graph_nodes_deleted", cleared.nodes_deleted)
                .count("graph_relationships_deleted", cleared.relationships_deleted)
                .count("warehouse_rows_deleted", deleted);
        }

        Ok((Arc::new(snapshot), outcome))
    }

    async fn load_entities(&self, report: &mut RunReport, snapshot: &Arc<SourceSnapshot>) -> Option<DimensionKeys> {
        let run_nodes = self.gate(report, Stage::GraphNodes);
        let run_dimensions = self.gate(report, Stage::Dimensions);
        report.state = RunState::LoadingEntities;

        let nodes = async {
            if !run_nodes {
                return None;
            }
            Some(materialize_nodes(self.graph, snapshot).await.map_err(SyncError::from))
        };
        let dimensions = async {
            if !run_dimensions {
                return None;
            }
            let pool = self.warehouse.clone();
            let snapshot = Arc::clone(snapshot);
            Some(blocking(move || load_dimensions(&pool, &snapshot)).await)
        };
        let (nodes, dimensions) = tokio::join!(nodes, dimensions);

        if let Some(result) = nodes {
            self.settle(report, Stage::GraphNodes, result.map(node_outcome));
        }
        match dimensions? {
            Ok(load) => {
                let outcome = StageOutcome {
                    counts: load.counts,
                    ..StageOutcome::default()
                };
                self.settle(report, Stage::Dimensions, Ok(outcome));
                Some(load.keys)
            }
            Err(err) => {
                self.settle(report, Stage::Dimensions, Err(err));
                None
            }
        }
    }

    async fn load_links(&self, report: &mut RunReport, snapshot: &Arc<SourceSnapshot>, keys: Option<&DimensionKeys>) {
        let run_relationships = self.gate(report, Stage::GraphRelationships);
        let run_facts = self.gate(report, Stage::Facts) && keys.is_some();
        report.state = RunState::LoadingLinks;

        let relationships = async {
            if !run_relationships {
                return None;
            }
            Some(materialize_relationships(self.graph, snapshot).await.map_err(SyncError::from))
        };
        let facts = async {
            let keys = keys.filter(|_| run_facts)?.clone();
            let pool = self.warehouse.clone();
            let snapshot = Arc::clone(snapshot);
            let today = self.today;
            Some(blocking(move || load_facts(&pool, &snapshot, &keys, today)).await)
        };
        let (relationships, facts) = tokio::join!(relationships, facts);

        if let Some(result) = relationships {
            self.settle(report, Stage::GraphRelationships, result.map(relationship_outcome));
        }
        if let Some(result) = facts {
            let outcome = result.map(|load| StageOutcome {
                gaps: load.gaps,
                ..StageOutcome::default()
            }
            .count("fact_loan", load.rows));
            self.settle(report, Stage::Facts, outcome);
        }
    }

    async fn normalize(&self, report: &mut RunReport, snapshot: &Arc<SourceSnapshot>, keys: Option<&DimensionKeys>) {
        let runnable = self.gate(report, Stage::Bridges);
        let Some(keys) = keys.filter(|_| runnable).cloned() else {
            return;
        };
        report.state = RunState::Normalizing;

        let pool = self.warehouse.clone();
        let snapshot = Arc::clone(snapshot);
        let result = blocking(move || load_bridges(&pool, &snapshot, &keys))
            .await
            .map(|load| StageOutcome {
                counts: load.counts,
                gaps: load.gaps,
                anomalies: load.anomalies,
            });
        self.settle(report, Stage::Bridges, result);
    }
}
