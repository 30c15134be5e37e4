//! `full-sync` and `incremental`.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use biblio_core::{SyncError, SyncMode};
use biblio_db::{DbPool, SqliteSource};
use biblio_etl::{CancelFlag, Pipeline, RunReport};
use biblio_graph::GraphClient;
use colored::Colorize;
use tracing::{error, warn};

use super::Context;
use crate::output;

struct Targets {
    source: SqliteSource,
    graph: GraphClient,
    warehouse: DbPool,
}

/// Open the source, then the graph, then the warehouse. The warehouse file
/// is only created once the other two are reachable.
async fn open_targets(ctx: &Context) -> Result<Targets, SyncError> {
    let source_path = &ctx.config.source.path;
    let source = DbPool::open_existing(source_path).map_err(|e| {
        SyncError::SourceUnavailable(format!("opening {}: {e}", source_path.display()))
    })?;

    let graph = GraphClient::connect(&ctx.config.graph).await.map_err(|e| {
        SyncError::TargetUnavailable(format!("connecting to Neo4j at {}: {e}", ctx.config.graph.uri))
    })?;

    let warehouse_path = &ctx.config.warehouse.path;
    let warehouse = DbPool::open(warehouse_path).map_err(|e| {
        SyncError::TargetUnavailable(format!("opening warehouse {}: {e}", warehouse_path.display()))
    })?;

    Ok(Targets {
        source: SqliteSource::new(source),
        graph,
        warehouse,
    })
}

fn print(report: &RunReport, ctx: &Context) -> Result<ExitCode> {
    if ctx.json {
        println!("{}", report.to_json()?);
    } else {
        output::print_report(report, ctx.verbose);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn execute(mode: SyncMode, ctx: &Context) -> Result<ExitCode> {
    let targets = match open_targets(ctx).await {
        Ok(targets) => targets,
        Err(err) => {
            error!(error = %err, "Sync could not start");
            return print(&RunReport::unavailable(mode, &err), ctx);
        }
    };

    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping before the next phase");
            flag.cancel();
        }
    });

    if !ctx.json {
        println!("{} {}", "Running".bold(), format!("{mode} sync").cyan());
    }
    let report = Pipeline::new(Arc::new(targets.source), &targets.graph, targets.warehouse)
        .with_cancel(cancel)
        .run(mode)
        .await;

    print(&report, ctx)
}
