//! `stats`: node, relationship and warehouse row counts.

use std::process::ExitCode;

use anyhow::Result;
use biblio_db::queries::warehouse::table_counts;
use biblio_graph::GraphStats;
use serde_json::json;

use super::Context;
use crate::output;

pub async fn execute(ctx: &Context) -> Result<ExitCode> {
    let graph = ctx.graph().await?;
    let stats = GraphStats::collect(&graph).await?;
    let tables = table_counts(&ctx.existing_warehouse()?)?;

    if ctx.json {
        let body = json!({ "graph": stats, "warehouse": tables });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        output::print_graph_stats(&stats);
        println!();
        output::print_counts("Warehouse", tables.iter().map(|(name, count)| (*name, *count)));
    }
    Ok(ExitCode::SUCCESS)
}
