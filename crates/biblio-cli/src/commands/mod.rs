//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use biblio_core::SyncMode;
use biblio_db::DbPool;
use biblio_etl::AppConfig;
use biblio_graph::GraphClient;
use clap::{Parser, Subcommand};

pub mod analytics;
pub mod query;
pub mod sample;
pub mod seed;
pub mod stats;
pub mod sync;

/// Biblio - library graph and warehouse sync
#[derive(Parser)]
#[command(name = "biblio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print per-stage counts and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./biblio.toml when present)
    #[arg(short, long, global = true, env = "BIBLIO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clear both targets and reload everything
    FullSync,

    /// Load into existing targets without clearing
    Incremental,

    /// Sample a bounded, connected subgraph for rendering
    Sample(sample::SampleArgs),

    /// Show graph and warehouse counts
    Stats,

    /// Run a parameterized read query against the graph
    Query(query::QueryArgs),

    /// Aggregate reports over the star schema
    Analytics(analytics::AnalyticsArgs),

    /// Fill the source database with generated library data
    Seed(seed::SeedArgs),
}

/// Settings shared by every command.
pub struct Context {
    pub config: AppConfig,
    pub verbose: bool,
    pub json: bool,
}

impl Context {
    pub async fn graph(&self) -> Result<GraphClient> {
        GraphClient::connect(&self.config.graph)
            .await
            .with_context(|| format!("connecting to Neo4j at {}", self.config.graph.uri))
    }

    /// The warehouse as last written; fails instead of creating an empty one.
    pub fn existing_warehouse(&self) -> Result<DbPool> {
        let path = &self.config.warehouse.path;
        DbPool::open_existing(path)
            .with_context(|| format!("opening warehouse {} (run a sync first)", path.display()))
    }
}

impl Cli {
    pub async fn execute(self) -> Result<ExitCode> {
        let config = AppConfig::load(self.config.as_deref()).context("loading configuration")?;
        let ctx = Context {
            config,
            verbose: self.verbose,
            json: self.json,
        };

        match self.command {
            Commands::FullSync => sync::execute(SyncMode::Full, &ctx).await,
            Commands::Incremental => sync::execute(SyncMode::Incremental, &ctx).await,
            Commands::Sample(args) => sample::execute(args, &ctx).await,
            Commands::Stats => stats::execute(&ctx).await,
            Commands::Query(args) => query::execute(args, &ctx).await,
            Commands::Analytics(args) => analytics::execute(args, &ctx),
            Commands::Seed(args) => seed::execute(args, &ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["biblio", "full-sync", "--json", "-v"]).unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::FullSync));
    }
}
