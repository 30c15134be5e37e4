//! Biblio CLI
//!
//! Synchronizes a library database into a Neo4j graph and a SQLite star
//! schema, and queries both.

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::Cli;

/// Logs go to stderr so `--json` output on stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "biblio=debug,biblio_etl=debug,biblio_graph=debug,biblio_olap=debug,biblio_db=debug"
    } else {
        "biblio=info,biblio_etl=info,biblio_graph=info,biblio_olap=info,biblio_db=warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.execute().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
