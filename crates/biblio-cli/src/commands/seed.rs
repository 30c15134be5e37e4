//! `seed`: generate a library into the source database.

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use biblio_db::seed::{seed_source, SeedConfig};
use biblio_db::DbPool;
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;

use super::Context;
use crate::output;

#[derive(Args)]
pub struct SeedArgs {
    #[arg(long, default_value_t = 200)]
    pub members: usize,

    #[arg(long, default_value_t = 60)]
    pub authors: usize,

    #[arg(long, default_value_t = 300)]
    pub books: usize,

    #[arg(long, default_value_t = 12)]
    pub staff: usize,

    #[arg(long, default_value_t = 1500)]
    pub loans: usize,

    /// Random seed; the same seed produces the same library
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Reference date for loan ages, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

impl SeedArgs {
    fn config(&self) -> SeedConfig {
        SeedConfig {
            members: self.members,
            authors: self.authors,
            books: self.books,
            staff: self.staff,
            loans: self.loans,
            seed: self.seed,
            today: self.today.unwrap_or_else(|| chrono::Local::now().date_naive()),
        }
    }
}

pub fn execute(args: SeedArgs, ctx: &Context) -> Result<ExitCode> {
    let path = &ctx.config.source.path;
    let pool = DbPool::open(path).with_context(|| format!("opening source database {}", path.display()))?;
    let summary = seed_source(&pool, &args.config())?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{} {}", "Seeded".green().bold(), path.display());
        output::print_counts("Source rows", summary.tables.iter().map(|(table, n)| (table.name(), *n)));
    }
    Ok(ExitCode::SUCCESS)
}
