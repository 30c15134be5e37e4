//! `analytics`: aggregate reports over the star schema.

use std::process::ExitCode;

use anyhow::Result;
use biblio_db::queries::analytics::{
    category_weighted, member_behavior, monthly_trends, staff_performance, top_books,
    weekday_patterns, weighted_loan_total, yearly_comparison,
};
use clap::{Args, ValueEnum};
use serde_json::json;

use super::Context;
use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Report {
    /// Loans, loan days and fines per month
    Trends,
    /// Most borrowed books
    Books,
    /// Loans per category, weighted through the book-category bridge
    Categories,
    /// Loans processed and overdue share per staff member
    Staff,
    /// Borrowing and fine history of the most active members
    Members,
    /// Loans per day of the week, weekdays against weekends
    Weekdays,
    /// Loans, distinct members and books per year
    Years,
}

impl Report {
    fn default_limit(self) -> usize {
        match self {
            Report::Members => 25,
            _ => 20,
        }
    }
}

#[derive(Args)]
pub struct AnalyticsArgs {
    #[arg(value_enum)]
    pub report: Report,

    /// Rows to show for ranked reports (books: 20, members: 25)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

fn emit(ctx: &Context, body: serde_json::Value, print: impl FnOnce()) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print();
    }
    Ok(())
}

pub fn execute(args: AnalyticsArgs, ctx: &Context) -> Result<ExitCode> {
    let warehouse = ctx.existing_warehouse()?;
    let limit = args.limit.unwrap_or_else(|| args.report.default_limit());

    match args.report {
        Report::Trends => {
            let rows = monthly_trends(&warehouse)?;
            emit(ctx, serde_json::to_value(&rows)?, || output::print_trends(&rows))?;
        }
        Report::Books => {
            let rows = top_books(&warehouse, limit)?;
            emit(ctx, serde_json::to_value(&rows)?, || output::print_books(&rows))?;
        }
        Report::Categories => {
            let rows = category_weighted(&warehouse)?;
            let total = weighted_loan_total(&warehouse)?;
            let body = json!({ "categories": rows, "weighted_total": total });
            emit(ctx, body, || output::print_categories(&rows, total))?;
        }
        Report::Staff => {
            let rows = staff_performance(&warehouse)?;
            emit(ctx, serde_json::to_value(&rows)?, || output::print_staff(&rows))?;
        }
        Report::Members => {
            let rows = member_behavior(&warehouse, limit)?;
            emit(ctx, serde_json::to_value(&rows)?, || output::print_members(&rows))?;
        }
        Report::Weekdays => {
            let rows = weekday_patterns(&warehouse)?;
            emit(ctx, serde_json::to_value(&rows)?, || output::print_weekdays(&rows))?;
        }
        Report::Years => {
            let rows = yearly_comparison(&warehouse)?;
            emit(ctx, serde_json::to_value(&rows)?, || output::print_years(&rows))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_reports_default_limits() {
        assert_eq!(Report::Books.default_limit(), 20);
        assert_eq!(Report::Members.default_limit(), 25);
        assert_eq!(Report::from_str("weekdays", true), Ok(Report::Weekdays));
    }
}
