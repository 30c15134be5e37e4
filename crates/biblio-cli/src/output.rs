//! Terminal output formatting.

use std::collections::BTreeMap;

use biblio_db::queries::analytics::{
    BookPopularity, CategoryLoans, MemberBehavior, MonthlyTrend, StaffPerformance, WeekdayPattern,
    YearSummary,
};
use biblio_etl::{RunReport, RunState, StageStatus};
use biblio_graph::{GraphStats, SampledSubgraph};
use colored::{ColoredString, Colorize};
use unicode_width::UnicodeWidthStr;

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string respecting visual width.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}

fn cell(s: &str, width: usize) -> String {
    pad_right(&truncate_visual(s, width), width)
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string())
}

fn status_label(status: &StageStatus) -> ColoredString {
    match status {
        StageStatus::Completed => "completed".green(),
        StageStatus::Failed(_) => "failed".red().bold(),
        StageStatus::Skipped(_) => "skipped".yellow(),
        StageStatus::Cancelled => "cancelled".dimmed(),
    }
}

/// Print a run report; `verbose` adds the counts of every stage.
pub fn print_report(report: &RunReport, verbose: bool) {
    println!();
    println!(
        "{} {} {}",
        "Run".bold(),
        report.run_id.to_string()[..8].dimmed(),
        format!("({})", report.mode).dimmed()
    );
    println!("{}", "─".repeat(60));

    for stage in &report.stages {
        let detail = match &stage.status {
            StageStatus::Failed(reason) | StageStatus::Skipped(reason) => reason.as_str(),
            _ => "",
        };
        println!(
            "  {} {} {}",
            pad_right(stage.stage.name(), 22),
            status_label(&stage.status),
            detail.dimmed()
        );
        if verbose {
            for (name, count) in &stage.counts {
                println!("      {} {}", pad_right(name, 32).dimmed(), count);
            }
        }
    }

    if !report.gaps.is_empty() {
        println!();
        println!("{} {}", "Referential gaps:".yellow().bold(), report.gaps.len());
        let shown = if verbose { report.gaps.len() } else { 5 };
        for gap in report.gaps.iter().take(shown) {
            println!("  {}", gap.to_string().dimmed());
        }
        if report.gaps.len() > shown {
            println!("  {}", format!("... {} more (use --verbose)", report.gaps.len() - shown).dimmed());
        }
    }

    if !report.anomalies.is_empty() {
        println!();
        println!("{} {}", "Weight anomalies:".red().bold(), report.anomalies.len());
        for anomaly in &report.anomalies {
            println!("  {anomaly}");
        }
    }

    println!();
    match report.state {
        RunState::Complete => println!("{}", "Sync complete.".green().bold()),
        state => println!("{} {}", "Sync did not complete:".red().bold(), state),
    }
}

/// Print name/count pairs under a heading.
pub fn print_counts<'a>(title: &str, counts: impl IntoIterator<Item = (&'a str, usize)>) {
    println!("{}", title.bold());
    let mut total = 0;
    for (name, count) in counts {
        total += count;
        println!("  {} {:>8}", pad_right(name, 24), count);
    }
    println!("  {} {:>8}", pad_right("total", 24).dimmed(), total);
}

pub fn print_graph_stats(stats: &GraphStats) {
    print_counts("Nodes", stats.nodes.iter().map(|(kind, n)| (kind.label(), *n)));
    println!();
    print_counts("Relationships", stats.relationships.iter().map(|(rel, n)| (rel.as_str(), *n)));
}

pub fn print_sample(sample: &SampledSubgraph, budget: usize) {
    let mut per_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for node in &sample.nodes {
        *per_kind.entry(node.id.kind.label()).or_insert(0) += 1;
    }

    let hub = sample.hub.map(|k| k.label()).unwrap_or("none");
    println!(
        "{} {} of {} nodes, {} edges, hub {}",
        "Sample:".bold(),
        sample.nodes.len(),
        budget,
        sample.edges.len(),
        hub.cyan()
    );
    if sample.truncated {
        println!("{}", "Budget reached; some enabled nodes were left out.".dimmed());
    }
    println!();
    print_counts("Nodes", per_kind.into_iter());
}

pub fn print_trends(rows: &[MonthlyTrend]) {
    if rows.is_empty() {
        println!("{}", "No loans in the warehouse.".dimmed());
        return;
    }
    println!("{:<6} {:<10} {:>8} {:>10} {:>9} {:>10}", "Year", "Month", "Loans", "Loan days", "Avg days", "Fines");
    println!("{}", "─".repeat(58));
    for row in rows {
        println!(
            "{:<6} {} {:>8} {:>10} {:>9} {:>10.2}",
            row.year,
            cell(&row.month_name, 10),
            row.total_loans,
            row.total_loan_days,
            opt(row.avg_loan_duration),
            row.total_fines
        );
    }
}

pub fn print_categories(rows: &[CategoryLoans], weighted_total: f64) {
    if rows.is_empty() {
        println!("{}", "No categorized loans in the warehouse.".dimmed());
        return;
    }
    println!("{:<24} {:>10} {:>8} {:>9}", "Category", "Weighted", "Raw", "Avg days");
    println!("{}", "─".repeat(54));
    for row in rows {
        println!(
            "{} {:>10.2} {:>8} {:>9}",
            cell(&row.category_name, 24),
            row.weighted_loans,
            row.raw_loan_count,
            opt(row.avg_duration)
        );
    }
    println!("{} {:>10.2}", pad_right("total", 24).dimmed(), weighted_total);
}

pub fn print_staff(rows: &[StaffPerformance]) {
    if rows.is_empty() {
        println!("{}", "No loans in the warehouse.".dimmed());
        return;
    }
    println!(
        "{:<24} {:<10} {:>8} {:>9} {:>8} {:>8}",
        "Staff", "Role", "Loans", "Avg days", "Overdue", "Overdue%"
    );
    println!("{}", "─".repeat(72));
    for row in rows {
        let pct = format!("{:.1}", row.overdue_pct);
        let pct = if row.overdue_pct >= 25.0 { pct.red() } else { pct.normal() };
        println!(
            "{} {} {:>8} {:>9} {:>8} {:>8}",
            cell(&row.full_name, 24),
            cell(&row.role, 10),
            row.loans_processed,
            opt(row.avg_loan_duration),
            row.overdue_loans,
            pct
        );
    }
}

pub fn print_books(rows: &[BookPopularity]) {
    if rows.is_empty() {
        println!("{}", "No loans in the warehouse.".dimmed());
        return;
    }
    println!(
        "{:<30} {:<24} {:>6} {:>8} {:>9} {:>8}",
        "Title", "Authors", "Year", "Loans", "Avg days", "Fines"
    );
    println!("{}", "─".repeat(90));
    for row in rows {
        let year = row.publication_year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{} {} {:>6} {:>8} {:>9} {:>8.2}",
            cell(&row.title, 30),
            cell(&row.authors, 24),
            year,
            row.times_borrowed,
            opt(row.avg_duration),
            row.total_fines
        );
    }
}

pub fn print_members(rows: &[MemberBehavior]) {
    if rows.is_empty() {
        println!("{}", "No loans in the warehouse.".dimmed());
        return;
    }
    println!(
        "{:<24} {:>6} {:<10} {:>6} {:>9} {:>8} {:>8}",
        "Member", "Since", "Status", "Loans", "Avg days", "Overdue", "Fines"
    );
    println!("{}", "─".repeat(78));
    for row in rows {
        let since = row.membership_year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{} {:>6} {} {:>6} {:>9} {:>8} {:>8.2}",
            cell(&row.full_name, 24),
            since,
            cell(&row.status, 10),
            row.total_loans,
            opt(row.avg_duration),
            row.total_days_overdue,
            row.total_fines
        );
    }
}

pub fn print_weekdays(rows: &[WeekdayPattern]) {
    if rows.is_empty() {
        println!("{}", "No loans in the warehouse.".dimmed());
        return;
    }
    println!("{:<8} {:<10} {:>8} {:>9} {:>10}", "Type", "Day", "Loans", "Avg days", "Fines");
    println!("{}", "─".repeat(50));
    for row in rows {
        let kind = if row.is_weekend {
            pad_right("Weekend", 8).cyan()
        } else {
            pad_right("Weekday", 8).normal()
        };
        println!(
            "{} {} {:>8} {:>9} {:>10.2}",
            kind,
            cell(&row.day_name, 10),
            row.total_loans,
            opt(row.avg_duration),
            row.total_fines
        );
    }
}

pub fn print_years(rows: &[YearSummary]) {
    if rows.is_empty() {
        println!("{}", "No loans in the warehouse.".dimmed());
        return;
    }
    println!(
        "{:<6} {:>8} {:>8} {:>8} {:>9} {:>10} {:>8}",
        "Year", "Loans", "Members", "Books", "Avg days", "Fines", "Overdue"
    );
    println!("{}", "─".repeat(64));
    for row in rows {
        println!(
            "{:<6} {:>8} {:>8} {:>8} {:>9} {:>10.2} {:>8}",
            row.year,
            row.total_loans,
            row.unique_members,
            row.unique_books,
            opt(row.avg_duration),
            row.total_fines,
            row.overdue_count
        );
    }
}
