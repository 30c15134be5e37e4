//! Deterministic sample data for the source database.
//!
//! The same `SeedConfig` (including `today`) always produces the same rows,
//! which keeps demo runs and tests reproducible.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use biblio_core::{
    AuthorRecord, BookAuthorRecord, BookCategoryRecord, BookRecord, CategoryRecord, FineRecord,
    LoanRecord, MemberRecord, SourceRecord, SourceTable, StaffRecord,
};

use crate::migrations::run_source_migrations;
use crate::pool::{DbPool, DbResult};
use crate::queries::source::insert_records;

/// Days between checkout and due date.
pub const LOAN_PERIOD_DAYS: i64 = 14;
/// Fine accrued per overdue day.
pub const FINE_PER_DAY: f64 = 0.50;
/// Upper bound for a single fine.
pub const FINE_CAP: f64 = 25.00;

const CATEGORIES: &[(&str, &str)] = &[
    ("Fiction", "Narrative literary works based on imagination"),
    ("Classic", "Enduring works of literary excellence"),
    ("Mystery", "Fiction dealing with puzzling crimes or situations"),
    ("Science Fiction", "Fiction based on scientific discoveries or advanced technology"),
    ("Fantasy", "Fiction featuring magical or supernatural elements"),
    ("Horror", "Fiction intended to frighten or disturb readers"),
    ("Romance", "Fiction focused on romantic relationships"),
    ("Thriller", "Fast-paced fiction with tension and suspense"),
    ("Biography", "Account of a person's life written by someone else"),
    ("History", "Non-fiction about historical events and periods"),
    ("Philosophy", "Works exploring fundamental questions about existence"),
    ("Poetry", "Literary works written in verse"),
];

const AUTHORS: &[(&str, &str)] = &[
    ("George", "Orwell"),
    ("Jane", "Austen"),
    ("Harper", "Lee"),
    ("Ernest", "Hemingway"),
    ("Mark", "Twain"),
    ("Agatha", "Christie"),
    ("Charles", "Dickens"),
    ("Leo", "Tolstoy"),
    ("Virginia", "Woolf"),
    ("Toni", "Morrison"),
    ("Franz", "Kafka"),
    ("Homer", ""),
];

const TITLES: &[&str] = &[
    "1984", "Pride and Prejudice", "To Kill a Mockingbird", "The Old Man and the Sea",
    "The Adventures of Tom Sawyer", "Murder on the Orient Express", "Great Expectations",
    "War and Peace", "Mrs Dalloway", "Beloved", "The Trial", "The Odyssey", "Dune",
    "Foundation", "Frankenstein", "Dracula", "Jane Eyre", "Moby Dick",
];

const FIRST_NAMES: &[&str] = &[
    "Ada", "Ben", "Chloe", "Dev", "Elena", "Farid", "Grace", "Hugo", "Iris", "Jonas", "Kira",
    "Liam", "Maya", "Noah", "Olga", "Priya", "Quinn", "Rosa", "Sami", "Tara",
];

const LAST_NAMES: &[&str] = &[
    "Abbott", "Baker", "Chen", "Diaz", "Evans", "Fischer", "Garcia", "Hughes", "Ito", "Jensen",
    "Khan", "Lopez", "Moreau", "Novak", "Okafor", "Patel", "Rossi", "Silva", "Tanaka", "Weber",
];

/// Sizes and randomness of a generated library.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub members: usize,
    pub authors: usize,
    pub books: usize,
    pub staff: usize,
    pub loans: usize,
    pub seed: u64,
    /// Reference date for loan ages and open-loan fines.
    pub today: NaiveDate,
}

impl SeedConfig {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            members: 200,
            authors: 60,
            books: 300,
            staff: 12,
            loans: 1500,
            seed: 42,
            today,
        }
    }
}

/// Row counts written by [`seed_source`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedSummary {
    pub tables: Vec<(SourceTable, usize)>,
    pub rows: usize,
}

/// Build a complete, referentially consistent library.
pub fn generate(config: &SeedConfig) -> Vec<SourceRecord> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut records = Vec::new();

    for i in 0..config.members {
        let id = i as i64 + 1;
        let (first, last) = person(&mut rng);
        let status = match rng.gen_range(0..100) {
            0..=69 => "active",
            70..=89 => "expired",
            _ => "suspended",
        };
        records.push(SourceRecord::Member(MemberRecord {
            id,
            email: Some(format!("{}.{}{id}@email.com", first.to_lowercase(), last.to_lowercase())),
            phone: Some(format!("555-{}", rng.gen_range(1000..10000))),
            membership_date: Some(date_between(&mut rng, ymd(2020, 1, 1), config.today)),
            first_name: first.to_string(),
            last_name: last.to_string(),
            status: status.to_string(),
        }));
    }

    for i in 0..config.authors {
        let (first, last) = match AUTHORS.get(i) {
            Some(&(first, last)) => (first, last),
            None => person(&mut rng),
        };
        records.push(SourceRecord::Author(AuthorRecord {
            id: i as i64 + 1,
            first_name: first.to_string(),
            last_name: last.to_string(),
        }));
    }

    for (i, &(name, description)) in CATEGORIES.iter().enumerate() {
        records.push(SourceRecord::Category(CategoryRecord {
            id: i as i64 + 1,
            name: name.to_string(),
            description: Some(description.to_string()),
        }));
    }

    for i in 0..config.books {
        let id = i as i64 + 1;
        let title = match TITLES.get(i) {
            Some(title) => title.to_string(),
            None => format!("{} Volume {}", TITLES[i % TITLES.len()], i / TITLES.len() + 1),
        };
        records.push(SourceRecord::Book(BookRecord {
            id,
            isbn: Some(format!("978-{}-{:05}-{:04}", rng.gen_range(0..10), rng.gen_range(10000..100000), id)),
            title,
            publication_year: Some(rng.gen_range(1800..=2024)),
            copies_available: rng.gen_range(1..=10),
        }));

        if config.authors > 0 {
            let count = weighted_count(&mut rng, [70, 25, 5]).min(config.authors);
            let mut ids: Vec<i64> = (1..=config.authors as i64).collect();
            ids.shuffle(&mut rng);
            for &author_id in ids.iter().take(count) {
                records.push(SourceRecord::BookAuthor(BookAuthorRecord { book_id: id, author_id }));
            }
        }

        let count = weighted_count(&mut rng, [40, 45, 15]);
        let mut ids: Vec<i64> = (1..=CATEGORIES.len() as i64).collect();
        ids.shuffle(&mut rng);
        for &category_id in ids.iter().take(count) {
            records.push(SourceRecord::BookCategory(BookCategoryRecord { book_id: id, category_id }));
        }
    }

    for i in 0..config.staff {
        let id = i as i64 + 1;
        let (first, last) = person(&mut rng);
        records.push(SourceRecord::Staff(StaffRecord {
            id,
            email: Some(format!("{}.{}{id}@library.org", first.to_lowercase(), last.to_lowercase())),
            role: if rng.gen_bool(0.3) { "librarian" } else { "assistant" }.to_string(),
            hire_date: Some(date_between(&mut rng, ymd(2010, 1, 1), ymd(2023, 12, 31))),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }));
    }

    if config.members > 0 && config.books > 0 && config.staff > 0 {
        let mut fine_id = 0;
        for i in 0..config.loans {
            let id = i as i64 + 1;
            let loan = loan(&mut rng, id, config);
            if let Some(fine) = fine_for(&mut rng, &loan, config.today) {
                fine_id += 1;
                records.push(SourceRecord::Fine(FineRecord { id: fine_id, ..fine }));
            }
            records.push(SourceRecord::Loan(loan));
        }
    }

    records
}

/// Create the source schema and write a generated library into it.
pub fn seed_source(pool: &DbPool, config: &SeedConfig) -> DbResult<SeedSummary> {
    run_source_migrations(pool)?;
    let records = generate(config);
    let rows = insert_records(pool, &records)?;

    let tables = SourceTable::ALL
        .iter()
        .map(|&table| (table, records.iter().filter(|r| r.table() == table).count()))
        .collect();
    info!(rows, seed = config.seed, "Seeded source database");
    Ok(SeedSummary { tables, rows })
}

fn loan(rng: &mut StdRng, id: i64, config: &SeedConfig) -> LoanRecord {
    // Triangular-ish age skewed toward recent checkouts.
    let days_ago = rng.gen_range(0..900).min(rng.gen_range(0..900));
    let loan_date = config.today - Duration::days(days_ago);
    let due_date = loan_date + Duration::days(LOAN_PERIOD_DAYS);

    let roll = rng.gen_range(0..100);
    let (return_date, status) = if roll < 80 {
        let returned = (loan_date + Duration::days(rng.gen_range(1..=30))).min(config.today);
        (Some(returned), "returned")
    } else if roll < 95 && due_date >= config.today {
        (None, "active")
    } else {
        (None, "overdue")
    };

    LoanRecord {
        id,
        member_id: rng.gen_range(1..=config.members as i64),
        book_id: rng.gen_range(1..=config.books as i64),
        staff_id: rng.gen_range(1..=config.staff as i64),
        loan_date,
        due_date,
        return_date,
        status: status.to_string(),
    }
}

/// Late returns and open overdue loans accrue a capped daily fine.
fn fine_for(rng: &mut StdRng, loan: &LoanRecord, today: NaiveDate) -> Option<FineRecord> {
    let (late_days, issue_date, paid) = match loan.return_date {
        Some(returned) if returned > loan.due_date => {
            ((returned - loan.due_date).num_days(), returned, rng.gen_bool(0.6))
        }
        None if loan.status == "overdue" && today > loan.due_date => {
            ((today - loan.due_date).num_days(), loan.due_date + Duration::days(1), false)
        }
        _ => return None,
    };

    Some(FineRecord {
        id: 0,
        loan_id: loan.id,
        amount: fine_amount(late_days),
        issue_date: Some(issue_date),
        paid_status: if paid { "paid" } else { "unpaid" }.to_string(),
    })
}

/// `late_days` at the daily rate, capped and rounded to cents.
pub fn fine_amount(late_days: i64) -> f64 {
    let amount = (late_days.max(0) as f64 * FINE_PER_DAY).min(FINE_CAP);
    (amount * 100.0).round() / 100.0
}

fn person(rng: &mut StdRng) -> (&'static str, &'static str) {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Alex");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Smith");
    (first, last)
}

fn weighted_count(rng: &mut StdRng, weights: [u32; 3]) -> usize {
    let total: u32 = weights.iter().sum();
    let mut roll = rng.gen_range(0..total);
    for (i, weight) in weights.iter().enumerate() {
        if roll < *weight {
            return i + 1;
        }
        roll -= weight;
    }
    weights.len()
}

fn date_between(rng: &mut StdRng, start: NaiveDate, end: NaiveDate) -> NaiveDate {
    let span = (end - start).num_days().max(0);
    start + Duration::days(rng.gen_range(0..=span))
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}
