//! Date dimension.
//!
//! `date_key` is the calendar date as `YYYYMMDD`, so it is both the natural
//! and the surrogate key. The calendar is contiguous from the earliest to the
//! latest loan or return date.

use biblio_core::SourceSnapshot;
use biblio_db::queries::warehouse::{insert_rows, DateDimRow};
use biblio_db::{DbPool, DbResult};
use chrono::{Datelike, NaiveDate, Weekday};
use tracing::debug;

pub fn date_key(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

pub fn date_row(date: NaiveDate) -> DateDimRow {
    let weekday = date.weekday();
    DateDimRow {
        date_key: date_key(date),
        full_date: date.format("%Y-%m-%d").to_string(),
        year: date.year(),
        quarter: (date.month() - 1) / 3 + 1,
        month_name: date.format("%B").to_string(),
        month_num: date.month(),
        day: date.day(),
        day_name: date.format("%A").to_string(),
        day_of_week: weekday.number_from_monday(),
        week_of_year: date.iso_week().week(),
        is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
    }
}

/// Every date from `start` to `end`, inclusive.
pub fn calendar_rows(start: NaiveDate, end: NaiveDate) -> Vec<DateDimRow> {
    start.iter_days().take_while(|d| *d <= end).map(date_row).collect()
}

/// Earliest and latest date any loan fact will reference.
pub fn loan_date_span(snapshot: &SourceSnapshot) -> Option<(NaiveDate, NaiveDate)> {
    let dates = snapshot
        .loans
        .iter()
        .flat_map(|l| std::iter::once(l.loan_date).chain(l.return_date));
    let mut span: Option<(NaiveDate, NaiveDate)> = None;
    for date in dates {
        span = Some(match span {
            None => (date, date),
            Some((lo, hi)) => (lo.min(date), hi.max(date)),
        });
    }
    span
}

/// Write the calendar covering every loan date; returns rows written.
pub fn load_calendar(pool: &DbPool, snapshot: &SourceSnapshot) -> DbResult<usize> {
    let Some((start, end)) = loan_date_span(snapshot) else {
        return Ok(0);
    };
    let rows = calendar_rows(start, end);
    debug!(start = %start, end = %end, days = rows.len(), "Generating date dimension");
    insert_rows(pool, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_core::LoanRecord;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_row_attributes() {
        let row = date_row(day(2024, 3, 16));
        assert_eq!(row.date_key, 20240316);
        assert_eq!(row.quarter, 1);
        assert_eq!(row.month_name, "March");
        assert_eq!(row.day_name, "Saturday");
        assert_eq!(row.day_of_week, 6);
        assert!(row.is_weekend);
        assert_eq!(row.week_of_year, 11);
    }

    #[test]
    fn test_calendar_spans_loan_and_return_dates() {
        let mut snapshot = SourceSnapshot::default();
        snapshot.loans.push(LoanRecord {
            id: 1,
            member_id: 1,
            book_id: 1,
            staff_id: 1,
            loan_date: day(2023, 12, 30),
            due_date: day(2024, 1, 13),
            return_date: Some(day(2024, 1, 2)),
            status: "returned".into(),
        });
        assert_eq!(loan_date_span(&snapshot), Some((day(2023, 12, 30), day(2024, 1, 2))));
        let rows = calendar_rows(day(2023, 12, 30), day(2024, 1, 2));
        let keys: Vec<i64> = rows.iter().map(|r| r.date_key).collect();
        assert_eq!(keys, vec![20231230, 20231231, 20240101, 20240102]);
    }

    #[test]
    fn test_empty_snapshot_has_no_calendar() {
        assert_eq!(loan_date_span(&SourceSnapshot::default()), None);
    }
}
