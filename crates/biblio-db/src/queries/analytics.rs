//! Aggregate queries over the star schema.

use rusqlite::params;
use serde::Serialize;

use crate::pool::{DbPool, DbResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    pub year: i32,
    pub month_name: String,
    pub month_num: u32,
    pub total_loans: i64,
    pub total_loan_days: i64,
    pub avg_loan_duration: Option<f64>,
    pub total_fines: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryLoans {
    pub category_name: String,
    /// Loans counted once in total across all categories of a book.
    pub weighted_loans: f64,
    pub raw_loan_count: i64,
    pub avg_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffPerformance {
    pub full_name: String,
    pub role: String,
    pub loans_processed: i64,
    pub avg_loan_duration: Option<f64>,
    pub overdue_loans: i64,
    pub overdue_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookPopularity {
    pub title: String,
    pub authors: String,
    pub publication_year: Option<i64>,
    pub times_borrowed: i64,
    pub avg_duration: Option<f64>,
    pub total_fines: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberBehavior {
    pub full_name: String,
    pub membership_year: Option<i32>,
    pub status: String,
    pub total_loans: i64,
    pub avg_duration: Option<f64>,
    pub total_days_overdue: i64,
    pub total_fines: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayPattern {
    pub is_weekend: bool,
    pub day_name: String,
    pub day_of_week: u32,
    pub total_loans: i64,
    pub avg_duration: Option<f64>,
    pub total_fines: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub total_loans: i64,
    pub unique_members: i64,
    pub unique_books: i64,
    pub avg_duration: Option<f64>,
    pub total_fines: f64,
    pub overdue_count: i64,
}

pub fn monthly_trends(pool: &DbPool) -> DbResult<Vec<MonthlyTrend>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT d.year, d.month_name, d.month_num,
                    COUNT(*),
                    COALESCE(SUM(f.loan_duration_days), 0),
                    ROUND(AVG(f.loan_duration_days), 1),
                    COALESCE(SUM(f.fine_amount), 0.0)
             FROM fact_loan f
             JOIN dim_date d ON f.date_key = d.date_key
             GROUP BY d.year, d.month_name, d.month_num
             ORDER BY d.year, d.month_num",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MonthlyTrend {
                year: row.get(0)?,
                month_name: row.get(1)?,
                month_num: row.get(2)?,
                total_loans: row.get(3)?,
                total_loan_days: row.get(4)?,
                avg_loan_duration: row.get(5)?,
                total_fines: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Loans per category, weighted through `bridge_book_category` so that a
/// book in several categories contributes one loan in total.
pub fn category_weighted(pool: &DbPool) -> DbResult<Vec<CategoryLoans>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT c.category_name,
                    SUM(bc.weight_factor),
                    COUNT(DISTINCT f.loan_key),
                    ROUND(AVG(f.loan_duration_days), 1)
             FROM fact_loan f
             JOIN bridge_book_category bc ON f.book_key = bc.book_key
             JOIN dim_category c ON bc.category_key = c.category_key
             GROUP BY c.category_key, c.category_name
             ORDER BY SUM(bc.weight_factor) DESC, c.category_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CategoryLoans {
                category_name: row.get(0)?,
                weighted_loans: row.get(1)?,
                raw_loan_count: row.get(2)?,
                avg_duration: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

pub fn staff_performance(pool: &DbPool) -> DbResult<Vec<StaffPerformance>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT s.full_name, s.role,
                    COUNT(*),
                    ROUND(AVG(f.loan_duration_days), 1),
                    SUM(CASE WHEN f.days_overdue > 0 THEN 1 ELSE 0 END),
                    ROUND(100.0 * SUM(CASE WHEN f.days_overdue > 0 THEN 1 ELSE 0 END) / COUNT(*), 1)
             FROM fact_loan f
             JOIN dim_staff s ON f.staff_key = s.staff_key
             GROUP BY s.staff_key, s.full_name, s.role
             ORDER BY COUNT(*) DESC, s.full_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StaffPerformance {
                full_name: row.get(0)?,
                role: row.get(1)?,
                loans_processed: row.get(2)?,
                avg_loan_duration: row.get(3)?,
                overdue_loans: row.get(4)?,
                overdue_pct: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Total weighted loans across all categories; equals the number of loans
/// whose book has at least one category.
pub fn weighted_loan_total(pool: &DbPool) -> DbResult<f64> {
    pool.with_conn(|conn| {
        let total = conn.query_row(
            "SELECT COALESCE(SUM(bc.weight_factor), 0.0)
             FROM fact_loan f JOIN bridge_book_category bc ON f.book_key = bc.book_key",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    })
}

/// Most borrowed books, at most `limit` of them.
pub fn top_books(pool: &DbPool, limit: usize) -> DbResult<Vec<BookPopularity>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT b.title, b.authors, b.publication_year,
                    COUNT(*),
                    ROUND(AVG(f.loan_duration_days), 1),
                    COALESCE(SUM(f.fine_amount), 0.0)
             FROM fact_loan f
             JOIN dim_book b ON f.book_key = b.book_key
             GROUP BY b.book_key, b.title, b.authors, b.publication_year
             ORDER BY COUNT(*) DESC, b.title
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(BookPopularity {
                title: row.get(0)?,
                authors: row.get(1)?,
                publication_year: row.get(2)?,
                times_borrowed: row.get(3)?,
                avg_duration: row.get(4)?,
                total_fines: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Borrowing and fine history of the most active members.
pub fn member_behavior(pool: &DbPool, limit: usize) -> DbResult<Vec<MemberBehavior>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT m.full_name, m.membership_year, m.status,
                    COUNT(*),
                    ROUND(AVG(f.loan_duration_days), 1),
                    COALESCE(SUM(f.days_overdue), 0),
                    COALESCE(SUM(f.fine_amount), 0.0)
             FROM fact_loan f
             JOIN dim_member m ON f.member_key = m.member_key
             GROUP BY m.member_key, m.full_name, m.membership_year, m.status
             ORDER BY COUNT(*) DESC, m.full_name
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(MemberBehavior {
                full_name: row.get(0)?,
                membership_year: row.get(1)?,
                status: row.get(2)?,
                total_loans: row.get(3)?,
                avg_duration: row.get(4)?,
                total_days_overdue: row.get(5)?,
                total_fines: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

/// Loans per day of the week (Monday first), split into weekdays and weekends.
pub fn weekday_patterns(pool: &DbPool) -> DbResult<Vec<WeekdayPattern>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT d.is_weekend, d.day_name, d.day_of_week,
                    COUNT(*),
                    ROUND(AVG(f.loan_duration_days), 1),
                    COALESCE(SUM(f.fine_amount), 0.0)
             FROM fact_loan f
             JOIN dim_date d ON f.date_key = d.date_key
             GROUP BY d.is_weekend, d.day_name, d.day_of_week
             ORDER BY d.day_of_week",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WeekdayPattern {
                is_weekend: row.get(0)?,
                day_name: row.get(1)?,
                day_of_week: row.get(2)?,
                total_loans: row.get(3)?,
                avg_duration: row.get(4)?,
                total_fines: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

pub fn yearly_comparison(pool: &DbPool) -> DbResult<Vec<YearSummary>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT d.year,
                    COUNT(*),
                    COUNT(DISTINCT f.member_key),
                    COUNT(DISTINCT f.book_key),
                    ROUND(AVG(f.loan_duration_days), 1),
                    COALESCE(SUM(f.fine_amount), 0.0),
                    SUM(CASE WHEN f.days_overdue > 0 THEN 1 ELSE 0 END)
             FROM fact_loan f
             JOIN dim_date d ON f.date_key = d.date_key
             GROUP BY d.year
             ORDER BY d.year",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(YearSummary {
                year: row.get(0)?,
                total_loans: row.get(1)?,
                unique_members: row.get(2)?,
                unique_books: row.get(3)?,
                avg_duration: row.get(4)?,
                total_fines: row.get(5)?,
                overdue_count: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_warehouse_migrations;

    fn seeded() -> DbPool {
        let pool = DbPool::in_memory().unwrap();
        run_warehouse_migrations(&pool).unwrap();
        pool.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO dim_date VALUES (20240105, '2024-01-05', 2024, 1, 'January', 1, 5, 'Friday', 5, 1, 0);
                 INSERT INTO dim_date VALUES (20240210, '2024-02-10', 2024, 1, 'February', 2, 10, 'Saturday', 6, 6, 1);
                 INSERT INTO dim_staff VALUES (1, 1, 'Ada', 'Lee', 'Ada Lee', NULL, 'Librarian', NULL, NULL);
                 INSERT INTO dim_book VALUES (1, 1, NULL, 'Dune', 'Frank Herbert', 1965, 2);
                 INSERT INTO dim_category VALUES (1, 1, 'Fiction', NULL);
                 INSERT INTO dim_category VALUES (2, 2, 'Science', NULL);
                 INSERT INTO bridge_book_category VALUES (1, 1, 0.5);
                 INSERT INTO bridge_book_category VALUES (1, 2, 0.5);
                 INSERT INTO dim_member VALUES (1, 1, 'Sam', 'Roe', 'Sam Roe', NULL, NULL, NULL, NULL, 'active');
                 INSERT INTO fact_loan VALUES (1, 1, 20240105, NULL, 1, 1, 1, 1, NULL, 3, 1.5);
                 INSERT INTO fact_loan VALUES (2, 2, 20240210, NULL, 1, 1, 1, 1, 7, 0, 0.0);",
            )?;
            Ok(())
        })
        .unwrap();
        pool
    }

    #[test]
    fn test_monthly_trends_group_by_month() {
        let trends = monthly_trends(&seeded()).unwrap();
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].month_name, "January");
        assert_eq!(trends[0].total_fines, 1.5);
        assert_eq!(trends[1].avg_loan_duration, Some(7.0));
    }

    #[test]
    fn test_weighted_loans_do_not_double_count() {
        let pool = seeded();
        let categories = category_weighted(&pool).unwrap();
        assert_eq!(categories.len(), 2);
        assert!(categories.iter().all(|c| c.raw_loan_count == 2));
        let total = weighted_loan_total(&pool).unwrap();
        assert!((total - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_staff_overdue_percentage() {
        let staff = staff_performance(&seeded()).unwrap();
        assert_eq!(staff[0].loans_processed, 2);
        assert_eq!(staff[0].overdue_loans, 1);
        assert_eq!(staff[0].overdue_pct, 50.0);
    }

    fn add_second_member_and_year(pool: &DbPool) {
        pool.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO dim_date VALUES (20230313, '2023-03-13', 2023, 1, 'March', 3, 13, 'Monday', 1, 11, 0);
                 INSERT INTO dim_book VALUES (2, 2, NULL, 'Emma', 'Jane Austen', 1815, 1);
                 INSERT INTO dim_member VALUES (2, 2, 'Kim', 'Poe', 'Kim Poe', NULL, NULL, NULL, 2022, 'active');
                 INSERT INTO fact_loan VALUES (3, 3, 20230313, NULL, 2, 2, 1, 1, 14, 0, 0.0);",
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_top_books_ranked_and_limited() {
        let pool = seeded();
        add_second_member_and_year(&pool);
        let books = top_books(&pool, 10).unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "Dune");
        assert_eq!(books[0].times_borrowed, 2);
        assert_eq!(books[0].total_fines, 1.5);
        assert_eq!(books[1].publication_year, Some(1815));

        assert_eq!(top_books(&pool, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_member_behavior_sums_overdue_days() {
        let pool = seeded();
        add_second_member_and_year(&pool);
        let members = member_behavior(&pool, 25).unwrap();
        assert_eq!(members[0].full_name, "Sam Roe");
        assert_eq!(members[0].total_loans, 2);
        assert_eq!(members[0].total_days_overdue, 3);
        assert_eq!(members[1].membership_year, Some(2022));
        assert_eq!(members[1].avg_duration, Some(14.0));
    }

    #[test]
    fn test_weekday_patterns_ordered_monday_first() {
        let pool = seeded();
        add_second_member_and_year(&pool);
        let days = weekday_patterns(&pool).unwrap();
        let names: Vec<_> = days.iter().map(|d| d.day_name.as_str()).collect();
        assert_eq!(names, vec!["Monday", "Friday", "Saturday"]);
        assert!(!days[1].is_weekend);
        assert!(days[2].is_weekend);
    }

    #[test]
    fn test_yearly_comparison_counts_distinct() {
        let pool = seeded();
        add_second_member_and_year(&pool);
        let years = yearly_comparison(&pool).unwrap();
        assert_eq!(years.len(), 2);
        assert_eq!(years[0].year, 2023);
        assert_eq!(years[1].total_loans, 2);
        assert_eq!(years[1].unique_members, 1);
        assert_eq!(years[1].unique_books, 1);
        assert_eq!(years[1].overdue_count, 1);
    }
}
