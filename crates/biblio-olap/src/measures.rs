//! Derived loan measures.

use biblio_core::LoanRecord;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoanMeasures {
    /// Days between checkout and return; `None` while the loan is open.
    pub loan_duration_days: Option<i64>,
    pub days_overdue: i64,
    pub fine_amount: f64,
}

pub fn loan_duration(loan: &LoanRecord) -> Option<i64> {
    loan.return_date.map(|returned| (returned - loan.loan_date).num_days())
}

/// Days past due at return, or as of `today` for an open loan; never negative.
pub fn days_overdue(loan: &LoanRecord, today: NaiveDate) -> i64 {
    let end = loan.return_date.unwrap_or(today);
    (end - loan.due_date).num_days().max(0)
}

impl LoanMeasures {
    pub fn compute(loan: &LoanRecord, today: NaiveDate, fine_total: Option<f64>) -> Self {
        Self {
            loan_duration_days: loan_duration(loan),
            days_overdue: days_overdue(loan, today),
            fine_amount: fine_total.unwrap_or(0.0),
        }
    }
}
