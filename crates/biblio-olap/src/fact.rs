//! Loan fact loading.
//!
//! Every foreign key resolves through the key maps built by the dimension
//! load. A loan whose member, book, staff or date is missing there is a
//! referential gap: it is logged, counted and skipped.

use biblio_core::{LoanRecord, ReferentialGap, SourceSnapshot};
use biblio_db::queries::warehouse::{insert_rows, FactLoanRow, WarehouseTable};
use biblio_db::{DbPool, DbResult};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::calendar::date_key;
use crate::dimension::{DimensionKeys, KeyMap};
use crate::measures::LoanMeasures;

const ORIGIN: &str = "fact_loan";

#[derive(Debug, Clone, Default, Serialize)]
pub struct FactLoad {
    pub rows: usize,
    pub gaps: Vec<ReferentialGap>,
}

fn resolve(keys: &KeyMap, natural: i64, loan: &LoanRecord) -> Result<i64, ReferentialGap> {
    keys.resolve(natural)
        .ok_or_else(|| ReferentialGap::new(ORIGIN, loan.id, format!("{}#{natural}", keys.table().name())))
}

/// Build the fact row for one loan, or the first gap that prevents it.
pub fn fact_row(
    loan: &LoanRecord,
    keys: &DimensionKeys,
    loan_keys: &mut KeyMap,
    today: NaiveDate,
    fine_total: Option<f64>,
) -> Result<FactLoanRow, ReferentialGap> {
    let member_key = resolve(&keys.members, loan.member_id, loan)?;
    let book_key = resolve(&keys.books, loan.book_id, loan)?;
    let staff_key = resolve(&keys.staff, loan.staff_id, loan)?;
    let loan_date_key = resolve(&keys.dates, date_key(loan.loan_date), loan)?;
    let return_date_key = loan
        .return_date
        .map(|d| resolve(&keys.dates, date_key(d), loan))
        .transpose()?;

    let measures = LoanMeasures::compute(loan, today, fine_total);
    Ok(FactLoanRow {
        loan_key: loan_keys.assign(loan.id),
        source_loan_id: loan.id,
        date_key: loan_date_key,
        return_date_key,
        member_key,
        book_key,
        staff_key,
        loan_count: 1,
        loan_duration_days: measures.loan_duration_days,
        days_overdue: measures.days_overdue,
        fine_amount: measures.fine_amount,
    })
}

/// Load one fact row per loan. Must run after the dimensions are loaded.
pub fn load_facts(
    pool: &DbPool,
    snapshot: &SourceSnapshot,
    keys: &DimensionKeys,
    today: NaiveDate,
) -> DbResult<FactLoad> {
    let mut loan_keys = KeyMap::load(pool, WarehouseTable::FactLoan)?;
    let fines = snapshot.fine_totals();

    let mut rows = Vec::with_capacity(snapshot.loans.len());
    let mut gaps = Vec::new();
    for loan in &snapshot.loans {
        match fact_row(loan, keys, &mut loan_keys, today, fines.get(&loan.id).copied()) {
            Ok(row) => rows.push(row),
            Err(gap) => {
                warn!(%gap, "Skipping loan fact");
                gaps.push(gap);
            }
        }
    }

    let written = insert_rows(pool, &rows)?;
    info!(rows = written, gaps = gaps.len(), "Loan facts loaded");
    Ok(FactLoad { rows: written, gaps })
}
