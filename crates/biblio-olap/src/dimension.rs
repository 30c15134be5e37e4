//! Dimension loading and surrogate keys.
//!
//! A [`KeyMap`] starts from whatever the warehouse already holds, so a run
//! over a cleared warehouse numbers rows from 1 in source order, while an
//! incremental run keeps existing keys and appends new ones after the
//! current maximum.

use std::collections::{BTreeMap, HashMap};

use biblio_core::{AuthorRecord, CategoryRecord, MemberRecord, SourceSnapshot, StaffRecord};
use biblio_db::queries::warehouse::{
    insert_rows, load_key_map, AuthorDimRow, BookDimRow, CategoryDimRow, MemberDimRow, StaffDimRow,
    WarehouseRow, WarehouseTable,
};
use biblio_db::{DbPool, DbResult};
use chrono::Datelike;
use tracing::info;

use crate::calendar::load_calendar;

/// Natural key → surrogate key for one warehouse table.
#[derive(Debug, Clone)]
pub struct KeyMap {
    table: WarehouseTable,
    keys: HashMap<i64, i64>,
    next: i64,
}

impl KeyMap {
    /// Keys already assigned in the warehouse.
    pub fn load(pool: &DbPool, table: WarehouseTable) -> DbResult<Self> {
        let keys = load_key_map(pool, table)?;
        let next = keys.values().copied().max().unwrap_or(0) + 1;
        Ok(Self { table, keys, next })
    }

    pub fn table(&self) -> WarehouseTable {
        self.table
    }

    /// The existing key for `natural`, or the next free one.
    pub fn assign(&mut self, natural: i64) -> i64 {
        if let Some(&key) = self.keys.get(&natural) {
            return key;
        }
        let key = self.next;
        self.next += 1;
        self.keys.insert(natural, key);
        key
    }

    pub fn resolve(&self, natural: i64) -> Option<i64> {
        self.keys.get(&natural).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A dimension row keyed by a surrogate the loader assigns.
pub trait DimensionRow: WarehouseRow {
    fn natural_key(&self) -> i64;

    fn set_surrogate(&mut self, key: i64);
}

macro_rules! dimension_row {
    ($row:ty, $natural:ident, $surrogate:ident) => {
        impl DimensionRow for $row {
            fn natural_key(&self) -> i64 {
                self.$natural
            }

            fn set_surrogate(&mut self, key: i64) {
                self.$surrogate = key;
            }
        }
    };
}

dimension_row!(MemberDimRow, source_member_id, member_key);
dimension_row!(BookDimRow, source_book_id, book_key);
dimension_row!(AuthorDimRow, source_author_id, author_key);
dimension_row!(StaffDimRow, source_staff_id, staff_key);
dimension_row!(CategoryDimRow, source_category_id, category_key);

/// Transform each record into zero or more rows, key them, and bulk insert.
pub fn load_dimension<T, R, F>(pool: &DbPool, keys: &mut KeyMap, records: &[T], transform: F) -> DbResult<usize>
where
    R: DimensionRow,
    F: Fn(&T) -> Vec<R>,
{
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        for mut row in transform(record) {
            row.set_surrogate(keys.assign(row.natural_key()));
            rows.push(row);
        }
    }
    insert_rows(pool, &rows)
}

pub fn member_row(m: &MemberRecord) -> Vec<MemberDimRow> {
    vec![MemberDimRow {
        member_key: 0,
        source_member_id: m.id,
        first_name: m.first_name.clone(),
        last_name: m.last_name.clone(),
        full_name: m.full_name(),
        email: m.email.clone(),
        phone: m.phone.clone(),
        membership_date: m.membership_date.map(|d| d.to_string()),
        membership_year: m.membership_date.map(|d| d.year()),
        status: m.status.clone(),
    }]
}

pub fn author_row(a: &AuthorRecord) -> Vec<AuthorDimRow> {
    vec![AuthorDimRow {
        author_key: 0,
        source_author_id: a.id,
        full_name: a.full_name(),
    }]
}

pub fn staff_row(s: &StaffRecord) -> Vec<StaffDimRow> {
    vec![StaffDimRow {
        staff_key: 0,
        source_staff_id: s.id,
        first_name: s.first_name.clone(),
        last_name: s.last_name.clone(),
        full_name: s.full_name(),
        email: s.email.clone(),
        role: s.role.clone(),
        hire_date: s.hire_date.map(|d| d.to_string()),
        hire_year: s.hire_date.map(|d| d.year()),
    }]
}

pub fn category_row(c: &CategoryRecord) -> Vec<CategoryDimRow> {
    vec![CategoryDimRow {
        category_key: 0,
        source_category_id: c.id,
        category_name: c.name.clone(),
        description: c.description.clone(),
    }]
}

/// Author names per book id, `"; "`-joined in author id order.
pub fn book_author_names(snapshot: &SourceSnapshot) -> HashMap<i64, String> {
    let names: HashMap<i64, String> = snapshot.authors.iter().map(|a| (a.id, a.full_name())).collect();
    let mut per_book: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for ba in &snapshot.book_authors {
        per_book.entry(ba.book_id).or_default().push(ba.author_id);
    }
    per_book
        .into_iter()
        .map(|(book_id, mut author_ids)| {
            author_ids.sort_unstable();
            author_ids.dedup();
            let joined = author_ids
                .iter()
                .filter_map(|id| names.get(id).map(String::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            (book_id, joined)
        })
        .collect()
}

/// Surrogate key maps of every dimension, as left by the last load.
#[derive(Debug, Clone)]
pub struct DimensionKeys {
    pub members: KeyMap,
    pub books: KeyMap,
    pub authors: KeyMap,
    pub staff: KeyMap,
    pub categories: KeyMap,
    pub dates: KeyMap,
}

impl DimensionKeys {
    /// Keys currently stored in the warehouse.
    pub fn load(pool: &DbPool) -> DbResult<Self> {
        Ok(Self {
            members: KeyMap::load(pool, WarehouseTable::DimMember)?,
            books: KeyMap::load(pool, WarehouseTable::DimBook)?,
            authors: KeyMap::load(pool, WarehouseTable::DimAuthor)?,
            staff: KeyMap::load(pool, WarehouseTable::DimStaff)?,
            categories: KeyMap::load(pool, WarehouseTable::DimCategory)?,
            dates: KeyMap::load(pool, WarehouseTable::DimDate)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DimensionLoad {
    pub keys: DimensionKeys,
    /// Rows written per dimension table.
    pub counts: BTreeMap<String, usize>,
}

/// Load the calendar and every entity dimension from one snapshot.
pub fn load_dimensions(pool: &DbPool, snapshot: &SourceSnapshot) -> DbResult<DimensionLoad> {
    let mut counts = BTreeMap::new();
    let mut keys = DimensionKeys::load(pool)?;

    counts.insert(WarehouseTable::DimDate.name().to_string(), load_calendar(pool, snapshot)?);
    keys.dates = KeyMap::load(pool, WarehouseTable::DimDate)?;

    let n = load_dimension(pool, &mut keys.members, &snapshot.members, member_row)?;
    counts.insert(WarehouseTable::DimMember.name().to_string(), n);

    let n = load_dimension(pool, &mut keys.authors, &snapshot.authors, author_row)?;
    counts.insert(WarehouseTable::DimAuthor.name().to_string(), n);

    let n = load_dimension(pool, &mut keys.staff, &snapshot.staff, staff_row)?;
    counts.insert(WarehouseTable::DimStaff.name().to_string(), n);

    let n = load_dimension(pool, &mut keys.categories, &snapshot.categories, category_row)?;
    counts.insert(WarehouseTable::DimCategory.name().to_string(), n);

    let authors = book_author_names(snapshot);
    let n = load_dimension(pool, &mut keys.books, &snapshot.books, |b| {
        vec![BookDimRow {
            book_key: 0,
            source_book_id: b.id,
            isbn: b.isbn.clone(),
            title: b.title.clone(),
            authors: authors.get(&b.id).cloned().unwrap_or_default(),
            publication_year: b.publication_year,
            total_copies: b.copies_available,
        }]
    })?;
    counts.insert(WarehouseTable::DimBook.name().to_string(), n);

    for (table, rows) in &counts {
        info!(table = %table, count = rows, "Dimension loaded");
    }
    Ok(DimensionLoad { keys, counts })
}
