//! Weighted many-to-many bridges.
//!
//! Each parent's bridge rows carry `1 / children` so the weights of one
//! parent sum to 1.0, and counting a fact through the bridge never counts it
//! more than once in total. Parents without children get no rows.

use std::collections::{BTreeMap, BTreeSet};

use biblio_core::{ReferentialGap, SourceSnapshot, WeightAnomaly};
use biblio_db::queries::warehouse::{replace_bridge_rows, BridgeRow, BridgeTable};
use biblio_db::{DbPool, DbResult};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::dimension::{DimensionKeys, KeyMap};

/// Allowed deviation of a parent's weight total from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-3;

/// One row per distinct `(parent, child)` pair, weighted by `1 / children`.
pub fn normalize(pairs: impl IntoIterator<Item = (i64, i64)>) -> Vec<BridgeRow> {
    let mut children: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for (parent, child) in pairs {
        children.entry(parent).or_default().insert(child);
    }

    children
        .into_iter()
        .flat_map(|(parent, kids)| {
            let weight = 1.0 / kids.len() as f64;
            kids.into_iter().map(move |child| BridgeRow {
                parent_key: parent,
                child_key: child,
                weight,
            })
        })
        .collect()
}

/// Parents whose weights do not sum to 1.0 within [`WEIGHT_TOLERANCE`].
pub fn check_weights(bridge: BridgeTable, rows: &[BridgeRow]) -> Vec<WeightAnomaly> {
    let mut totals: BTreeMap<i64, f64> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.parent_key).or_insert(0.0) += row.weight;
    }
    totals
        .into_iter()
        .filter(|(_, total)| (total - 1.0).abs() > WEIGHT_TOLERANCE)
        .map(|(parent_key, total)| WeightAnomaly {
            bridge: bridge.name().to_string(),
            parent_key,
            total,
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BridgeLoad {
    /// Rows written per bridge table.
    pub counts: BTreeMap<String, usize>,
    pub rows: usize,
    pub parents: usize,
    pub gaps: Vec<ReferentialGap>,
    pub anomalies: Vec<WeightAnomaly>,
}

impl BridgeLoad {
    fn merge(&mut self, other: BridgeLoad) {
        self.counts.extend(other.counts);
        self.rows += other.rows;
        self.parents += other.parents;
        self.gaps.extend(other.gaps);
        self.anomalies.extend(other.anomalies);
    }
}

/// Resolve natural associations to surrogate keys, weight them, and replace
/// the bridge rows of every parent that appears in `associations`.
pub fn load_bridge(
    pool: &DbPool,
    bridge: BridgeTable,
    associations: &[(i64, i64)],
    parents: &KeyMap,
    children: &KeyMap,
) -> DbResult<BridgeLoad> {
    let origin = bridge.name();
    let mut load = BridgeLoad::default();
    let mut parent_keys = BTreeSet::new();
    let mut resolved = Vec::with_capacity(associations.len());

    for &(parent, child) in associations {
        let record = format!("({parent}, {child})");
        let Some(parent_key) = parents.resolve(parent) else {
            load.gaps.push(ReferentialGap::new(origin, &record, format!("{}#{parent}", parents.table().name())));
            continue;
        };
        parent_keys.insert(parent_key);
        match children.resolve(child) {
            Some(child_key) => resolved.push((parent_key, child_key)),
            None => load.gaps.push(ReferentialGap::new(
                origin,
                &record,
                format!("{}#{child}", children.table().name()),
            )),
        }
    }
    for gap in &load.gaps {
        warn!(%gap, "Skipping bridge association");
    }

    let rows = normalize(resolved);
    load.anomalies = check_weights(bridge, &rows);
    for anomaly in &load.anomalies {
        error!(%anomaly, "Bridge weights do not sum to 1.0");
    }

    let parents: Vec<i64> = parent_keys.into_iter().collect();
    load.rows = replace_bridge_rows(pool, bridge, &parents, &rows)?;
    load.parents = parents.len();
    load.counts.insert(origin.to_string(), load.rows);
    info!(bridge = origin, rows = load.rows, parents = load.parents, gaps = load.gaps.len(), "Bridge loaded");
    Ok(load)
}

/// Load `bridge_book_category` and `bridge_book_author`.
pub fn load_bridges(pool: &DbPool, snapshot: &SourceSnapshot, keys: &DimensionKeys) -> DbResult<BridgeLoad> {
    let categories: Vec<(i64, i64)> = snapshot
        .book_categories
        .iter()
        .map(|bc| (bc.book_id, bc.category_id))
        .collect();
    let authors: Vec<(i64, i64)> = snapshot
        .book_authors
        .iter()
        .map(|ba| (ba.book_id, ba.author_id))
        .collect();

    let mut total = load_bridge(pool, BridgeTable::BookCategory, &categories, &keys.books, &keys.categories)?;
    total.merge(load_bridge(pool, BridgeTable::BookAuthor, &authors, &keys.books, &keys.authors)?);
    Ok(total)
}
