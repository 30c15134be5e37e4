//! Sync modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a run treats existing derived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Clear both derived stores, then load everything.
    Full,
    /// Upsert over existing state. Source deletions are not propagated.
    Incremental,
}

impl SyncMode {
    pub fn clears_targets(&self) -> bool {
        matches!(self, SyncMode::Full)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full => f.write_str("full"),
            SyncMode::Incremental => f.write_str("incremental"),
        }
    }
}
