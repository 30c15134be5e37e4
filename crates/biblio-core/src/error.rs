//! Centralized error types for Biblio.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Main error type for sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Target unavailable: {0}")]
    TargetUnavailable(String),

    #[error("Constraint violation on {identity}: {message}")]
    ConstraintViolation { identity: String, message: String },

    #[error("Referential gap: {0}")]
    ReferentialGap(ReferentialGap),

    #[error("Weight anomaly: {0}")]
    WeightAnomaly(WeightAnomaly),

    #[error("Invalid record in '{table}' ({key}): {reason}")]
    InvalidRecord {
        table: String,
        key: String,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run cancelled before {0}")]
    Cancelled(String),
}

/// Result type for sync operations.
pub type BiblioResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a constraint violation for a node or edge identity.
    pub fn constraint(identity: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            identity: identity.to_string(),
            message: message.into(),
        }
    }

    /// Errors after which no later pipeline phase may start.
    pub fn aborts_pipeline(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_)
                | Self::TargetUnavailable(_)
                | Self::ConstraintViolation { .. }
                | Self::InvalidRecord { .. }
        )
    }
}

/// A derived row or edge whose foreign key does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferentialGap {
    /// Derived structure being built (`fact_loan`, `WROTE`, ...).
    pub origin: String,
    /// Natural key of the source row that produced the candidate.
    pub record: String,
    /// The identity that could not be found.
    pub missing: String,
}

impl ReferentialGap {
    pub fn new(
        origin: impl Into<String>,
        record: impl fmt::Display,
        missing: impl fmt::Display,
    ) -> Self {
        Self {
            origin: origin.into(),
            record: record.to_string(),
            missing: missing.to_string(),
        }
    }
}

impl fmt::Display for ReferentialGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {} references missing {}", self.origin, self.record, self.missing)
    }
}

/// Bridge weights for one parent that do not sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightAnomaly {
    pub bridge: String,
    pub parent_key: i64,
    pub total: f64,
}

impl fmt::Display for WeightAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} parent {} weights sum to {:.6}",
            self.bridge, self.parent_key, self.total
        )
    }
}
