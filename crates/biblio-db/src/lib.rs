//! Biblio Database Layer.
//!
//! SQLite access for both ends of the relational pipeline: the transactional
//! source tables the sync reads from, and the dimensional warehouse
//! (star schema) it writes to. The two live in separate database files, each
//! with its own migration history.

pub mod migrations;
pub mod pool;
pub mod queries;
pub mod seed;

pub use pool::{DbError, DbPool, DbResult};
pub use queries::source::SqliteSource;
