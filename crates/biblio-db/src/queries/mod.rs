//! SQL queries, grouped by the database they run against.

pub mod analytics;
pub mod source;
pub mod warehouse;
