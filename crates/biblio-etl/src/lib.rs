//! # Biblio ETL
//!
//! Orchestrates one sync run from the transactional source into the graph
//! store and the star-schema warehouse, and reports what each stage did.

pub mod config;
pub mod pipeline;
pub mod report;
pub mod stage;

pub use config::AppConfig;
pub use pipeline::{CancelFlag, Pipeline};
pub use report::{RunReport, StageOutcome, StageReport, StageStatus};
pub use stage::{RunState, Stage};
