//! # Biblio OLAP
//!
//! Dimensional side of the library sync: projects source records into the
//! star schema held by `biblio-db`.
//!
//! - [`dimension`]: dimension rows with surrogate keys
//! - [`calendar`]: the pre-generated date dimension
//! - [`fact`]: loan facts with resolved keys and [`measures`]
//! - [`bridge`]: weighted many-to-many bridges

pub mod bridge;
pub mod calendar;
pub mod dimension;
pub mod fact;
pub mod measures;

pub use bridge::{load_bridges, normalize, BridgeLoad, WEIGHT_TOLERANCE};
pub use calendar::{date_key, load_calendar};
pub use dimension::{load_dimensions, DimensionKeys, DimensionLoad, KeyMap};
pub use fact::{load_facts, FactLoad};
pub use measures::LoanMeasures;
