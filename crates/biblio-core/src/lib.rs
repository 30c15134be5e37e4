//! # Biblio Core
//!
//! Shared domain types for the library sync engine.
//!
//! Source tables are read into typed records, entity and relationship kinds
//! form closed enums, and every component reports failures through
//! [`SyncError`].

pub mod entity;
pub mod error;
pub mod mode;
pub mod property;
pub mod record;
pub mod source;

pub use entity::{EdgeId, EntityKind, NodeId, ParseKindError, RelKind};
pub use error::{BiblioResult, ReferentialGap, SyncError, WeightAnomaly};
pub use mode::SyncMode;
pub use property::{Properties, PropertyValue};
pub use record::{
    AuthorRecord, BookAuthorRecord, BookCategoryRecord, BookRecord, CategoryRecord, FineRecord,
    LoanRecord, MemberRecord, NaturalKey, SourceRecord, SourceTable, StaffRecord,
};
pub use source::{SourceReader, SourceSnapshot};
