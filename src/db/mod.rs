//! Storage layer the prune engine runs against.
//!
//! The engine only ever talks to a [`RecordStore`]: a small trait for
//! counting, paging and removing records described by a [`Scope`]. Two
//! backends ship with the crate:
//!
//! - [`MemoryRecordStore`]: in-process tables, always available
//! - [`sqlite::SqliteRecordStore`]: sqlx-backed, behind `database-sqlite`

mod error;
mod memory;
mod scope;
#[cfg(feature = "database-sqlite")]
pub mod sqlite;
mod store;

#[cfg(test)]
pub mod tests;

pub use error::{DbError, DbResult};
pub use memory::{MemoryRecordStore, Record};
pub use scope::{CompareOp, FieldValue, Filter, Scope};
pub use store::{DestroyHook, RecordStore};
