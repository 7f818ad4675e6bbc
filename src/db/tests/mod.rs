//! Shared record store test infrastructure
//!
//! Every [`RecordStore`](crate::db::RecordStore) backend must behave the same
//! way for the prune engine to be correct, so tests are written once as async
//! functions taking a [`RecordStoreTestContext`](record_store::RecordStoreTestContext)
//! and instantiated per backend with a small macro:
//!
//! - **Memory**: always compiled
//! - **SQLite**: in-memory sqlx pool, behind `database-sqlite`

mod record_store;
