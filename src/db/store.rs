use async_trait::async_trait;

use super::{DbResult, Scope};

/// Storage operations the prune engine needs from a backend.
///
/// Every method takes a [`Scope`] description and compiles it fresh, so a
/// scope may be reused across calls even as matching rows are removed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Count records matching the scope.
    async fn count(&self, scope: &Scope) -> DbResult<u64>;

    /// Check whether any record matches the scope.
    async fn exists(&self, scope: &Scope) -> DbResult<bool> {
        Ok(self.count(scope).await? > 0)
    }

    /// Fetch up to `limit` primary keys matching the scope, in ascending
    /// primary key order, strictly greater than `after` when given.
    ///
    /// This is keyset pagination: callers pass the last id of the previous
    /// page as `after`, which keeps paging stable while rows are deleted.
    async fn select_ids(&self, scope: &Scope, after: Option<i64>, limit: u32)
    -> DbResult<Vec<i64>>;

    // ==================== Removal ====================

    /// Remove matching records one at a time, running every destroy hook
    /// registered for the table before each row goes.
    ///
    /// Returns the number of records removed.
    async fn destroy_all(&self, scope: &Scope) -> DbResult<u64>;

    /// Remove matching records in a single bulk statement. Destroy hooks
    /// are not run.
    ///
    /// Returns the number of records removed.
    async fn delete_all(&self, scope: &Scope) -> DbResult<u64>;
}

/// Per-record side effect run by [`RecordStore::destroy_all`].
#[async_trait]
pub trait DestroyHook: Send + Sync {
    /// Called before the record `id` of `table` is removed. An error aborts
    /// the destroy and propagates to the caller.
    async fn before_destroy(&self, table: &str, id: i64) -> DbResult<()>;
}
