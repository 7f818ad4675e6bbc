//! Prune engine and pruner tests
//!
//! Runs against [`RecordingStore`], an in-memory store that logs every call
//! the engine makes and can be told to fail for one table.


use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use crate::db::{DbError, DbResult, FieldValue, MemoryRecordStore, RecordStore, Scope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Count(String),
    SelectIds {
        table: String,
        after: Option<i64>,
        limit: u32,
    },
    DestroyAll(String),
    DeleteAll(String),
}

impl StoreCall {
    fn is_removal(&self) -> bool {
        matches!(self, StoreCall::DestroyAll(_) | StoreCall::DeleteAll(_))
    }
}

#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryRecordStore,
    calls: Mutex<Vec<StoreCall>>,
    failing_table: Option<String>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation on `table` fails with [`DbError::Internal`].
    pub fn failing_on(table: &str) -> Self {
        Self {
            failing_table: Some(table.to_string()),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryRecordStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn removal_calls(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_removal).collect()
    }

    /// Insert `count` rows into `table` created and updated at `at`.
    pub fn seed(&self, table: &str, count: usize, at: DateTime<Utc>) -> Vec<i64> {
        (0..count)
            .map(|_| {
                self.inner.insert(
                    table,
                    [
                        ("kind", FieldValue::from("guest")),
                        ("created_at", FieldValue::from(at)),
                        ("updated_at", FieldValue::from(at)),
                    ],
                )
            })
            .collect()
    }

    fn record(&self, call: StoreCall, table: &str) -> DbResult<()> {
        self.calls.lock().push(call);
        if self.failing_table.as_deref() == Some(table) {
            return Err(DbError::Internal(format!("simulated failure on {}", table)));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn count(&self, scope: &Scope) -> DbResult<u64> {
        self.record(StoreCall::Count(scope.table().to_string()), scope.table())?;
        self.inner.count(scope).await
    }

    async fn select_ids(
        &self,
        scope: &Scope,
        after: Option<i64>,
        limit: u32,
    ) -> DbResult<Vec<i64>> {
        self.record(
            StoreCall::SelectIds {
                table: scope.table().to_string(),
                after,
                limit,
            },
            scope.table(),
        )?;
        self.inner.select_ids(scope, after, limit).await
    }

    async fn destroy_all(&self, scope: &Scope) -> DbResult<u64> {
        self.record(StoreCall::DestroyAll(scope.table().to_string()), scope.table())?;
        self.inner.destroy_all(scope).await
    }

    async fn delete_all(&self, scope: &Scope) -> DbResult<u64> {
        self.record(StoreCall::DeleteAll(scope.table().to_string()), scope.table())?;
        self.inner.delete_all(scope).await
    }
}

/// 2017-10-07 12:00 UTC
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 10, 7, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    reference_time() - Duration::days(days)
}
