//! Shared tests for RecordStore implementations
//!
//! Tests are written as async functions that take a test context holding the
//! store under test and a fixture for seeding rows into it.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::harness::{RecordingHook, StoreFixture};
use crate::{
    db::{DbError, RecordStore, Scope},
    prune::{PrunableModel, PruneMethod, PruneOptions, PruneOutcome},
};

/// Test context containing the store and its seeding fixture
pub struct RecordStoreTestContext<'a> {
    pub store: &'a dyn RecordStore,
    pub fixture: &'a dyn StoreFixture,
}

fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 10, 7, 12, 0, 0).unwrap()
}

/// Seed `old` rows created 30 days before the reference time, then `fresh`
/// rows created one day before it. Returns the ids of the old rows.
async fn seed_sessions(ctx: &RecordStoreTestContext<'_>, old: usize, fresh: usize) -> Vec<i64> {
    let now = reference_time();
    let mut old_ids = Vec::with_capacity(old);
    for _ in 0..old {
        let at = now - Duration::days(30);
        old_ids.push(ctx.fixture.seed("sessions", "guest", at, at).await);
    }
    for _ in 0..fresh {
        let at = now - Duration::days(1);
        ctx.fixture.seed("sessions", "member", at, at).await;
    }
    old_ids
}

fn stale_sessions() -> Scope {
    Scope::new("sessions").lt("created_at", reference_time() - Duration::days(7))
}

// ============================================================================
// Count / Exists
// ============================================================================

pub async fn test_count_empty(ctx: &RecordStoreTestContext<'_>) {
    assert_eq!(ctx.store.count(&Scope::new("sessions")).await.unwrap(), 0);
    assert!(!ctx.store.exists(&Scope::new("sessions")).await.unwrap());
}

pub async fn test_count_with_filters(ctx: &RecordStoreTestContext<'_>) {
    seed_sessions(ctx, 3, 2).await;

    assert_eq!(ctx.store.count(&Scope::new("sessions")).await.unwrap(), 5);
    assert_eq!(ctx.store.count(&stale_sessions()).await.unwrap(), 3);

    let guests = Scope::new("sessions").eq("kind", "guest");
    assert_eq!(ctx.store.count(&guests).await.unwrap(), 3);

    let fresh_guests = guests.ge("created_at", reference_time() - Duration::days(7));
    assert_eq!(ctx.store.count(&fresh_guests).await.unwrap(), 0);
    assert!(!ctx.store.exists(&fresh_guests).await.unwrap());
}

pub async fn test_count_ignores_other_tables(ctx: &RecordStoreTestContext<'_>) {
    seed_sessions(ctx, 2, 0).await;
    let at = reference_time() - Duration::days(30);
    ctx.fixture.seed("events", "click", at, at).await;

    assert_eq!(ctx.store.count(&Scope::new("events")).await.unwrap(), 1);
    assert_eq!(ctx.store.count(&Scope::new("sessions")).await.unwrap(), 2);
}

// ============================================================================
// Keyset paging
// ============================================================================

pub async fn test_select_ids_ordered_and_limited(ctx: &RecordStoreTestContext<'_>) {
    let old_ids = seed_sessions(ctx, 5, 2).await;

    let first = ctx.store.select_ids(&stale_sessions(), None, 2).await.unwrap();
    assert_eq!(first, old_ids[..2].to_vec());

    let second = ctx
        .store
        .select_ids(&stale_sessions(), Some(first[1]), 2)
        .await
        .unwrap();
    assert_eq!(second, old_ids[2..4].to_vec());

    let last = ctx
        .store
        .select_ids(&stale_sessions(), Some(second[1]), 2)
        .await
        .unwrap();
    assert_eq!(last, old_ids[4..].to_vec());

    let past_end = ctx
        .store
        .select_ids(&stale_sessions(), Some(old_ids[4]), 2)
        .await
        .unwrap();
    assert!(past_end.is_empty());
}

pub async fn test_select_ids_stable_under_deletion(ctx: &RecordStoreTestContext<'_>) {
    let old_ids = seed_sessions(ctx, 4, 0).await;

    let page = ctx.store.select_ids(&stale_sessions(), None, 2).await.unwrap();
    ctx.store
        .delete_all(&stale_sessions().only_ids(page.clone()))
        .await
        .unwrap();

    let next = ctx
        .store
        .select_ids(&stale_sessions(), page.last().copied(), 2)
        .await
        .unwrap();
    assert_eq!(next, old_ids[2..].to_vec());
}

// ============================================================================
// Removal
// ============================================================================

pub async fn test_delete_all_removes_only_matches(ctx: &RecordStoreTestContext<'_>) {
    seed_sessions(ctx, 3, 2).await;

    let removed = ctx.store.delete_all(&stale_sessions()).await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(ctx.store.count(&Scope::new("sessions")).await.unwrap(), 2);
    assert_eq!(ctx.store.count(&stale_sessions()).await.unwrap(), 0);

    // Nothing left to match
    assert_eq!(ctx.store.delete_all(&stale_sessions()).await.unwrap(), 0);
}

pub async fn test_delete_all_skips_hooks(ctx: &RecordStoreTestContext<'_>) {
    seed_sessions(ctx, 2, 0).await;
    let hook = Arc::new(RecordingHook::default());
    ctx.fixture.add_hook("sessions", hook.clone());

    assert_eq!(ctx.store.delete_all(&stale_sessions()).await.unwrap(), 2);
    assert!(hook.calls().is_empty());
}

pub async fn test_destroy_all_runs_hooks(ctx: &RecordStoreTestContext<'_>) {
    let old_ids = seed_sessions(ctx, 3, 1).await;
    let hook = Arc::new(RecordingHook::default());
    ctx.fixture.add_hook("sessions", hook.clone());

    let removed = ctx.store.destroy_all(&stale_sessions()).await.unwrap();
    assert_eq!(removed, 3);

    let expected: Vec<_> = old_ids
        .iter()
        .map(|id| ("sessions".to_string(), *id))
        .collect();
    assert_eq!(hook.calls(), expected);
    assert_eq!(ctx.store.count(&Scope::new("sessions")).await.unwrap(), 1);
}

pub async fn test_destroy_all_hook_error_aborts(ctx: &RecordStoreTestContext<'_>) {
    let old_ids = seed_sessions(ctx, 3, 0).await;
    ctx.fixture
        .add_hook("sessions", Arc::new(RecordingHook::failing_on(old_ids[1])));

    let err = ctx.store.destroy_all(&stale_sessions()).await.unwrap_err();
    assert!(matches!(err, DbError::Hook { id, .. } if id == old_ids[1]));

    // The refused row and everything after it survive
    let remaining = ctx
        .store
        .select_ids(&Scope::new("sessions"), None, 10)
        .await
        .unwrap();
    assert_eq!(remaining, old_ids[1..].to_vec());
}

pub async fn test_only_ids_drops_other_filters(ctx: &RecordStoreTestContext<'_>) {
    let old_ids = seed_sessions(ctx, 2, 0).await;
    let fresh = ctx
        .fixture
        .seed("sessions", "member", reference_time(), reference_time())
        .await;

    let scope = stale_sessions().only_ids(vec![old_ids[0], fresh]);
    assert_eq!(ctx.store.count(&scope).await.unwrap(), 2);

    let empty = stale_sessions().only_ids(Vec::new());
    assert_eq!(ctx.store.count(&empty).await.unwrap(), 0);
    assert_eq!(ctx.store.delete_all(&empty).await.unwrap(), 0);
}

// ============================================================================
// Engine against a real backend
// ============================================================================

pub async fn test_batched_prune_removes_all_stale(ctx: &RecordStoreTestContext<'_>) {
    seed_sessions(ctx, 7, 3).await;
    let model = PrunableModel::new("sessions").created_after(Duration::days(7));
    let options = PruneOptions::new().at(reference_time()).batch_size(3);

    let outcome = model.prune(ctx.store, &options).await.unwrap();
    assert_eq!(outcome, PruneOutcome::Pruned(7));
    assert_eq!(ctx.store.count(&Scope::new("sessions")).await.unwrap(), 3);

    let again = model.prune(ctx.store, &options).await.unwrap();
    assert_eq!(again, PruneOutcome::Pruned(0));
}

pub async fn test_prune_delete_by_updated_at(ctx: &RecordStoreTestContext<'_>) {
    let now = reference_time();
    let created = now - Duration::days(60);
    ctx.fixture
        .seed("events", "click", created, now - Duration::days(10))
        .await;
    ctx.fixture
        .seed("events", "click", created, now - Duration::days(1))
        .await;
    let hook = Arc::new(RecordingHook::default());
    ctx.fixture.add_hook("events", hook.clone());

    let model = PrunableModel::new("events").updated_after(Duration::days(7));
    let options = PruneOptions::new()
        .at(now)
        .with_method(PruneMethod::Delete);

    let outcome = model.prune(ctx.store, &options).await.unwrap();
    assert_eq!(outcome.count(), 1);
    assert!(hook.calls().is_empty());
    assert_eq!(ctx.store.count(&Scope::new("events")).await.unwrap(), 1);
}

// ============================================================================
// Memory backend
// ============================================================================

mod memory_tests {
    use super::*;
    use crate::db::MemoryRecordStore;

    macro_rules! memory_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let store = MemoryRecordStore::new();
                let ctx = RecordStoreTestContext {
                    store: &store,
                    fixture: &store,
                };
                super::$name(&ctx).await;
            }
        };
    }

    memory_test!(test_count_empty);
    memory_test!(test_count_with_filters);
    memory_test!(test_count_ignores_other_tables);
    memory_test!(test_select_ids_ordered_and_limited);
    memory_test!(test_select_ids_stable_under_deletion);
    memory_test!(test_delete_all_removes_only_matches);
    memory_test!(test_delete_all_skips_hooks);
    memory_test!(test_destroy_all_runs_hooks);
    memory_test!(test_destroy_all_hook_error_aborts);
    memory_test!(test_only_ids_drops_other_filters);
    memory_test!(test_batched_prune_removes_all_stale);
    memory_test!(test_prune_delete_by_updated_at);
}

// ============================================================================
// SQLite backend
// ============================================================================

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use super::*;
    use crate::db::{
        sqlite::SqliteRecordStore,
        tests::harness::{create_sqlite_pool, create_test_tables},
    };

    async fn create_store() -> SqliteRecordStore {
        let pool = create_sqlite_pool().await;
        create_test_tables(&pool).await;
        SqliteRecordStore::new(pool)
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let store = create_store().await;
                let ctx = RecordStoreTestContext {
                    store: &store,
                    fixture: &store,
                };
                super::$name(&ctx).await;
            }
        };
    }

    sqlite_test!(test_count_empty);
    sqlite_test!(test_count_with_filters);
    sqlite_test!(test_count_ignores_other_tables);
    sqlite_test!(test_select_ids_ordered_and_limited);
    sqlite_test!(test_select_ids_stable_under_deletion);
    sqlite_test!(test_delete_all_removes_only_matches);
    sqlite_test!(test_delete_all_skips_hooks);
    sqlite_test!(test_destroy_all_runs_hooks);
    sqlite_test!(test_destroy_all_hook_error_aborts);
    sqlite_test!(test_only_ids_drops_other_filters);
    sqlite_test!(test_batched_prune_removes_all_stale);
    sqlite_test!(test_prune_delete_by_updated_at);

    #[tokio::test]
    async fn test_sqlite_native_timestamps_compare_by_time() {
        let store = create_store().await;
        // datetime('now') format, not RFC 3339
        for at in ["2017-09-29 12:00:00", "2017-09-30 12:00:00", "2017-10-06 08:30:00"] {
            sqlx::query(
                "INSERT INTO sessions (kind, created_at, updated_at) VALUES ('guest', ?, ?)",
            )
            .bind(at)
            .bind(at)
            .execute(store.pool())
            .await
            .unwrap();
        }

        let now = Utc.with_ymd_and_hms(2017, 10, 7, 0, 0, 0).unwrap();
        let model = PrunableModel::new("sessions").created_after(Duration::days(7));
        let outcome = model
            .prune(&store, &PruneOptions::new().at(now))
            .await
            .unwrap();

        // Only the row before 2017-09-30T00:00Z is stale
        assert_eq!(outcome, PruneOutcome::Pruned(1));
        let remaining: Vec<String> =
            sqlx::query_scalar("SELECT created_at FROM sessions ORDER BY id")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert_eq!(remaining, vec!["2017-09-30 12:00:00", "2017-10-06 08:30:00"]);
    }

    #[tokio::test]
    async fn test_batch_larger_than_bind_limit() {
        const ROWS: i64 = 40_000;

        let store = create_store().await;
        sqlx::query(
            r#"
            WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?)
            INSERT INTO sessions (kind, created_at, updated_at)
            SELECT 'guest', '2017-01-01 00:00:00', '2017-01-01 00:00:00' FROM seq
            "#,
        )
        .bind(ROWS)
        .execute(store.pool())
        .await
        .unwrap();

        let model = PrunableModel::new("sessions").created_after(Duration::days(7));
        let options = PruneOptions::new()
            .at(reference_time())
            .with_method(PruneMethod::Delete)
            .batch_size(ROWS as u32);

        let outcome = model.prune(&store, &options).await.unwrap();
        assert_eq!(outcome, PruneOutcome::Pruned(ROWS as u64));
        assert_eq!(store.count(&Scope::new("sessions")).await.unwrap(), 0);
    }
}
