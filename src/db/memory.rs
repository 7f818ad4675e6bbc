//! In-process record store.
//!
//! Tables are ordered maps from primary key to a column map. A column that
//! is absent from a record behaves like SQL `NULL`: every comparison against
//! it is false.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CompareOp, DbResult, DestroyHook, FieldValue, Filter, RecordStore, Scope};

pub type Record = BTreeMap<String, FieldValue>;

#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, BTreeMap<i64, Record>>>,
    hooks: RwLock<HashMap<String, Vec<Arc<dyn DestroyHook>>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook run by `destroy_all` for every record removed from `table`.
    pub fn add_destroy_hook(&self, table: impl Into<String>, hook: Arc<dyn DestroyHook>) {
        self.hooks.write().entry(table.into()).or_default().push(hook);
    }

    /// Insert a record with the next free primary key and return that key.
    pub fn insert<K, I>(&self, table: &str, fields: I) -> i64
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        let id = rows.keys().next_back().map_or(1, |last| last + 1);
        rows.insert(id, fields.into_iter().map(|(k, v)| (k.into(), v)).collect());
        id
    }

    /// Insert or replace the record stored under `id`.
    pub fn insert_with_id<K, I>(&self, table: &str, id: i64, fields: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(id, fields.into_iter().map(|(k, v)| (k.into(), v)).collect());
    }

    /// Primary keys currently stored in `table`, ascending.
    pub fn ids(&self, table: &str) -> Vec<i64> {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn matching_ids(&self, scope: &Scope) -> Vec<i64> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(scope.table()) else {
            return Vec::new();
        };
        let chunk = scope.filters().iter().find_map(|filter| match filter {
            Filter::IdIn(ids) => Some(ids),
            _ => None,
        });
        match chunk {
            // Look up the listed keys instead of scanning the table
            Some(ids) => ids
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .filter(|id| rows.get(id).is_some_and(|record| matches_scope(scope, *id, record)))
                .collect(),
            None => rows
                .iter()
                .filter(|(id, record)| matches_scope(scope, **id, record))
                .map(|(id, _)| *id)
                .collect(),
        }
    }

    fn remove(&self, table: &str, id: i64) -> bool {
        self.tables
            .write()
            .get_mut(table)
            .is_some_and(|rows| rows.remove(&id).is_some())
    }
}

fn matches_scope(scope: &Scope, id: i64, record: &Record) -> bool {
    scope.filters().iter().all(|filter| match filter {
        Filter::Compare { column, op, value } => {
            let stored = if column == scope.primary_key() {
                Some(FieldValue::Integer(id))
            } else {
                record.get(column).cloned()
            };
            stored
                .as_ref()
                .and_then(|stored| compare_values(stored, value))
                .is_some_and(|ordering| op_holds(*op, ordering))
        }
        Filter::IsNull(column) => column != scope.primary_key() && !record.contains_key(column),
        Filter::IsNotNull(column) => column == scope.primary_key() || record.contains_key(column),
        Filter::IdIn(ids) => ids.contains(&id),
    })
}

fn compare_values(left: &FieldValue, right: &FieldValue) -> Option<Ordering> {
    match (left, right) {
        (FieldValue::Bool(a), FieldValue::Bool(b)) => a.partial_cmp(b),
        (FieldValue::Integer(a), FieldValue::Integer(b)) => a.partial_cmp(b),
        (FieldValue::Real(a), FieldValue::Real(b)) => a.partial_cmp(b),
        (FieldValue::Integer(a), FieldValue::Real(b)) => (*a as f64).partial_cmp(b),
        (FieldValue::Real(a), FieldValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.partial_cmp(b),
        (FieldValue::Text(a), FieldValue::Text(b)) => a.partial_cmp(b),
        _ => None,
    }
}

fn op_holds(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn count(&self, scope: &Scope) -> DbResult<u64> {
        Ok(self.matching_ids(scope).len() as u64)
    }

    async fn select_ids(
        &self,
        scope: &Scope,
        after: Option<i64>,
        limit: u32,
    ) -> DbResult<Vec<i64>> {
        Ok(self
            .matching_ids(scope)
            .into_iter()
            .filter(|id| after.is_none_or(|after| *id > after))
            .take(limit as usize)
            .collect())
    }

    async fn destroy_all(&self, scope: &Scope) -> DbResult<u64> {
        let hooks = self
            .hooks
            .read()
            .get(scope.table())
            .cloned()
            .unwrap_or_default();

        let mut destroyed = 0;
        for id in self.matching_ids(scope) {
            for hook in &hooks {
                hook.before_destroy(scope.table(), id).await?;
            }
            if self.remove(scope.table(), id) {
                destroyed += 1;
            }
        }

        Ok(destroyed)
    }

    async fn delete_all(&self, scope: &Scope) -> DbResult<u64> {
        let ids = self.matching_ids(scope);
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(scope.table()) else {
            return Ok(0);
        };

        let mut deleted = 0;
        for id in ids {
            if rows.remove(&id).is_some() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}
