use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::{
    DestroyHook, FieldValue, Filter, RecordStore, Scope,
    error::DbResult,
};

pub struct SqliteRecordStore {
    pool: SqlitePool,
    hooks: RwLock<HashMap<String, Vec<Arc<dyn DestroyHook>>>>,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a hook run by `destroy_all` for every record removed from `table`.
    pub fn add_destroy_hook(&self, table: impl Into<String>, hook: Arc<dyn DestroyHook>) {
        self.hooks.write().entry(table.into()).or_default().push(hook);
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn all_ids(&self, scope: &Scope) -> DbResult<Vec<i64>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT ");
        query
            .push(quote_ident(scope.primary_key()))
            .push(" FROM ")
            .push(quote_ident(scope.table()));
        push_where(&mut query, scope);
        query
            .push(" ORDER BY ")
            .push(quote_ident(scope.primary_key()));

        let ids = query
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

/// Canonical text form timestamps are compared in. Both the stored value and
/// the bound cutoff go through it, so RFC 3339 (`2017-09-30T00:00:00+00:00`)
/// and SQLite's own `datetime('now')` format (`2017-09-30 00:00:00`) order
/// correctly against each other.
const TIMESTAMP_FORMAT: &str = "'%Y-%m-%d %H:%M:%f'";

/// Double-quote an identifier, escaping embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn push_where(query: &mut QueryBuilder<'_, Sqlite>, scope: &Scope) {
    for (i, filter) in scope.filters().iter().enumerate() {
        query.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::Compare { column, op, value } => {
                match value {
                    FieldValue::Timestamp(_) => {
                        query.push(format!(
                            "strftime({}, {})",
                            TIMESTAMP_FORMAT,
                            quote_ident(column)
                        ));
                    }
                    _ => {
                        query.push(quote_ident(column));
                    }
                }
                query.push(" ").push(op.as_sql()).push(" ");
                push_value(query, value);
            }
            Filter::IsNull(column) => {
                query.push(quote_ident(column)).push(" IS NULL");
            }
            Filter::IsNotNull(column) => {
                query.push(quote_ident(column)).push(" IS NOT NULL");
            }
            Filter::IdIn(ids) if ids.is_empty() => {
                query.push("0 = 1");
            }
            // One JSON array bind instead of one bind per id, so chunks are not
            // limited by SQLITE_MAX_VARIABLE_NUMBER
            Filter::IdIn(ids) => {
                query
                    .push(quote_ident(scope.primary_key()))
                    .push(" IN (SELECT value FROM json_each(")
                    .push_bind(serde_json::Value::from(ids.clone()).to_string())
                    .push("))");
            }
        }
    }
}

fn push_value(query: &mut QueryBuilder<'_, Sqlite>, value: &FieldValue) {
    match value {
        FieldValue::Bool(v) => {
            query.push_bind(*v);
        }
        FieldValue::Integer(v) => {
            query.push_bind(*v);
        }
        FieldValue::Real(v) => {
            query.push_bind(*v);
        }
        FieldValue::Timestamp(v) => {
            query
                .push(format!("strftime({}, ", TIMESTAMP_FORMAT))
                .push_bind(*v)
                .push(")");
        }
        FieldValue::Text(v) => {
            query.push_bind(v.clone());
        }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn count(&self, scope: &Scope) -> DbResult<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        query.push(quote_ident(scope.table()));
        push_where(&mut query, scope);

        let count = query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn select_ids(
        &self,
        scope: &Scope,
        after: Option<i64>,
        limit: u32,
    ) -> DbResult<Vec<i64>> {
        let scope = match after {
            Some(after) => scope.clone().gt(scope.primary_key().to_string(), after),
            None => scope.clone(),
        };

        let mut query = QueryBuilder::<Sqlite>::new("SELECT ");
        query
            .push(quote_ident(scope.primary_key()))
            .push(" FROM ")
            .push(quote_ident(scope.table()));
        push_where(&mut query, &scope);
        query
            .push(" ORDER BY ")
            .push(quote_ident(scope.primary_key()))
            .push(" LIMIT ")
            .push_bind(limit as i64);

        let ids = query
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn destroy_all(&self, scope: &Scope) -> DbResult<u64> {
        let hooks = self
            .hooks
            .read()
            .get(scope.table())
            .cloned()
            .unwrap_or_default();

        let mut destroyed: u64 = 0;
        for id in self.all_ids(scope).await? {
            for hook in &hooks {
                hook.before_destroy(scope.table(), id).await?;
            }

            let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM ");
            query
                .push(quote_ident(scope.table()))
                .push(" WHERE ")
                .push(quote_ident(scope.primary_key()))
                .push(" = ")
                .push_bind(id);

            let result = query.build().execute(&self.pool).await?;
            destroyed += result.rows_affected();
        }

        Ok(destroyed)
    }

    async fn delete_all(&self, scope: &Scope) -> DbResult<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        query.push(quote_ident(scope.table()));
        push_where(&mut query, scope);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
