//! Per-model prune execution.
//!
//! A run resolves, in order: the applicable retention policy, the reference
//! time, the stale scope, the prune method and the batch size. It then
//! removes the stale scope either in one call or chunk by chunk.
//!
//! Batched runs page through the stale scope by ascending primary key and
//! delete each page through an explicit id set, so rows removed mid-run can
//! neither be skipped nor visited twice.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DEFAULT_BATCH_SIZE, PrunableModel, PruneMethod, Refusal};
use crate::{
    db::{DbResult, RecordStore, Scope},
    observability::metrics,
};

/// Per-run options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PruneOptions {
    /// Prune method name (`destroy` or `delete`). Ignored when the model
    /// configures its own method.
    #[serde(default)]
    pub prune_method: Option<String>,

    /// Reference time for age thresholds. Default: now.
    #[serde(default)]
    pub current_time: Option<chrono::DateTime<Utc>>,

    /// Batch size. Setting it enables batching.
    #[serde(default)]
    pub batch_size: Option<u32>,

    /// Enable batching with the model's size, or 1000.
    #[serde(default)]
    pub in_batches: bool,

    /// Parameters forwarded to custom scopes.
    #[serde(default)]
    pub params: Vec<Value>,

    /// Count what would be removed without removing it.
    #[serde(default)]
    pub dry_run: bool,

    /// Stop a batched run once this many records are removed.
    #[serde(default)]
    pub max_deletes: Option<u64>,
}

impl PruneOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: PruneMethod) -> Self {
        self.prune_method = Some(method.to_string());
        self
    }

    pub fn with_method_name(mut self, method: impl Into<String>) -> Self {
        self.prune_method = Some(method.into());
        self
    }

    pub fn at(mut self, current_time: chrono::DateTime<Utc>) -> Self {
        self.current_time = Some(current_time);
        self
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn in_batches(mut self) -> Self {
        self.in_batches = true;
        self
    }

    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn max_deletes(mut self, max: u64) -> Self {
        self.max_deletes = Some(max);
        self
    }
}

/// Result of pruning one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneOutcome {
    /// The run went ahead and removed this many records.
    Pruned(u64),
    /// The run was refused before anything was touched.
    Refused(Refusal),
}

impl PruneOutcome {
    /// Records removed; refusals count as zero.
    pub fn count(&self) -> u64 {
        match self {
            PruneOutcome::Pruned(count) => *count,
            PruneOutcome::Refused(_) => 0,
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, PruneOutcome::Refused(_))
    }
}

impl PrunableModel {
    /// Remove this model's stale records from `store`.
    ///
    /// Misconfiguration is never an error: it is logged and reported as
    /// [`PruneOutcome::Refused`] without touching the store. Storage
    /// failures propagate.
    ///
    /// Callers must not prune the same model concurrently: batched runs
    /// assume nothing else is walking the same stale scope.
    pub async fn prune(
        &self,
        store: &dyn RecordStore,
        options: &PruneOptions,
    ) -> DbResult<PruneOutcome> {
        tracing::info!(model = %self.name(), "Pruning old records of {}", self.name());

        let policy = match self.policy().resolve() {
            Ok(policy) => policy,
            Err(refusal) => return Ok(self.refuse(refusal)),
        };

        let now = options.current_time.unwrap_or_else(Utc::now);
        let scope = match policy.stale_scope(self.all(), &options.params, now) {
            Ok(scope) => scope,
            Err(refusal) => return Ok(self.refuse(refusal)),
        };

        let method = match self.resolve_method(options) {
            Ok(method) => method,
            Err(refusal) => return Ok(self.refuse(refusal)),
        };
        let batch_size = self.resolve_batch_size(options);

        tracing::info!(
            model = %self.name(),
            policy = policy.name(),
            method = %method,
            batch_size = ?batch_size,
            "Prune method is {}",
            method
        );

        if options.dry_run {
            let stale = store.count(&scope).await?;
            tracing::info!(
                model = %self.name(),
                stale = stale,
                scope = %scope,
                "DRY RUN: Would remove {} records",
                stale
            );
            return Ok(PruneOutcome::Pruned(0));
        }

        let removed = match batch_size {
            Some(size) => {
                self.prune_in_batches(store, method, &scope, size, options.max_deletes)
                    .await?
            }
            None => remove(store, method, &scope).await?,
        };

        if removed > 0 {
            tracing::info!(
                model = %self.name(),
                removed = removed,
                "{} records have been removed.",
                removed
            );
            metrics::record_prune_deletion(self.name(), removed);
        } else {
            tracing::info!(model = %self.name(), "Nothing to prune.");
        }

        Ok(PruneOutcome::Pruned(removed))
    }

    fn refuse(&self, refusal: Refusal) -> PruneOutcome {
        match &refusal {
            Refusal::NotPrunable => tracing::info!(
                model = %self.name(),
                "The model hasn't got a retention policy, action is not allowed."
            ),
            Refusal::Ambiguous(declared) => tracing::info!(
                model = %self.name(),
                declared = ?declared,
                "The model has more than one retention policy, action is not allowed."
            ),
            Refusal::InvalidMethod(method) => tracing::info!(
                model = %self.name(),
                method = %method,
                "Incorrect prune method {}, action is not allowed.",
                method
            ),
            Refusal::CutoffOutOfRange(age) => tracing::info!(
                model = %self.name(),
                age = %age,
                "Retention age is out of range, action is not allowed."
            ),
        }
        metrics::record_prune_refusal(self.name());
        PruneOutcome::Refused(refusal)
    }

    /// The model's own method wins over the per-run option.
    fn resolve_method(&self, options: &PruneOptions) -> Result<PruneMethod, Refusal> {
        if let Some(method) = self.policy().prune_method() {
            return Ok(method);
        }
        match &options.prune_method {
            Some(name) => name.parse(),
            None => Ok(PruneMethod::default()),
        }
    }

    /// Per-run size, then the model's batching, then `in_batches`.
    fn resolve_batch_size(&self, options: &PruneOptions) -> Option<u32> {
        if let Some(size) = options.batch_size.filter(|s| *s > 0) {
            return Some(size);
        }
        if let Some(batch) = self.policy().batch()
            && batch.enabled
        {
            return Some(batch.size);
        }
        options.in_batches.then_some(DEFAULT_BATCH_SIZE)
    }

    async fn prune_in_batches(
        &self,
        store: &dyn RecordStore,
        method: PruneMethod,
        scope: &Scope,
        batch_size: u32,
        max_deletes: Option<u64>,
    ) -> DbResult<u64> {
        let mut total_removed: u64 = 0;
        let mut after: Option<i64> = None;

        loop {
            let limit = match max_deletes {
                Some(max) if total_removed >= max => {
                    tracing::info!(
                        model = %self.name(),
                        max_deletes = max,
                        "Max deletes per run reached, stopping early"
                    );
                    break;
                }
                Some(max) => std::cmp::min(batch_size as u64, max - total_removed) as u32,
                None => batch_size,
            };

            let ids = store.select_ids(scope, after, limit).await?;
            let Some(&last_id) = ids.last() else {
                break;
            };
            let fetched = ids.len();

            let removed = remove(store, method, &scope.only_ids(ids)).await?;
            total_removed += removed;
            after = Some(last_id);

            tracing::debug!(
                model = %self.name(),
                fetched = fetched,
                removed = removed,
                total_removed = total_removed,
                "Pruned batch"
            );

            if fetched < limit as usize {
                break;
            }
        }

        Ok(total_removed)
    }
}

async fn remove(store: &dyn RecordStore, method: PruneMethod, scope: &Scope) -> DbResult<u64> {
    match method {
        PruneMethod::Destroy => store.destroy_all(scope).await,
        PruneMethod::Delete => store.delete_all(scope).await,
    }
}
