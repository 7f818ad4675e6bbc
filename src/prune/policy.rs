//! Retention policy declarations and their resolution.
//!
//! A model declares up to three independent retention signals: a custom
//! scope, a `created_at` age threshold and an `updated_at` age threshold.
//! [`PolicyConfig::resolve`] turns those signals into exactly one
//! [`RetentionPolicy`], or refuses when none or several are declared.

use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Scope;

/// Batch size used when batching is enabled without an explicit size.
pub const DEFAULT_BATCH_SIZE: u32 = 1000;

/// How stale records are removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneMethod {
    /// Row-by-row removal that runs the store's destroy hooks.
    #[default]
    Destroy,
    /// Bulk removal that bypasses destroy hooks.
    Delete,
}

impl PruneMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PruneMethod::Destroy => "destroy",
            PruneMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for PruneMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PruneMethod {
    type Err = Refusal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "destroy" => Ok(PruneMethod::Destroy),
            "delete" => Ok(PruneMethod::Delete),
            other => Err(Refusal::InvalidMethod(other.to_string())),
        }
    }
}

/// Whether stale records are removed in fixed-size chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub enabled: bool,
    pub size: u32,
}

impl BatchConfig {
    /// Enabled batching. A missing or zero size falls back to
    /// [`DEFAULT_BATCH_SIZE`].
    pub fn enabled(size: Option<u32>) -> Self {
        Self {
            enabled: true,
            size: size.filter(|s| *s > 0).unwrap_or(DEFAULT_BATCH_SIZE),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: DEFAULT_BATCH_SIZE,
        }
    }
}

type ScopeFn = dyn Fn(Scope, &[Value]) -> Scope + Send + Sync;

/// Model-supplied query selecting the records that are prunable right now.
///
/// The closure receives the model's unfiltered scope plus the caller's
/// parameters, forwarded untouched.
#[derive(Clone)]
pub struct CustomScope(Arc<ScopeFn>);

impl CustomScope {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Scope, &[Value]) -> Scope + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn resolve(&self, base: Scope, params: &[Value]) -> Scope {
        (self.0)(base, params)
    }
}

impl fmt::Debug for CustomScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomScope(..)")
    }
}

/// The single retention policy that applies to a model.
#[derive(Debug, Clone)]
pub enum RetentionPolicy {
    Custom(CustomScope),
    /// Stale when `created_at` is older than the duration.
    CreatedAfter(Duration),
    /// Stale when `updated_at` is older than the duration.
    UpdatedAfter(Duration),
}

impl RetentionPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            RetentionPolicy::Custom(_) => "custom_scope",
            RetentionPolicy::CreatedAfter(_) => "created_after",
            RetentionPolicy::UpdatedAfter(_) => "updated_after",
        }
    }

    /// Build the stale scope as of `now`.
    ///
    /// Refuses when `now - age` falls outside the representable date range.
    pub fn stale_scope(
        &self,
        base: Scope,
        params: &[Value],
        now: DateTime<Utc>,
    ) -> Result<Scope, Refusal> {
        match self {
            RetentionPolicy::Custom(scope) => Ok(scope.resolve(base, params)),
            RetentionPolicy::CreatedAfter(age) => Ok(base.lt("created_at", cutoff(now, *age)?)),
            RetentionPolicy::UpdatedAfter(age) => Ok(base.lt("updated_at", cutoff(now, *age)?)),
        }
    }
}

fn cutoff(now: DateTime<Utc>, age: Duration) -> Result<DateTime<Utc>, Refusal> {
    now.checked_sub_signed(age).ok_or(Refusal::CutoffOutOfRange(age))
}

/// Why a model was not pruned. Refusals are logged, never raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Refusal {
    #[error("no retention policy is configured")]
    NotPrunable,

    #[error("more than one retention policy is configured: {}", .0.join(", "))]
    Ambiguous(Vec<&'static str>),

    #[error("incorrect prune method {0:?}")]
    InvalidMethod(String),

    #[error("retention age {0} reaches past the earliest representable time")]
    CutoffOutOfRange(Duration),
}

/// Retention settings declared by a model.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    custom_scope: Option<CustomScope>,
    created_after: Option<Duration>,
    updated_after: Option<Duration>,
    prune_method: Option<PruneMethod>,
    batch: Option<BatchConfig>,
}

impl PolicyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and store the prune method. On error nothing changes.
    pub fn set_prune_method(&mut self, method: &str) -> Result<PruneMethod, Refusal> {
        let method = method.parse::<PruneMethod>()?;
        self.set_method(method);
        Ok(method)
    }

    pub fn set_method(&mut self, method: PruneMethod) {
        self.prune_method = Some(method);
    }

    pub fn set_created_after(&mut self, age: Duration, batch: Option<BatchConfig>) {
        self.created_after = Some(age);
        if batch.is_some() {
            self.batch = batch;
        }
    }

    pub fn set_updated_after(&mut self, age: Duration, batch: Option<BatchConfig>) {
        self.updated_after = Some(age);
        if batch.is_some() {
            self.batch = batch;
        }
    }

    pub fn set_custom_scope(&mut self, scope: CustomScope) {
        self.custom_scope = Some(scope);
    }

    /// Enable batching; a missing or zero size means [`DEFAULT_BATCH_SIZE`].
    pub fn set_batch_size(&mut self, size: Option<u32>) -> BatchConfig {
        let batch = BatchConfig::enabled(size);
        self.batch = Some(batch);
        batch
    }

    /// Forget every declared retention signal. Method and batching stay.
    pub fn clear_policy(&mut self) {
        self.custom_scope = None;
        self.created_after = None;
        self.updated_after = None;
    }

    pub fn prune_method(&self) -> Option<PruneMethod> {
        self.prune_method
    }

    pub fn batch(&self) -> Option<BatchConfig> {
        self.batch
    }

    /// Names of the retention signals currently declared.
    pub fn declared(&self) -> Vec<&'static str> {
        let mut declared = Vec::new();
        if self.custom_scope.is_some() {
            declared.push("custom_scope");
        }
        if self.created_after.is_some() {
            declared.push("created_after");
        }
        if self.updated_after.is_some() {
            declared.push("updated_after");
        }
        declared
    }

    /// The one applicable policy. Zero or several declared signals refuse.
    pub fn resolve(&self) -> Result<RetentionPolicy, Refusal> {
        match (&self.custom_scope, self.created_after, self.updated_after) {
            (None, None, None) => Err(Refusal::NotPrunable),
            (Some(scope), None, None) => Ok(RetentionPolicy::Custom(scope.clone())),
            (None, Some(age), None) => Ok(RetentionPolicy::CreatedAfter(age)),
            (None, None, Some(age)) => Ok(RetentionPolicy::UpdatedAfter(age)),
            _ => Err(Refusal::Ambiguous(self.declared())),
        }
    }
}
