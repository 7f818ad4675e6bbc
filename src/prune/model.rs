use chrono::Duration;
use serde_json::Value;

use super::{BatchConfig, CustomScope, PolicyConfig, PruneMethod, Refusal};
use crate::db::Scope;

/// A table that opted into pruning, together with its retention settings.
///
/// ```
/// use chrono::Duration;
/// use prunable::prune::{PrunableModel, PruneMethod};
///
/// let sessions = PrunableModel::new("sessions")
///     .created_after(Duration::days(30))
///     .prune_method(PruneMethod::Delete)
///     .in_batches(Some(500));
/// assert_eq!(sessions.name(), "sessions");
/// ```
#[derive(Debug, Clone)]
pub struct PrunableModel {
    name: String,
    table: String,
    primary_key: String,
    policy: PolicyConfig,
}

impl PrunableModel {
    /// A model over `table`, named after it, keyed by `id`.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            name: table.clone(),
            table,
            primary_key: "id".to_string(),
            policy: PolicyConfig::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn created_after(mut self, age: Duration) -> Self {
        self.policy.set_created_after(age, None);
        self
    }

    pub fn updated_after(mut self, age: Duration) -> Self {
        self.policy.set_updated_after(age, None);
        self
    }

    pub fn custom_scope<F>(mut self, f: F) -> Self
    where
        F: Fn(Scope, &[Value]) -> Scope + Send + Sync + 'static,
    {
        self.policy.set_custom_scope(CustomScope::new(f));
        self
    }

    pub fn prune_method(mut self, method: PruneMethod) -> Self {
        self.policy.set_method(method);
        self
    }

    pub fn in_batches(mut self, size: Option<u32>) -> Self {
        self.policy.set_batch_size(size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut PolicyConfig {
        &mut self.policy
    }

    /// Unfiltered scope over the model's table.
    pub fn all(&self) -> Scope {
        Scope::new(self.table.clone()).with_primary_key(self.primary_key.clone())
    }

    /// Set the prune method by name, logging the outcome.
    ///
    /// An unknown name leaves the current setting untouched.
    pub fn set_prune_method(&mut self, method: &str) -> Result<PruneMethod, Refusal> {
        match self.policy.set_prune_method(method) {
            Ok(method) => {
                tracing::info!(
                    model = %self.name,
                    method = %method,
                    "Prune method {} has been set for {}",
                    method,
                    self.name
                );
                Ok(method)
            }
            Err(refusal) => {
                tracing::info!(
                    model = %self.name,
                    method = method,
                    "Incorrect prune method {} has been ignored for {}",
                    method,
                    self.name
                );
                Err(refusal)
            }
        }
    }

    pub fn set_created_after(&mut self, age: Duration, batch: Option<BatchConfig>) {
        self.policy.set_created_after(age, batch);
    }

    pub fn set_updated_after(&mut self, age: Duration, batch: Option<BatchConfig>) {
        self.policy.set_updated_after(age, batch);
    }

    pub fn set_batch_size(&mut self, size: Option<u32>) -> BatchConfig {
        self.policy.set_batch_size(size)
    }
}
