//! Per-model retention declared in configuration.
//!
//! # Example
//!
//! ```toml
//! [models.sessions]
//! created_after_days = 30
//! prune_method = "delete"
//! batch_size = 500
//!
//! [models.audit_events]
//! table = "audit_logs"
//! updated_after_days = 730
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::prune::{ModelLoader, ModelRegistry, PrunableModel, PruneError, PruneMethod};

/// Retention settings for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPruneConfig {
    /// Table holding the model's records.
    /// Default: the model's key in `[models]`
    #[serde(default)]
    pub table: Option<String>,

    /// Integer primary key column.
    /// Default: "id"
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Records are stale once `created_at` is older than this many days.
    #[serde(default)]
    pub created_after_days: Option<u32>,

    /// Records are stale once `updated_at` is older than this many days.
    #[serde(default)]
    pub updated_after_days: Option<u32>,

    /// Prune method for this model; overrides the per-run method.
    #[serde(default)]
    pub prune_method: Option<PruneMethod>,

    /// Batch size. Setting it enables batching.
    #[serde(default)]
    pub batch_size: Option<u32>,

    /// Enable batching with the default size.
    #[serde(default)]
    pub in_batches: bool,
}

impl Default for ModelPruneConfig {
    fn default() -> Self {
        Self {
            table: None,
            primary_key: default_primary_key(),
            created_after_days: None,
            updated_after_days: None,
            prune_method: None,
            batch_size: None,
            in_batches: false,
        }
    }
}

/// Upper bound on `*_after_days`, about a thousand years.
pub const MAX_RETENTION_DAYS: u32 = 365_000;

fn default_primary_key() -> String {
    "id".to_string()
}

impl ModelPruneConfig {
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.created_after_days.is_some() && self.updated_after_days.is_some() {
            return Err(ConfigError::Validation(format!(
                "models.{}: created_after_days and updated_after_days are mutually exclusive",
                name
            )));
        }
        if self.created_after_days == Some(0) || self.updated_after_days == Some(0) {
            return Err(ConfigError::Validation(format!(
                "models.{}: retention age must be at least one day",
                name
            )));
        }
        if let Some(days) = self.created_after_days.or(self.updated_after_days)
            && days > MAX_RETENTION_DAYS
        {
            return Err(ConfigError::Validation(format!(
                "models.{}: retention age must be at most {} days, got {}",
                name, MAX_RETENTION_DAYS, days
            )));
        }
        if self.primary_key.is_empty() {
            return Err(ConfigError::Validation(format!(
                "models.{}: primary_key must not be empty",
                name
            )));
        }
        Ok(())
    }

    /// Build the model described by this section.
    pub fn to_model(&self, name: &str) -> PrunableModel {
        let table = self.table.clone().unwrap_or_else(|| name.to_string());
        let mut model = PrunableModel::new(table)
            .named(name)
            .with_primary_key(self.primary_key.clone());

        if let Some(days) = self.created_after_days {
            model = model.created_after(Duration::days(days as i64));
        }
        if let Some(days) = self.updated_after_days {
            model = model.updated_after(Duration::days(days as i64));
        }
        if let Some(method) = self.prune_method {
            model = model.prune_method(method);
        }
        if self.batch_size.is_some() || self.in_batches {
            model = model.in_batches(self.batch_size);
        }

        model
    }
}

/// Registers every configured model on first load.
pub struct ConfigModelLoader {
    models: BTreeMap<String, ModelPruneConfig>,
}

impl ConfigModelLoader {
    pub fn new(models: BTreeMap<String, ModelPruneConfig>) -> Self {
        Self { models }
    }
}

#[async_trait]
impl ModelLoader for ConfigModelLoader {
    async fn load_all(&self, registry: &ModelRegistry) -> Result<(), PruneError> {
        for (name, config) in &self.models {
            config
                .validate(name)
                .map_err(|e| PruneError::Discovery(e.to_string()))?;
            registry.register(config.to_model(name));
        }
        Ok(())
    }
}
