//! Fleet-wide pruning.
//!
//! [`Pruner`] prunes every registered model (or an explicit subset) one
//! after another against a shared [`RecordStore`]. Two modes:
//!
//! - [`Pruner::prune_all`] stops at the first storage failure
//! - [`Pruner::prune`] records failures per model and keeps going

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::OnceCell;

use super::{ModelLoader, ModelRegistry, PreloadedModels, PrunableModel, PruneError, PruneOptions};
use crate::{
    db::{DbError, RecordStore},
    observability::metrics,
};

/// A model whose prune run failed.
#[derive(Debug)]
pub struct ModelFailure {
    pub model: String,
    pub error: DbError,
}

/// Results from a single fleet run.
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Records removed per model name. Refused models report 0.
    pub pruned: BTreeMap<String, u64>,
    /// Models whose run failed, in the order they were attempted.
    pub errors: Vec<ModelFailure>,
}

impl PruneReport {
    /// Total number of records removed across all models.
    pub fn total(&self) -> u64 {
        self.pruned.values().sum()
    }

    /// Check if any records were removed.
    pub fn has_deletions(&self) -> bool {
        self.total() > 0
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_parts(self) -> (BTreeMap<String, u64>, Vec<ModelFailure>) {
        (self.pruned, self.errors)
    }
}

pub struct Pruner {
    registry: Arc<ModelRegistry>,
    loader: Arc<dyn ModelLoader>,
    store: Arc<dyn RecordStore>,
    loaded: OnceCell<()>,
}

impl Pruner {
    /// A pruner over models registered directly in `registry`.
    pub fn new(registry: Arc<ModelRegistry>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            registry,
            loader: Arc::new(PreloadedModels),
            store,
            loaded: OnceCell::new(),
        }
    }

    /// Discover models with `loader` before the first listing.
    pub fn with_loader(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Every participating model.
    ///
    /// The first call runs the loader; later calls only read the registry.
    /// A failed load is returned and leaves the pruner unloaded.
    pub async fn models(&self) -> Result<Vec<Arc<PrunableModel>>, PruneError> {
        self.loaded
            .get_or_try_init(|| async {
                tracing::debug!("Loading prunable models");
                self.loader.load_all(&self.registry).await?;
                tracing::info!(models = self.registry.len(), "Loaded prunable models");
                Ok::<(), PruneError>(())
            })
            .await?;

        Ok(self.registry.all())
    }

    /// Look registered models up by name.
    pub async fn select(&self, names: &[&str]) -> Result<Vec<Arc<PrunableModel>>, PruneError> {
        self.models().await?;
        names
            .iter()
            .map(|name| {
                self.registry
                    .get(name)
                    .ok_or_else(|| PruneError::UnknownModel(name.to_string()))
            })
            .collect()
    }

    async fn resolve_models(
        &self,
        subset: &[Arc<PrunableModel>],
    ) -> Result<Vec<Arc<PrunableModel>>, PruneError> {
        if subset.is_empty() {
            self.models().await
        } else {
            Ok(subset.to_vec())
        }
    }

    /// Prune `subset`, or every model when it is empty, stopping at the
    /// first storage failure.
    pub async fn prune_all(
        &self,
        subset: &[Arc<PrunableModel>],
        options: &PruneOptions,
    ) -> Result<BTreeMap<String, u64>, PruneError> {
        let mut pruned = BTreeMap::new();

        for model in self.resolve_models(subset).await? {
            let outcome = model
                .prune(self.store.as_ref(), options)
                .await
                .map_err(|source| PruneError::Storage {
                    model: model.name().to_string(),
                    source,
                })?;
            pruned.insert(model.name().to_string(), outcome.count());
        }

        Ok(pruned)
    }

    /// Prune `subset`, or every model when it is empty, isolating failures.
    ///
    /// A model whose run fails is recorded in [`PruneReport::errors`] and the
    /// remaining models are still attempted. Only discovery errors escape.
    pub async fn prune(
        &self,
        subset: &[Arc<PrunableModel>],
        options: &PruneOptions,
    ) -> Result<PruneReport, PruneError> {
        let mut report = PruneReport::default();

        for model in self.resolve_models(subset).await? {
            match model.prune(self.store.as_ref(), options).await {
                Ok(outcome) => {
                    report
                        .pruned
                        .insert(model.name().to_string(), outcome.count());
                }
                Err(error) => {
                    tracing::error!(model = %model.name(), error = %error, "Error pruning model");
                    metrics::record_prune_failure(model.name());
                    report.errors.push(ModelFailure {
                        model: model.name().to_string(),
                        error,
                    });
                }
            }
        }

        if report.has_deletions() || report.has_errors() {
            tracing::info!(
                models = report.pruned.len() + report.errors.len(),
                removed = report.total(),
                failed = report.errors.len(),
                "Prune run complete"
            );
        } else {
            tracing::debug!("Prune run complete, nothing to prune");
        }

        Ok(report)
    }
}
