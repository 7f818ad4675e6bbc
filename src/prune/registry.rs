use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{PrunableModel, PruneError};

/// Append-only set of models that opted into pruning.
///
/// Models register once, at definition time. Registering a second model
/// under a name that is already taken keeps the first one.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<Vec<Arc<PrunableModel>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` and return the registered instance.
    pub fn register(&self, model: PrunableModel) -> Arc<PrunableModel> {
        let mut models = self.models.write();
        if let Some(existing) = models.iter().find(|m| m.name() == model.name()) {
            tracing::debug!(model = %model.name(), "Model already registered for pruning");
            return Arc::clone(existing);
        }

        tracing::debug!(model = %model.name(), table = %model.table(), "Registered model for pruning");
        let model = Arc::new(model);
        models.push(Arc::clone(&model));
        model
    }

    /// Every registered model, in registration order.
    pub fn all(&self) -> Vec<Arc<PrunableModel>> {
        self.models.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<PrunableModel>> {
        self.models.read().iter().find(|m| m.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

/// Discovers model definitions and registers the prunable ones.
///
/// [`Pruner`](super::Pruner) calls `load_all` at most once per instance,
/// before the first time it lists models.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load_all(&self, registry: &ModelRegistry) -> Result<(), PruneError>;
}

/// Loader for applications that register every model up front.
pub struct PreloadedModels;

#[async_trait]
impl ModelLoader for PreloadedModels {
    async fn load_all(&self, _registry: &ModelRegistry) -> Result<(), PruneError> {
        Ok(())
    }
}
