//! Record retention for database-backed models.
//!
//! A [`PrunableModel`] declares which of its records are stale: through a
//! custom scope, a `created_at` age, or an `updated_at` age. Exactly one of
//! these must be declared for a prune run to go ahead; none or several is
//! logged and refused rather than guessed at.
//!
//! [`Pruner`] runs that per-model engine across every model in a
//! [`ModelRegistry`], collecting removed-record counts and isolating
//! per-model failures.
//!
//! Deciding *when* to prune is left to the caller (a cron job, a one-off
//! admin command, a test).

mod engine;
mod error;
mod model;
mod policy;
mod pruner;
mod registry;

#[cfg(test)]
mod tests;

pub use engine::{PruneOptions, PruneOutcome};
pub use error::PruneError;
pub use model::PrunableModel;
pub use policy::{
    BatchConfig, CustomScope, DEFAULT_BATCH_SIZE, PolicyConfig, PruneMethod, Refusal,
    RetentionPolicy,
};
pub use pruner::{ModelFailure, PruneReport, Pruner};
pub use registry::{ModelLoader, ModelRegistry, PreloadedModels};
