//! Declarative record retention for database-backed models.
//!
//! Models opt in by declaring how their stale records are found: a custom
//! scope, a `created_at` age or an `updated_at` age. A run then removes
//! those records from a [`RecordStore`](db::RecordStore), one model at a time
//! or across every registered model.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Duration;
//! use prunable::{
//!     db::MemoryRecordStore,
//!     prune::{ModelRegistry, PrunableModel, PruneOptions, Pruner},
//! };
//!
//! # async fn run() -> Result<(), prunable::prune::PruneError> {
//! let registry = Arc::new(ModelRegistry::new());
//! registry.register(PrunableModel::new("sessions").created_after(Duration::days(30)));
//!
//! let pruner = Pruner::new(registry, Arc::new(MemoryRecordStore::new()));
//! let report = pruner.prune(&[], &PruneOptions::new().in_batches()).await?;
//! println!("removed {} records", report.total());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod observability;
pub mod prune;

pub use config::{ConfigError, PruneConfig};
pub use prune::{
    PrunableModel, PruneError, PruneMethod, PruneOptions, PruneOutcome, PruneReport, Pruner,
};
