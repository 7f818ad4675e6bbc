use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum PruneError {
    #[error("Model discovery failed: {0}")]
    Discovery(String),

    #[error("Unknown prunable model: {0}")]
    UnknownModel(String),

    #[error("Pruning {model} failed: {source}")]
    Storage {
        model: String,
        #[source]
        source: DbError,
    },
}
