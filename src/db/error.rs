use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Destroy hook failed for {table}#{id}: {message}")]
    Hook {
        table: String,
        id: i64,
        message: String,
    },

    #[cfg(feature = "database-sqlite")]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DbResult<T> = Result<T, DbError>;
