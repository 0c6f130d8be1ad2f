//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A JSON column could not be encoded
    #[error("invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Map a unique-constraint violation to [`DatabaseError::AlreadyExists`].
pub(crate) fn map_unique(entity: &'static str, id: impl Into<String>) -> impl FnOnce(sqlx::Error) -> DatabaseError {
    let id = id.into();
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists { entity, id };
            }
        }
        DatabaseError::Sqlx(e)
    }
}
