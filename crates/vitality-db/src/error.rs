//! Database-specific error types and conversions.

use vitality_core::error::VitalityError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A statement was rejected or returned rows of an unexpected shape.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for VitalityError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => VitalityError::NotFound { entity, id },
            other => VitalityError::Store(other.to_string()),
        }
    }
}
