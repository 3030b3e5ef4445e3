//! Error types for the vitality authorization model.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VitalityError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A structural filter or decode step received a value that is not a map.
    #[error("Invalid record shape: {message}")]
    InvalidRecord { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The graph store could not be reached or rejected a statement.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type VitalityResult<T> = Result<T, VitalityError>;
