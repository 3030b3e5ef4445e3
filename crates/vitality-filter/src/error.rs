//! Filter error types and conversions.

use vitality_core::error::VitalityError;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// Only maps can be filtered; anything else is a caller bug.
    #[error("Only maps can be filtered, got {found}")]
    NotAMap { found: &'static str },

    #[error("Failed to re-encode field {key}: {message}")]
    Encode { key: String, message: String },
}

impl From<FilterError> for VitalityError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::NotAMap { .. } => VitalityError::InvalidRecord {
                message: err.to_string(),
            },
            other => VitalityError::Internal(other.to_string()),
        }
    }
}
