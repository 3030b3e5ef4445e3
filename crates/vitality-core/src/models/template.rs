//! Access template domain model.

use serde::{Deserialize, Serialize};

/// Template exposing every known field of a dataset.
pub const FULL_TEMPLATE: &str = "Full";

/// Template exposing only the curated public subset.
pub const MINIMAL_TEMPLATE: &str = "Minimal";

/// A named whitelist of elements, scoped to exactly one dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    pub id: String,
    pub dataset_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Template {
    pub fn is_full(&self) -> bool {
        self.name.as_deref() == Some(FULL_TEMPLATE)
    }
}
