//! Metadata field ("element") domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field path (`temporal-extent/begin`) to element id, for one dataset.
pub type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Element {
    pub id: String,
    pub dataset_id: String,
    /// Slash-joined path of the field inside the record.
    pub name: String,
    /// Required fields are part of every whitelist derived from the
    /// `Full` template.
    pub required: bool,
}
