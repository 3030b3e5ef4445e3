//! Authorization configuration.

use vitality_core::catalog::{DATASET_FIELDS, PUBLIC_FIELDS};
use vitality_filter::FilterConfig;

/// Configuration for dataset provisioning and record filtering.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Fields registered for every new dataset and exposed by its `Full`
    /// template.
    pub dataset_fields: Vec<String>,
    /// Fields exposed by the `Minimal` template on top of the minimum
    /// required set.
    pub public_fields: Vec<String>,
    pub full_template_description: String,
    pub minimal_template_description: String,
    pub filter: FilterConfig,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            dataset_fields: DATASET_FIELDS.iter().map(|f| f.to_string()).collect(),
            public_fields: PUBLIC_FIELDS.iter().map(|f| f.to_string()).collect(),
            full_template_description: "The full, unrestricted template. Roles bound to it \
                see every metadata field of the dataset."
                .into(),
            minimal_template_description: "Restricts metadata for the bound roles. Location \
                and temporal data are hidden."
                .into(),
            filter: FilterConfig::default(),
        }
    }
}
