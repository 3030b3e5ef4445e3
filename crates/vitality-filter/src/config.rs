//! Filter configuration.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vitality_core::catalog::STRINGIFIED_KEYS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterConfig {
    /// Top-level keys whose values the host stores as JSON-encoded text.
    /// They are parsed before filtering and serialized again afterwards.
    pub stringified_keys: BTreeSet<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            stringified_keys: STRINGIFIED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}
