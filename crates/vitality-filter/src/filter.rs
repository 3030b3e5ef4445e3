//! The redaction pipeline: decode, flatten, filter, unflatten, encode.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{debug, trace};
use vitality_core::ids::new_element_id;
use vitality_core::models::element::FieldMap;

use crate::config::FilterConfig;
use crate::decode::decode;
use crate::encode::encode;
use crate::error::FilterError;
use crate::flatten::{flatten, unflatten};

/// Redacts records down to a whitelist of field ids.
///
/// Pure in-memory work: the input record is never mutated and no I/O
/// happens here.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    config: FilterConfig,
}

impl ContentFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Returns a copy of `record` holding only the paths that are known in
    /// `fields` and whose id is in `visible`.
    ///
    /// JSON-encoded values are expanded first, so sub-fields of a
    /// stringified field are filtered individually and the survivors are
    /// re-encoded afterwards.
    pub fn filter(
        &self,
        record: &Value,
        fields: &FieldMap,
        visible: &BTreeSet<String>,
    ) -> Result<Value, FilterError> {
        let decoded = decode(record)?;
        let kept = filter_map(decoded, fields, visible);
        let encoded = encode(unflatten(kept), &self.config.stringified_keys)?;
        Ok(Value::Object(encoded))
    }

    /// Paths present in `record` but missing from `fields`, each paired with
    /// a freshly generated element id.
    pub fn keys_match(&self, record: &Value, fields: &FieldMap) -> Result<FieldMap, FilterError> {
        let flat = flatten(decode(record)?);
        let missing: FieldMap = flat
            .into_iter()
            .filter(|(path, _)| !fields.contains_key(path))
            .map(|(path, _)| (path, new_element_id()))
            .collect();

        if !missing.is_empty() {
            debug!(count = missing.len(), "Record carries unregistered fields");
        }
        Ok(missing)
    }

    /// Re-encodes the configured stringified keys of an expanded record.
    pub fn encode(&self, map: Map<String, Value>) -> Result<Map<String, Value>, FilterError> {
        encode(map, &self.config.stringified_keys)
    }
}

/// Filters an already decoded map and returns the surviving flat entries.
fn filter_map(
    map: Map<String, Value>,
    fields: &FieldMap,
    visible: &BTreeSet<String>,
) -> Map<String, Value> {
    flatten(map)
        .into_iter()
        .filter_map(|(path, value)| {
            let Some(field_id) = fields.get(&path) else {
                debug!(field = %path, "Dropped unknown field");
                return None;
            };
            if !visible.contains(field_id) {
                trace!(field = %path, "Field not visible");
                return None;
            }
            let value = match value {
                Value::Object(inner) => {
                    Value::Object(unflatten(filter_map(inner, fields, visible)))
                }
                other => other,
            };
            Some((path, value))
        })
        .collect()
}
