//! Deterministic identifiers.
//!
//! Records the system synthesizes on its own (an organization's `member`
//! role, a dataset's default templates) get name-based UUIDs so that two
//! writers racing on the same first encounter produce the same record ids.

use uuid::Uuid;

const NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_0a52_8d3e_4b7a_9c51_2e0f_7a64_d3b9);

/// Id derived from `kind` and the owning record's id.
pub fn derived_id(kind: &str, owner_id: &str) -> String {
    Uuid::new_v5(&NAMESPACE, format!("{kind}:{owner_id}").as_bytes()).to_string()
}

/// Fresh random id for a metadata field.
pub fn new_element_id() -> String {
    Uuid::new_v4().to_string()
}
