//! Payloads of the host catalog's directory events.

use serde::Deserialize;
use serde_json::Value;
use vitality_core::error::{VitalityError, VitalityResult};

/// A user as the catalog reports it on create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserEvent {
    pub id: String,
    #[serde(default, alias = "name")]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sysadmin: bool,
}

/// A newly created organization and the usernames of its members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationEvent {
    pub id: String,
    pub name: Option<String>,
    pub member_usernames: Vec<String>,
}

impl OrganizationEvent {
    /// Reads an organization record: the name comes from
    /// `title_translated-en`, falling back to `title`, and members from the
    /// `name` of each entry in `users`.
    pub fn from_record(record: &Value) -> VitalityResult<Self> {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| VitalityError::Validation {
                message: "organization record has no id".into(),
            })?;

        let name = ["title_translated-en", "title"]
            .iter()
            .filter_map(|key| record.get(*key).and_then(Value::as_str))
            .find(|name| !name.is_empty())
            .map(str::to_string);

        let member_usernames = record
            .get("users")
            .and_then(Value::as_array)
            .map(|users| {
                users
                    .iter()
                    .filter_map(|u| u.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id: id.to_string(),
            name,
            member_usernames,
        })
    }
}
