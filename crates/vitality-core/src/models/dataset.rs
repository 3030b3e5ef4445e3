//! Dataset domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog record under visibility control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dataset {
    /// Same id as the host catalog record.
    pub id: String,
    pub name: Option<String>,
    pub owner_org_id: Option<String>,
    /// Language code (`en`, `fr`, ...) to description text.
    pub descriptions: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDataset {
    pub id: String,
    pub owner_org_id: String,
    pub name: Option<String>,
}
