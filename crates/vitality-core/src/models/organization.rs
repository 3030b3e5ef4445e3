//! Organization domain model.
//!
//! Organizations own datasets and manage the roles their members hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new organization.
///
/// On first creation a `member` role is synthesized for the organization
/// and every listed user that is not an administrator is bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub id: String,
    pub name: Option<String>,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateOrganization {
    pub name: Option<String>,
}
