//! Role domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide role with access to every dataset's `Full` template.
pub const ADMIN_ROLE_ID: &str = "admin";

/// Process-wide role held by the public identity.
pub const PUBLIC_ROLE_ID: &str = "public";

/// Name of the role synthesized for every new organization.
pub const MEMBER_ROLE_NAME: &str = "member";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: Option<String>,
    /// Owning organization; `None` for the global `admin`/`public` roles.
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub id: String,
    pub name: Option<String>,
    /// When set, the role is scoped to this organization.
    pub organization_id: Option<String>,
}
