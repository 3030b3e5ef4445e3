//! Requesting identity.

use vitality_core::models::user::PUBLIC_USER_ID;

/// Who is asking to see a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// No authenticated user.
    Public,
    User(String),
}

impl Identity {
    /// Maps the host's optional user id; a missing or blank id, or the
    /// sentinel `public` id, is the public identity.
    pub fn from_user_id(user_id: Option<&str>) -> Self {
        match user_id.map(str::trim) {
            None | Some("") | Some(PUBLIC_USER_ID) => Identity::Public,
            Some(id) => Identity::User(id.to_string()),
        }
    }

    /// Id of the user node visibility is resolved from.
    pub fn subject_id(&self) -> &str {
        match self {
            Identity::Public => PUBLIC_USER_ID,
            Identity::User(id) => id,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Identity::Public)
    }
}
