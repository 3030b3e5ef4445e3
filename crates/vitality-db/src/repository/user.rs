//! SurrealDB implementation of [`UserRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use vitality_core::error::VitalityResult;
use vitality_core::models::user::{CreateUser, UpdateUser, User};
use vitality_core::repository::UserRepository;

use crate::error::DbError;

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(crate) struct UserRow {
    record_id: String,
    username: Option<String>,
    email: Option<String>,
    gid: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.record_id,
            username: row.username,
            email: row.email,
            gid: row.gid,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find(&self, id: &str) -> Result<Option<User>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)")
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<UserRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(User::from))
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> VitalityResult<User> {
        if let Some(existing) = self.find(&input.id).await? {
            debug!(user_id = %input.id, "User already exists");
            return Ok(existing);
        }

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, email = $email",
            )
            .bind(("id", input.id.clone()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            // Lost a race against another writer with the same id.
            return match self.find(&input.id).await? {
                Some(existing) => Ok(existing),
                None => Err(DbError::Query(e.to_string()).into()),
            };
        }

        info!(user_id = %input.id, "User created");
        self.get_by_id(&input.id).await
    }

    async fn get_by_id(&self, id: &str) -> VitalityResult<User> {
        self.find(id).await?.ok_or_else(|| {
            DbError::NotFound {
                entity: "user".into(),
                id: id.into(),
            }
            .into()
        })
    }

    async fn get_by_username(&self, username: &str) -> VitalityResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE username = $username LIMIT 1",
            )
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: username.into(),
        })?;
        Ok(row.into())
    }

    async fn update(&self, id: &str, input: UpdateUser) -> VitalityResult<()> {
        if self.find(id).await?.is_none() {
            debug!(user_id = %id, "Update of unknown user ignored");
            return Ok(());
        }

        let mut sets = Vec::new();
        if input.username.is_some() {
            sets.push("username = $username");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.gid.is_some() {
            sets.push("gid = $gid");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(username) = input.username {
            builder = builder.bind(("username", username));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(gid) = input.gid {
            builder = builder.bind(("gid", gid));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        debug!(user_id = %id, "User updated");
        Ok(())
    }

    async fn delete(&self, id: &str) -> VitalityResult<()> {
        self.db
            .query(
                "LET $user = type::record('user', $id); \
                 DELETE has_role WHERE in = $user; \
                 DELETE has_member WHERE out = $user; \
                 DELETE serves WHERE in = $user; \
                 DELETE $user;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn list(&self) -> VitalityResult<Vec<User>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user ORDER BY created_at ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
