//! SurrealDB implementation of [`GroupRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use vitality_core::error::VitalityResult;
use vitality_core::models::group::{CreateGroup, Group};
use vitality_core::models::user::User;
use vitality_core::repository::GroupRepository;

use super::user::UserRow;
use super::{record_exists, relate};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GroupRow {
    record_id: String,
    created_at: DateTime<Utc>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: row.record_id,
            created_at: row.created_at,
        }
    }
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find(&self, id: &str) -> Result<Option<Group>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('group', $id)")
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<GroupRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(Group::from))
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> VitalityResult<Group> {
        if let Some(existing) = self.find(&input.id).await? {
            debug!(group_id = %input.id, "Group already exists");
            return Ok(existing);
        }

        let result = self
            .db
            .query("CREATE type::record('group', $id)")
            .bind(("id", input.id.clone()))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            return match self.find(&input.id).await? {
                Some(existing) => Ok(existing),
                None => Err(DbError::Query(e.to_string()).into()),
            };
        }

        for user_id in &input.member_ids {
            if record_exists(&self.db, "user", user_id).await? {
                relate(&self.db, "has_member", ("group", &input.id), ("user", user_id)).await?;
            }
        }

        info!(group_id = %input.id, "Group created");
        self.find(&input.id).await?.ok_or_else(|| {
            DbError::NotFound {
                entity: "group".into(),
                id: input.id,
            }
            .into()
        })
    }

    async fn list(&self) -> VitalityResult<Vec<Group>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM group ORDER BY created_at ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn get_members(&self, id: &str) -> VitalityResult<Vec<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE id IN (\
                     SELECT VALUE out FROM has_member \
                     WHERE in = type::record('group', $group_id)\
                 ) \
                 ORDER BY created_at ASC",
            )
            .bind(("group_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn delete(&self, id: &str) -> VitalityResult<()> {
        self.db
            .query(
                "LET $group = type::record('group', $id); \
                 DELETE has_member WHERE in = $group; \
                 DELETE $group;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(group_id = %id, "Group deleted");
        Ok(())
    }
}
