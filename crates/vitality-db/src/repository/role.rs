//! SurrealDB implementation of [`RoleRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info, warn};
use vitality_core::error::VitalityResult;
use vitality_core::models::role::{ADMIN_ROLE_ID, CreateRole, Role};
use vitality_core::repository::RoleRepository;

use super::{edge_exists, record_exists, relate};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RoleRow {
    record_id: String,
    name: Option<String>,
    organization_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.record_id,
            name: row.name,
            organization_id: row.organization_id,
            created_at: row.created_at,
        }
    }
}

async fn find_role<C: Connection>(db: &Surreal<C>, id: &str) -> Result<Option<Role>, DbError> {
    let mut result = db
        .query("SELECT meta::id(id) AS record_id, * FROM type::record('role', $id)")
        .bind(("id", id.to_string()))
        .await?;
    let rows: Vec<RoleRow> = result.take(0)?;
    Ok(rows.into_iter().next().map(Role::from))
}

/// Creates `role:id` unless it exists. Shared with organization creation,
/// which synthesizes a `member` role.
pub(crate) async fn insert_role<C: Connection>(
    db: &Surreal<C>,
    input: CreateRole,
) -> Result<Role, DbError> {
    if let Some(existing) = find_role(db, &input.id).await? {
        debug!(role_id = %input.id, "Role already exists");
        return Ok(existing);
    }

    let result = db
        .query(
            "CREATE type::record('role', $id) SET \
             name = $name, organization_id = $organization_id",
        )
        .bind(("id", input.id.clone()))
        .bind(("name", input.name))
        .bind(("organization_id", input.organization_id.clone()))
        .await?;

    if let Err(e) = result.check() {
        return match find_role(db, &input.id).await? {
            Some(existing) => Ok(existing),
            None => Err(DbError::Query(e.to_string())),
        };
    }

    if let Some(org_id) = input.organization_id.as_deref() {
        if record_exists(db, "organization", org_id).await? {
            relate(db, "manages_role", ("organization", org_id), ("role", &input.id)).await?;
        } else {
            warn!(role_id = %input.id, organization_id = %org_id, "Role scoped to unknown organization");
        }
    }

    info!(role_id = %input.id, "Role created");
    find_role(db, &input.id).await?.ok_or_else(|| DbError::NotFound {
        entity: "role".into(),
        id: input.id,
    })
}

/// Binds `user_id` to `role_id`, first dropping any binding the user holds
/// to another role of the same organization. Missing nodes make this a
/// no-op.
pub(crate) async fn bind_user_role<C: Connection>(
    db: &Surreal<C>,
    user_id: &str,
    role_id: &str,
) -> Result<(), DbError> {
    if edge_exists(db, "has_role", ("user", user_id), ("role", role_id)).await? {
        debug!(user_id, role_id, "Role binding already present");
        return Ok(());
    }
    if !record_exists(db, "user", user_id).await? {
        debug!(user_id, role_id, "Role binding for unknown user ignored");
        return Ok(());
    }
    let Some(role) = find_role(db, role_id).await? else {
        debug!(user_id, role_id, "Binding to unknown role ignored");
        return Ok(());
    };

    if let Some(org_id) = role.organization_id {
        db.query(
            "DELETE has_role WHERE in = type::record('user', $user_id) \
             AND out IN (SELECT VALUE id FROM role WHERE organization_id = $org_id)",
        )
        .bind(("user_id", user_id.to_string()))
        .bind(("org_id", org_id))
        .await?
        .check()
        .map_err(|e| DbError::Query(e.to_string()))?;
    }

    relate(db, "has_role", ("user", user_id), ("role", role_id)).await?;
    info!(user_id, role_id, "Role bound to user");
    Ok(())
}

/// Whether the user holds the global `admin` role.
pub(crate) async fn is_admin<C: Connection>(db: &Surreal<C>, user_id: &str) -> Result<bool, DbError> {
    edge_exists(db, "has_role", ("user", user_id), ("role", ADMIN_ROLE_ID)).await
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> VitalityResult<Role> {
        Ok(insert_role(&self.db, input).await?)
    }

    async fn get_by_id(&self, id: &str) -> VitalityResult<Role> {
        find_role(&self.db, id).await?.ok_or_else(|| {
            DbError::NotFound {
                entity: "role".into(),
                id: id.into(),
            }
            .into()
        })
    }

    async fn list(&self, organization_id: Option<&str>) -> VitalityResult<Vec<Role>> {
        let mut result = match organization_id {
            Some(org_id) => self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, * FROM role \
                     WHERE organization_id = $org_id ORDER BY created_at ASC",
                )
                .bind(("org_id", org_id.to_string()))
                .await
                .map_err(DbError::from)?,
            None => self
                .db
                .query("SELECT meta::id(id) AS record_id, * FROM role ORDER BY created_at ASC")
                .await
                .map_err(DbError::from)?,
        };

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn set_user_role(&self, user_id: &str, role_id: &str) -> VitalityResult<()> {
        Ok(bind_user_role(&self.db, user_id, role_id).await?)
    }

    async fn detach_user_role(&self, user_id: &str, role_id: &str) -> VitalityResult<()> {
        self.db
            .query(
                "DELETE has_role WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('role', $role_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        debug!(user_id, role_id, "Role detached from user");
        Ok(())
    }

    async fn get_user_roles(&self, user_id: &str) -> VitalityResult<Vec<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE id IN (\
                     SELECT VALUE out FROM has_role \
                     WHERE in = type::record('user', $user_id)\
                 )",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn get_admins(&self) -> VitalityResult<BTreeSet<String>> {
        let mut result = self
            .db
            .query(
                "SELECT VALUE meta::id(in) FROM has_role \
                 WHERE out = type::record('role', $role_id)",
            )
            .bind(("role_id", ADMIN_ROLE_ID))
            .await
            .map_err(DbError::from)?;

        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(ids.into_iter().collect())
    }
}
