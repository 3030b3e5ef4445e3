//! SurrealDB implementation of [`OrganizationRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use vitality_core::error::VitalityResult;
use vitality_core::ids::derived_id;
use vitality_core::models::organization::{
    CreateOrganization, Organization, UpdateOrganization,
};
use vitality_core::models::role::{CreateRole, MEMBER_ROLE_NAME};
use vitality_core::repository::OrganizationRepository;

use super::role::{bind_user_role, insert_role, is_admin};
use super::{edge_exists, record_exists, relate};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    record_id: String,
    name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Organization {
            id: row.record_id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SurrealDB implementation of the Organization repository.
#[derive(Clone)]
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find(&self, id: &str) -> Result<Option<Organization>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('organization', $id)")
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<OrganizationRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(Organization::from))
    }

    async fn get(&self, id: &str) -> Result<Organization, DbError> {
        self.find(id).await?.ok_or_else(|| DbError::NotFound {
            entity: "organization".into(),
            id: id.into(),
        })
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn create(&self, input: CreateOrganization) -> VitalityResult<Organization> {
        if let Some(existing) = self.find(&input.id).await? {
            debug!(organization_id = %input.id, "Organization already exists");
            return Ok(existing);
        }

        let result = self
            .db
            .query("CREATE type::record('organization', $id) SET name = $name")
            .bind(("id", input.id.clone()))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            return match self.find(&input.id).await? {
                Some(existing) => Ok(existing),
                None => Err(DbError::Query(e.to_string()).into()),
            };
        }

        let member_role = insert_role(
            &self.db,
            CreateRole {
                id: derived_id("role:member", &input.id),
                name: Some(MEMBER_ROLE_NAME.into()),
                organization_id: Some(input.id.clone()),
            },
        )
        .await?;

        for user_id in &input.member_ids {
            if is_admin(&self.db, user_id).await? {
                continue;
            }
            bind_user_role(&self.db, user_id, &member_role.id).await?;
        }

        info!(
            organization_id = %input.id,
            members = input.member_ids.len(),
            "Organization created"
        );
        Ok(self.get(&input.id).await?)
    }

    async fn get_by_id(&self, id: &str) -> VitalityResult<Organization> {
        Ok(self.get(id).await?)
    }

    async fn update(&self, id: &str, input: UpdateOrganization) -> VitalityResult<()> {
        let Some(name) = input.name else {
            return Ok(());
        };
        if self.find(id).await?.is_none() {
            debug!(organization_id = %id, "Update of unknown organization ignored");
            return Ok(());
        }

        self.db
            .query(
                "UPDATE type::record('organization', $id) SET \
                 name = $name, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("name", name))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> VitalityResult<()> {
        self.db
            .query(
                "LET $org = type::record('organization', $id); \
                 DELETE owns WHERE in = $org; \
                 DELETE manages_role WHERE in = $org; \
                 DELETE serves WHERE out = $org; \
                 DELETE $org;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(organization_id = %id, "Organization deleted");
        Ok(())
    }

    async fn list(&self) -> VitalityResult<Vec<Organization>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM organization ORDER BY created_at ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Organization::from).collect())
    }

    async fn set_admin_form_access(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> VitalityResult<()> {
        if edge_exists(&self.db, "serves", ("user", user_id), ("organization", organization_id))
            .await?
        {
            return Ok(());
        }
        if !record_exists(&self.db, "user", user_id).await?
            || !record_exists(&self.db, "organization", organization_id).await?
        {
            debug!(user_id, organization_id, "Form access for unknown subject ignored");
            return Ok(());
        }

        relate(&self.db, "serves", ("user", user_id), ("organization", organization_id)).await?;
        debug!(user_id, organization_id, "Form access granted");
        Ok(())
    }
}
