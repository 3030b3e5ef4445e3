//! SurrealDB implementation of [`TemplateRepository`].
//!
//! Resolution path: `user -has_role-> role -uses_template-> template
//! -can_see-> element`, with templates scoped to one dataset through their
//! `dataset_id`.

use std::collections::BTreeSet;

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use vitality_core::error::VitalityResult;
use vitality_core::models::element::FieldMap;
use vitality_core::models::template::{CreateTemplate, FULL_TEMPLATE, Template};
use vitality_core::repository::TemplateRepository;

use super::element::{attach_elements, load_elements};
use super::{CountRow, edge_exists, record_exists};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TemplateRow {
    record_id: String,
    dataset_id: String,
    name: Option<String>,
    description: Option<String>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Template {
            id: row.record_id,
            dataset_id: row.dataset_id,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct FieldRow {
    record_id: String,
    name: String,
}

/// SurrealDB implementation of the Template repository.
#[derive(Clone)]
pub struct SurrealTemplateRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTemplateRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find(&self, id: &str) -> Result<Option<Template>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('template', $id)")
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<TemplateRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(Template::from))
    }

    async fn count_for_dataset(&self, dataset_id: &str) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM template \
                 WHERE dataset_id = $dataset_id GROUP ALL",
            )
            .bind(("dataset_id", dataset_id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    /// Points an existing template at `dataset_id`, dropping its previous
    /// dataset association and the role bindings made under it.
    async fn rebind(&self, template: &Template, dataset_id: &str) -> Result<(), DbError> {
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 LET $template = type::record('template', $template_id); \
                 LET $ds = type::record('dataset', $dataset_id); \
                 DELETE has_template WHERE out = $template; \
                 DELETE uses_template WHERE out = $template; \
                 DELETE can_see WHERE in = $template; \
                 UPDATE $template SET dataset_id = $dataset_id; \
                 RELATE $ds -> has_template -> $template; \
                 COMMIT TRANSACTION;",
            )
            .bind(("template_id", template.id.clone()))
            .bind(("dataset_id", dataset_id.to_string()))
            .await?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(
            template_id = %template.id,
            from = %template.dataset_id,
            to = dataset_id,
            "Template moved to another dataset"
        );
        Ok(())
    }

    /// Swaps the template's `can_see` edges for the given elements of its
    /// dataset in one transaction.
    async fn replace_whitelist(
        &self,
        template: &Template,
        element_ids: &BTreeSet<String>,
    ) -> Result<(), DbError> {
        let ids: Vec<String> = element_ids.iter().cloned().collect();
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 LET $template = type::record('template', $template_id); \
                 DELETE can_see WHERE in = $template; \
                 FOR $element IN (\
                     SELECT VALUE id FROM element \
                     WHERE dataset_id = $dataset_id AND meta::id(id) IN $ids\
                 ) { \
                     RELATE $template -> can_see -> $element; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("template_id", template.id.clone()))
            .bind(("dataset_id", template.dataset_id.clone()))
            .bind(("ids", ids))
            .await?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    /// Whether the stored whitelist is exactly `element_ids` restricted to
    /// the template's dataset.
    async fn whitelist_matches(
        &self,
        template: &Template,
        element_ids: &BTreeSet<String>,
    ) -> Result<bool, DbError> {
        let expected: BTreeSet<String> = load_elements(&self.db, &template.dataset_id)
            .await?
            .into_iter()
            .map(|e| e.id)
            .filter(|id| element_ids.contains(id))
            .collect();

        let mut result = self
            .db
            .query(
                "SELECT VALUE meta::id(out) FROM can_see \
                 WHERE in = type::record('template', $template_id)",
            )
            .bind(("template_id", template.id.clone()))
            .await?;
        let current: BTreeSet<String> = result.take::<Vec<String>>(0)?.into_iter().collect();
        Ok(current == expected)
    }

    async fn template_names(
        &self,
        dataset_id: &str,
        roles_query: &'static str,
        subject_id: &str,
    ) -> Result<Vec<String>, DbError> {
        let query = format!(
            "SELECT VALUE name FROM template \
             WHERE dataset_id = $dataset_id \
             AND id IN (\
                 SELECT VALUE out FROM uses_template WHERE in IN ({roles_query})\
             )"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("dataset_id", dataset_id.to_string()))
            .bind(("subject_id", subject_id.to_string()))
            .await?;
        let names: Vec<Option<String>> = result.take(0)?;
        Ok(names.into_iter().flatten().collect())
    }
}

/// A whitelist replace that loses to a concurrent writer is tried again
/// this many times in total.
const WHITELIST_ATTEMPTS: u32 = 2;

const ROLE_ITSELF: &str = "SELECT VALUE id FROM type::record('role', $subject_id)";
const ROLES_OF_USER: &str =
    "SELECT VALUE out FROM has_role WHERE in = type::record('user', $subject_id)";

impl<C: Connection> TemplateRepository for SurrealTemplateRepository<C> {
    async fn create_full(
        &self,
        dataset_id: &str,
        input: CreateTemplate,
        fields: &FieldMap,
    ) -> VitalityResult<bool> {
        if self.count_for_dataset(dataset_id).await? > 0 {
            debug!(dataset_id, "Dataset already has templates");
            return Ok(false);
        }

        let template = self.create(dataset_id, input).await?;
        let added = attach_elements(&self.db, dataset_id, fields, &template.id).await?;

        info!(dataset_id, template_id = %template.id, fields = added, "Full template provisioned");
        Ok(true)
    }

    async fn create(&self, dataset_id: &str, input: CreateTemplate) -> VitalityResult<Template> {
        if !record_exists(&self.db, "dataset", dataset_id).await? {
            return Err(DbError::NotFound {
                entity: "dataset".into(),
                id: dataset_id.into(),
            }
            .into());
        }

        if let Some(existing) = self.find(&input.id).await? {
            if existing.dataset_id != dataset_id {
                self.rebind(&existing, dataset_id).await?;
                return Ok(Template {
                    dataset_id: dataset_id.to_string(),
                    ..existing
                });
            }
            debug!(template_id = %input.id, "Template already exists");
            return Ok(existing);
        }

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('template', $id) SET \
                     dataset_id = $dataset_id, name = $name, description = $description; \
                 LET $ds = type::record('dataset', $dataset_id); \
                 LET $template = type::record('template', $id); \
                 RELATE $ds -> has_template -> $template; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", input.id.clone()))
            .bind(("dataset_id", dataset_id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            return match self.find(&input.id).await? {
                Some(existing) => Ok(existing),
                None => Err(DbError::Query(e.to_string()).into()),
            };
        }

        info!(dataset_id, template_id = %input.id, "Template created");
        self.find(&input.id).await?.ok_or_else(|| {
            DbError::NotFound {
                entity: "template".into(),
                id: input.id,
            }
            .into()
        })
    }

    async fn list_by_dataset(&self, dataset_id: &str) -> VitalityResult<Vec<Template>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM template \
                 WHERE dataset_id = $dataset_id ORDER BY created_at ASC",
            )
            .bind(("dataset_id", dataset_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TemplateRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Template::from).collect())
    }

    async fn set_template_access(&self, role_id: &str, template_id: &str) -> VitalityResult<()> {
        if edge_exists(&self.db, "uses_template", ("role", role_id), ("template", template_id))
            .await?
        {
            return Ok(());
        }
        let Some(template) = self.find(template_id).await? else {
            debug!(role_id, template_id, "Binding to unknown template ignored");
            return Ok(());
        };
        if !record_exists(&self.db, "role", role_id).await? {
            debug!(role_id, template_id, "Binding of unknown role ignored");
            return Ok(());
        }

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $role = type::record('role', $role_id); \
                 LET $template = type::record('template', $template_id); \
                 DELETE uses_template WHERE in = $role AND out IN (\
                     SELECT VALUE id FROM template WHERE dataset_id = $dataset_id\
                 ); \
                 RELATE $role -> uses_template -> $template; \
                 COMMIT TRANSACTION;",
            )
            .bind(("role_id", role_id.to_string()))
            .bind(("template_id", template_id.to_string()))
            .bind(("dataset_id", template.dataset_id.clone()))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            if !edge_exists(&self.db, "uses_template", ("role", role_id), ("template", template_id))
                .await?
            {
                return Err(DbError::Query(e.to_string()).into());
            }
        }

        debug!(role_id, template_id, dataset_id = %template.dataset_id, "Template bound to role");
        Ok(())
    }

    async fn set_template_access_by_name(
        &self,
        dataset_id: &str,
        role_id: &str,
        template_name: &str,
    ) -> VitalityResult<()> {
        let templates = self.list_by_dataset(dataset_id).await?;
        match templates
            .iter()
            .find(|t| t.name.as_deref() == Some(template_name))
        {
            Some(template) => self.set_template_access(role_id, &template.id).await,
            None => {
                debug!(dataset_id, template_name, "No template with that name");
                Ok(())
            }
        }
    }

    async fn set_full_access_to_datasets(&self, role_id: &str) -> VitalityResult<()> {
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM template WHERE name = $name")
            .bind(("name", FULL_TEMPLATE))
            .await
            .map_err(DbError::from)?;
        let template_ids: Vec<String> = result.take(0).map_err(DbError::from)?;

        for template_id in &template_ids {
            self.set_template_access(role_id, template_id).await?;
        }

        info!(role_id, datasets = template_ids.len(), "Full access granted");
        Ok(())
    }

    async fn template_access_for_role(
        &self,
        dataset_id: &str,
        role_id: &str,
    ) -> VitalityResult<Option<String>> {
        let names = self
            .template_names(dataset_id, ROLE_ITSELF, role_id)
            .await?;
        Ok(names.into_iter().next())
    }

    async fn template_access_for_user(
        &self,
        dataset_id: &str,
        user_id: &str,
    ) -> VitalityResult<Option<String>> {
        let names = self
            .template_names(dataset_id, ROLES_OF_USER, user_id)
            .await?;
        // A user holding several roles sees through the widest template.
        if names.iter().any(|n| n == FULL_TEMPLATE) {
            return Ok(Some(FULL_TEMPLATE.to_string()));
        }
        Ok(names.into_iter().min())
    }

    async fn set_visible_fields(
        &self,
        template_id: &str,
        element_ids: &BTreeSet<String>,
    ) -> VitalityResult<()> {
        let Some(template) = self.find(template_id).await? else {
            debug!(template_id, "Whitelist of unknown template ignored");
            return Ok(());
        };

        let mut attempt = 1;
        while let Err(e) = self.replace_whitelist(&template, element_ids).await {
            if self.whitelist_matches(&template, element_ids).await? {
                debug!(template_id, "Whitelist already written concurrently");
                break;
            }
            if attempt == WHITELIST_ATTEMPTS {
                return Err(e.into());
            }
            debug!(template_id, error = %e, "Retrying whitelist replace");
            attempt += 1;
        }

        info!(
            template_id,
            dataset_id = %template.dataset_id,
            requested = element_ids.len(),
            "Visible fields replaced"
        );
        Ok(())
    }

    async fn visible_fields_for_template(&self, template_id: &str) -> VitalityResult<FieldMap> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, name FROM element \
                 WHERE id IN (\
                     SELECT VALUE out FROM can_see \
                     WHERE in = type::record('template', $template_id)\
                 )",
            )
            .bind(("template_id", template_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<FieldRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| (r.name, r.record_id)).collect())
    }

    async fn visible_field_ids(
        &self,
        dataset_id: &str,
        user_id: &str,
    ) -> VitalityResult<BTreeSet<String>> {
        let mut result = self
            .db
            .query(
                "SELECT VALUE meta::id(out) FROM can_see \
                 WHERE in IN (\
                     SELECT VALUE id FROM template \
                     WHERE dataset_id = $dataset_id \
                     AND id IN (\
                         SELECT VALUE out FROM uses_template \
                         WHERE in IN (\
                             SELECT VALUE out FROM has_role \
                             WHERE in = type::record('user', $user_id)\
                         )\
                     )\
                 )",
            )
            .bind(("dataset_id", dataset_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(ids.into_iter().collect())
    }
}
