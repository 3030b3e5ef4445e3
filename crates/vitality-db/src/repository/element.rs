//! SurrealDB implementation of [`ElementRepository`].

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use vitality_core::catalog::is_minimum_field;
use vitality_core::error::VitalityResult;
use vitality_core::models::element::{Element, FieldMap};
use vitality_core::repository::ElementRepository;

use super::{CountRow, record_exists};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ElementRow {
    record_id: String,
    dataset_id: String,
    name: String,
    required: bool,
}

impl From<ElementRow> for Element {
    fn from(row: ElementRow) -> Self {
        Element {
            id: row.record_id,
            dataset_id: row.dataset_id,
            name: row.name,
            required: row.required,
        }
    }
}

pub(crate) async fn load_elements<C: Connection>(
    db: &Surreal<C>,
    dataset_id: &str,
) -> Result<Vec<Element>, DbError> {
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id, * FROM element \
             WHERE dataset_id = $dataset_id ORDER BY name ASC",
        )
        .bind(("dataset_id", dataset_id.to_string()))
        .await?;
    let rows: Vec<ElementRow> = result.take(0)?;
    Ok(rows.into_iter().map(Element::from).collect())
}

async fn element_exists<C: Connection>(
    db: &Surreal<C>,
    dataset_id: &str,
    name: &str,
) -> Result<bool, DbError> {
    let mut result = db
        .query(
            "SELECT count() AS total FROM element \
             WHERE dataset_id = $dataset_id AND name = $name GROUP ALL",
        )
        .bind(("dataset_id", dataset_id.to_string()))
        .bind(("name", name.to_string()))
        .await?;
    let rows: Vec<CountRow> = result.take(0)?;
    Ok(rows.first().is_some_and(|r| r.total > 0))
}

/// Registers every field whose name is not yet known for the dataset and
/// makes it visible through `template_id`. Returns how many were added.
///
/// Each element is created together with its `can_see` edge. When a
/// concurrent writer registered the same name first, the unique
/// `(dataset_id, name)` index rejects the whole transaction and the field
/// is skipped. Any other failure is returned.
pub(crate) async fn attach_elements<C: Connection>(
    db: &Surreal<C>,
    dataset_id: &str,
    fields: &FieldMap,
    template_id: &str,
) -> Result<usize, DbError> {
    let known: FieldMap = load_elements(db, dataset_id)
        .await?
        .into_iter()
        .map(|e| (e.name, e.id))
        .collect();

    let mut added = 0;
    for (name, id) in fields {
        if known.contains_key(name) {
            continue;
        }

        let result = db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('element', $id) SET \
                     dataset_id = $dataset_id, name = $name, required = $required; \
                 LET $template = type::record('template', $template_id); \
                 LET $element = type::record('element', $id); \
                 RELATE $template -> can_see -> $element; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.clone()))
            .bind(("dataset_id", dataset_id.to_string()))
            .bind(("name", name.clone()))
            .bind(("required", is_minimum_field(name)))
            .bind(("template_id", template_id.to_string()))
            .await?;

        if let Err(e) = result.check() {
            if !element_exists(db, dataset_id, name).await? {
                return Err(DbError::Query(format!(
                    "failed to register field {name} of dataset {dataset_id}: {e}"
                )));
            }
            debug!(dataset_id, field = %name, "Field registered concurrently");
            continue;
        }
        added += 1;
    }

    Ok(added)
}

/// SurrealDB implementation of the Element repository.
#[derive(Clone)]
pub struct SurrealElementRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealElementRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ElementRepository for SurrealElementRepository<C> {
    async fn add_metadata_fields(
        &self,
        dataset_id: &str,
        fields: &FieldMap,
        template_id: &str,
    ) -> VitalityResult<usize> {
        if !record_exists(&self.db, "template", template_id).await? {
            debug!(dataset_id, template_id, "Fields for unknown template ignored");
            return Ok(0);
        }

        let added = attach_elements(&self.db, dataset_id, fields, template_id).await?;
        if added > 0 {
            info!(dataset_id, template_id, added, "Metadata fields registered");
        }
        Ok(added)
    }

    async fn get_metadata_fields(&self, dataset_id: &str) -> VitalityResult<FieldMap> {
        Ok(load_elements(&self.db, dataset_id)
            .await?
            .into_iter()
            .map(|e| (e.name, e.id))
            .collect())
    }

    async fn get_elements(&self, dataset_id: &str) -> VitalityResult<Vec<Element>> {
        Ok(load_elements(&self.db, dataset_id).await?)
    }
}
