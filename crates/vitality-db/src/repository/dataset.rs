//! SurrealDB implementation of [`DatasetRepository`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use vitality_core::error::VitalityResult;
use vitality_core::models::dataset::{CreateDataset, Dataset};
use vitality_core::repository::DatasetRepository;

use super::{edge_exists, record_exists};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct DatasetRow {
    record_id: String,
    name: Option<String>,
    owner_org_id: Option<String>,
    descriptions: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DatasetRow> for Dataset {
    fn from(row: DatasetRow) -> Self {
        let descriptions = match row.descriptions {
            serde_json::Value::Object(map) => map
                .into_iter()
                .filter_map(|(lang, text)| match text {
                    serde_json::Value::String(text) => Some((lang, text)),
                    _ => None,
                })
                .collect(),
            _ => BTreeMap::new(),
        };
        Dataset {
            id: row.record_id,
            name: row.name,
            owner_org_id: row.owner_org_id,
            descriptions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SurrealDB implementation of the Dataset repository.
#[derive(Clone)]
pub struct SurrealDatasetRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDatasetRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find(&self, id: &str) -> Result<Option<Dataset>, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('dataset', $id)")
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<DatasetRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(Dataset::from))
    }

    async fn get(&self, id: &str) -> Result<Dataset, DbError> {
        self.find(id).await?.ok_or_else(|| DbError::NotFound {
            entity: "dataset".into(),
            id: id.into(),
        })
    }

    /// Makes `org_id` the only owner of the dataset.
    async fn set_owner(&self, dataset_id: &str, org_id: &str) -> Result<(), DbError> {
        if edge_exists(&self.db, "owns", ("organization", org_id), ("dataset", dataset_id)).await? {
            return Ok(());
        }
        if !record_exists(&self.db, "organization", org_id).await? {
            debug!(dataset_id, organization_id = org_id, "Owner organization unknown");
            return Ok(());
        }

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 LET $org = type::record('organization', $org_id); \
                 LET $ds = type::record('dataset', $dataset_id); \
                 DELETE owns WHERE out = $ds; \
                 RELATE $org -> owns -> $ds; \
                 UPDATE $ds SET owner_org_id = $org_id, updated_at = time::now(); \
                 COMMIT TRANSACTION;",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("dataset_id", dataset_id.to_string()))
            .await?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(dataset_id, organization_id = org_id, "Dataset ownership set");
        Ok(())
    }
}

impl<C: Connection> DatasetRepository for SurrealDatasetRepository<C> {
    async fn create(&self, input: CreateDataset) -> VitalityResult<Dataset> {
        if self.find(&input.id).await?.is_none() {
            let result = self
                .db
                .query("CREATE type::record('dataset', $id) SET name = $name")
                .bind(("id", input.id.clone()))
                .bind(("name", input.name))
                .await
                .map_err(DbError::from)?;

            match result.check() {
                Ok(_) => info!(dataset_id = %input.id, "Dataset created"),
                Err(e) => {
                    if self.find(&input.id).await?.is_none() {
                        return Err(DbError::Query(e.to_string()).into());
                    }
                }
            }
        } else {
            debug!(dataset_id = %input.id, "Dataset already exists");
        }

        self.set_owner(&input.id, &input.owner_org_id).await?;
        Ok(self.get(&input.id).await?)
    }

    async fn get_by_id(&self, id: &str) -> VitalityResult<Dataset> {
        Ok(self.get(id).await?)
    }

    async fn set_name(&self, id: &str, name: &str) -> VitalityResult<()> {
        if self.find(id).await?.is_none() {
            debug!(dataset_id = %id, "Rename of unknown dataset ignored");
            return Ok(());
        }

        self.db
            .query(
                "UPDATE type::record('dataset', $id) SET \
                 name = $name, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn set_description(&self, id: &str, language: &str, text: &str) -> VitalityResult<()> {
        let Some(dataset) = self.find(id).await? else {
            debug!(dataset_id = %id, "Description of unknown dataset ignored");
            return Ok(());
        };

        let mut descriptions: serde_json::Map<String, serde_json::Value> = dataset
            .descriptions
            .into_iter()
            .map(|(lang, text)| (lang, serde_json::Value::String(text)))
            .collect();
        descriptions.insert(language.to_string(), serde_json::Value::String(text.to_string()));

        self.db
            .query(
                "UPDATE type::record('dataset', $id) SET \
                 descriptions = $descriptions, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("descriptions", serde_json::Value::Object(descriptions)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> VitalityResult<()> {
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 LET $ds = type::record('dataset', $id); \
                 LET $templates = (SELECT VALUE id FROM template WHERE dataset_id = $id); \
                 LET $elements = (SELECT VALUE id FROM element WHERE dataset_id = $id); \
                 DELETE can_see WHERE in IN $templates OR out IN $elements; \
                 DELETE uses_template WHERE out IN $templates; \
                 DELETE has_template WHERE in = $ds; \
                 DELETE owns WHERE out = $ds; \
                 DELETE template WHERE dataset_id = $id; \
                 DELETE element WHERE dataset_id = $id; \
                 DELETE $ds; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(dataset_id = %id, "Dataset deleted");
        Ok(())
    }

    async fn list(&self) -> VitalityResult<Vec<Dataset>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM dataset ORDER BY created_at ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DatasetRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Dataset::from).collect())
    }
}
