//! First-encounter provisioning of datasets and their default templates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use vitality_core::catalog::MINIMUM_FIELDS;
use vitality_core::error::{VitalityError, VitalityResult};
use vitality_core::ids::{derived_id, new_element_id};
use vitality_core::models::dataset::CreateDataset;
use vitality_core::models::element::FieldMap;
use vitality_core::models::role::{ADMIN_ROLE_ID, PUBLIC_ROLE_ID};
use vitality_core::models::template::{CreateTemplate, FULL_TEMPLATE, MINIMAL_TEMPLATE};
use vitality_core::repository::{
    DatasetRepository, ElementRepository, MetaStore, RoleRepository, TemplateRepository,
};

use crate::config::AuthzConfig;

const DESCRIPTION_LANGUAGES: [&str; 2] = ["en", "fr"];

/// The attributes of a catalog record that provisioning needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub id: String,
    pub owner_org_id: String,
    pub name: Option<String>,
    pub descriptions: BTreeMap<String, String>,
}

impl DatasetRecord {
    /// Reads `id`, `owner_org`, `title` and the `notes` JSON blob of a
    /// catalog record.
    pub fn from_record(record: &Value) -> VitalityResult<Self> {
        let id = required_str(record, "id")?;
        let owner_org_id = required_str(record, "owner_org")?;
        let name = record
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);

        let descriptions = match record.get("notes") {
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => descriptions_from(&parsed),
                Err(_) => BTreeMap::new(),
            },
            Some(notes @ Value::Object(_)) => descriptions_from(notes),
            _ => BTreeMap::new(),
        };

        Ok(Self {
            id,
            owner_org_id,
            name,
            descriptions,
        })
    }
}

/// `en`/`fr` text entries of a translated value.
pub(crate) fn descriptions_from(value: &Value) -> BTreeMap<String, String> {
    DESCRIPTION_LANGUAGES
        .iter()
        .filter_map(|lang| {
            value
                .get(*lang)
                .and_then(Value::as_str)
                .map(|text| (lang.to_string(), text.to_string()))
        })
        .collect()
}

fn required_str(record: &Value, key: &str) -> VitalityResult<String> {
    match record.get(key).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(VitalityError::Validation {
            message: format!("record has no {key}"),
        }),
    }
}

/// Id of the `Full` template provisioned for `dataset_id`.
pub fn full_template_id(dataset_id: &str) -> String {
    derived_id("template:Full", dataset_id)
}

/// Id of the `Minimal` template provisioned for `dataset_id`.
pub fn minimal_template_id(dataset_id: &str) -> String {
    derived_id("template:Minimal", dataset_id)
}

/// Registers datasets with their `Full` and `Minimal` templates and keeps
/// template whitelists in sync with name lists posted by the catalog.
pub struct Provisioner<S: MetaStore> {
    store: Arc<S>,
    config: AuthzConfig,
}

impl<S: MetaStore> Provisioner<S> {
    pub fn new(store: Arc<S>, config: AuthzConfig) -> Self {
        Self { store, config }
    }

    /// Provisions the dataset on first encounter. Returns `false` when it
    /// was already fully provisioned.
    ///
    /// Safe to re-run: a run interrupted between creating `Full` and
    /// binding `public` is completed by the next call.
    pub async fn provision(&self, record: &DatasetRecord) -> VitalityResult<bool> {
        let dataset_id = record.id.as_str();
        let templates = self.store.templates();

        self.store
            .datasets()
            .create(CreateDataset {
                id: record.id.clone(),
                owner_org_id: record.owner_org_id.clone(),
                name: record.name.clone(),
            })
            .await?;

        let fields: FieldMap = self
            .config
            .dataset_fields
            .iter()
            .map(|name| (name.clone(), new_element_id()))
            .collect();
        let full = CreateTemplate {
            id: full_template_id(dataset_id),
            name: Some(FULL_TEMPLATE.into()),
            description: Some(self.config.full_template_description.clone()),
        };

        let created = templates.create_full(dataset_id, full.clone(), &fields).await?;
        if !created {
            let public_access = templates
                .template_access_for_role(dataset_id, PUBLIC_ROLE_ID)
                .await?;
            if public_access.is_some() {
                debug!(dataset_id, "Dataset already provisioned");
                return Ok(false);
            }
            warn!(dataset_id, "Resuming interrupted provisioning");
            let template = templates.create(dataset_id, full).await?;
            self.store
                .elements()
                .add_metadata_fields(dataset_id, &fields, &template.id)
                .await?;
        }

        let datasets = self.store.datasets();
        for (language, text) in &record.descriptions {
            datasets.set_description(dataset_id, language, text).await?;
        }

        let full_id = full_template_id(dataset_id);
        templates.set_template_access(ADMIN_ROLE_ID, &full_id).await?;
        let org_roles = self
            .store
            .roles()
            .list(Some(&record.owner_org_id))
            .await?;
        for role in &org_roles {
            templates.set_template_access(&role.id, &full_id).await?;
        }

        let minimal = templates
            .create(
                dataset_id,
                CreateTemplate {
                    id: minimal_template_id(dataset_id),
                    name: Some(MINIMAL_TEMPLATE.into()),
                    description: Some(self.config.minimal_template_description.clone()),
                },
            )
            .await?;
        let whitelist = with_minimum(self.config.public_fields.clone());
        self.set_visible_field_names(dataset_id, &minimal.id, &whitelist)
            .await?;
        // Bound last: its presence marks the dataset as fully provisioned.
        templates
            .set_template_access(PUBLIC_ROLE_ID, &minimal.id)
            .await?;

        info!(
            dataset_id,
            org_roles = org_roles.len(),
            "Dataset provisioned"
        );
        Ok(true)
    }

    /// Replaces the template's whitelist with the named fields of the
    /// dataset. Names the dataset does not know are ignored.
    pub async fn set_visible_field_names(
        &self,
        dataset_id: &str,
        template_id: &str,
        names: &[String],
    ) -> VitalityResult<()> {
        let known = self
            .store
            .elements()
            .get_metadata_fields(dataset_id)
            .await?;
        let ids: BTreeSet<String> = names
            .iter()
            .filter_map(|name| known.get(name).cloned())
            .collect();
        if ids.len() < names.len() {
            debug!(
                dataset_id,
                requested = names.len(),
                resolved = ids.len(),
                "Some field names are not registered"
            );
        }
        self.store
            .templates()
            .set_visible_fields(template_id, &ids)
            .await
    }

    /// Replaces what the public identity sees: the dataset's `Minimal`
    /// template is set to `names` plus the minimum fields and `public` is
    /// bound to it.
    pub async fn set_public_fields(
        &self,
        dataset_id: &str,
        names: Vec<String>,
    ) -> VitalityResult<()> {
        let templates = self.store.templates();
        let minimal = templates
            .list_by_dataset(dataset_id)
            .await?
            .into_iter()
            .find(|t| t.name.as_deref() == Some(MINIMAL_TEMPLATE));
        let Some(minimal) = minimal else {
            return Err(VitalityError::NotFound {
                entity: "template".into(),
                id: format!("{dataset_id}/{MINIMAL_TEMPLATE}"),
            });
        };

        let names = with_minimum(names);
        self.set_visible_field_names(dataset_id, &minimal.id, &names)
            .await?;
        templates
            .set_template_access(PUBLIC_ROLE_ID, &minimal.id)
            .await?;
        info!(dataset_id, fields = names.len(), "Public fields updated");
        Ok(())
    }
}

/// `names` with every minimum field added, without duplicates.
fn with_minimum(names: Vec<String>) -> Vec<String> {
    let mut merged: BTreeSet<String> = names.into_iter().collect();
    merged.extend(MINIMUM_FIELDS.iter().map(|f| f.to_string()));
    merged.into_iter().collect()
}
