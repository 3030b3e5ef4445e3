//! Entry points the host catalog calls at its trigger points.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use vitality_core::error::{VitalityError, VitalityResult};
use vitality_core::models::element::FieldMap;
use vitality_core::models::organization::{CreateOrganization, UpdateOrganization};
use vitality_core::models::role::{ADMIN_ROLE_ID, MEMBER_ROLE_NAME, PUBLIC_ROLE_ID, Role};
use vitality_core::models::template::FULL_TEMPLATE;
use vitality_core::models::user::{CreateUser, UpdateUser};
use vitality_core::repository::{
    DatasetRepository, ElementRepository, MetaStore, OrganizationRepository, RoleRepository,
    TemplateRepository, UserRepository,
};
use vitality_filter::{ContentFilter, try_parse_json};

use crate::config::AuthzConfig;
use crate::events::{OrganizationEvent, UserEvent};
use crate::identity::Identity;
use crate::provision::{DatasetRecord, Provisioner, descriptions_from};
use crate::resolver::VisibilityResolver;

/// Key under which the names of the publicly visible fields travel.
pub const PUBLIC_VISIBILITY_KEY: &str = "public-visibility";

const DATASET_TYPE: &str = "dataset";

/// Catalog integration over one store.
///
/// Read paths (`after_show`, `after_search`) never fail: any error yields
/// the restrictive record instead of the unfiltered one.
pub struct CatalogHooks<S: MetaStore> {
    store: Arc<S>,
    resolver: VisibilityResolver<S>,
    provisioner: Provisioner<S>,
    filter: ContentFilter,
}

impl<S: MetaStore> CatalogHooks<S> {
    pub fn new(store: Arc<S>, config: AuthzConfig) -> Self {
        let filter = ContentFilter::new(config.filter.clone());
        Self {
            resolver: VisibilityResolver::new(Arc::clone(&store)),
            provisioner: Provisioner::new(Arc::clone(&store), config),
            store,
            filter,
        }
    }

    pub fn resolver(&self) -> &VisibilityResolver<S> {
        &self.resolver
    }

    pub fn provisioner(&self) -> &Provisioner<S> {
        &self.provisioner
    }

    // -----------------------------------------------------------------------
    // Dataset records
    // -----------------------------------------------------------------------

    /// Provisions a dataset about to be indexed. Returns whether anything
    /// was provisioned.
    pub async fn before_index(&self, record: &Value) -> VitalityResult<bool> {
        if record_type(record) != Some(DATASET_TYPE) {
            return Ok(false);
        }
        let dataset = DatasetRecord::from_record(record)?;
        self.provisioner.provision(&dataset).await
    }

    /// Redacts a record about to be shown to `identity`.
    pub async fn after_show(&self, record: Value, identity: &Identity) -> Value {
        if is_other_type(&record) {
            return record;
        }
        match self.show(&record, identity).await {
            Ok(shown) => shown,
            Err(e) => {
                warn!(error = %e, "Failed to filter record, showing restricted view");
                let mut restricted = Map::new();
                restricted.insert(PUBLIC_VISIBILITY_KEY.into(), json!([]));
                fill_show_placeholders(&mut restricted);
                Value::Object(restricted)
            }
        }
    }

    /// Redacts every search result for `identity` and marks it as filtered.
    pub async fn after_search(&self, results: Vec<Value>, identity: &Identity) -> Vec<Value> {
        let mut filtered = Vec::with_capacity(results.len());
        for result in results {
            if is_other_type(&result) {
                filtered.push(result);
                continue;
            }
            let mut map = match self.search_result(&result, identity).await {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "Failed to filter search result, using restricted view");
                    let mut restricted = Map::new();
                    restricted.insert(PUBLIC_VISIBILITY_KEY.into(), json!([]));
                    restricted
                }
            };
            fill_search_placeholders(&mut map);
            filtered.push(Value::Object(map));
        }
        filtered
    }

    /// Applies a posted `public-visibility` field list, if the record
    /// carries one.
    pub async fn after_update(&self, record: &Value) -> VitalityResult<()> {
        let names = match record.get(PUBLIC_VISIBILITY_KEY) {
            None | Some(Value::Null) => return Ok(()),
            Some(raw) => field_names(raw)?,
        };
        let dataset_id = record_id(record)?;
        self.provisioner.set_public_fields(dataset_id, names).await
    }

    /// Syncs the dataset name and descriptions after a catalog update.
    pub async fn on_dataset_updated(&self, record: &Value) -> VitalityResult<()> {
        if is_other_type(record) {
            return Ok(());
        }
        let dataset_id = record_id(record)?;
        let datasets = self.store.datasets();

        let name = translated(record, "title_translated")
            .and_then(|t| t.get("en").and_then(Value::as_str).map(str::to_string))
            .or_else(|| record.get("title").and_then(Value::as_str).map(str::to_string));
        if let Some(name) = name {
            datasets.set_name(dataset_id, &name).await?;
        }

        if let Some(notes) = translated(record, "notes_translated") {
            for (language, text) in descriptions_from(&notes) {
                datasets.set_description(dataset_id, &language, &text).await?;
            }
        }
        debug!(dataset_id, "Dataset attributes synced");
        Ok(())
    }

    pub async fn on_dataset_deleted(&self, dataset_id: &str) -> VitalityResult<()> {
        self.store.datasets().delete(dataset_id).await
    }

    async fn show(&self, record: &Value, identity: &Identity) -> VitalityResult<Value> {
        let dataset_id = record_id(record)?;
        self.ensure_provisioned(dataset_id, record).await?;

        let elements = self.store.elements();
        let mut known = elements.get_metadata_fields(dataset_id).await?;
        let missing = self.filter.keys_match(record, &known)?;
        if !missing.is_empty() {
            self.heal_drift(dataset_id, &missing).await?;
            known = elements.get_metadata_fields(dataset_id).await?;
        }

        let visible = self
            .resolver
            .resolve_visible_fields(dataset_id, identity)
            .await?;
        let mut shown = into_map(self.filter.filter(record, &known, &visible)?);
        let public = self.resolver.get_public_fields(dataset_id).await?;
        shown.insert(PUBLIC_VISIBILITY_KEY.into(), json!(public));
        fill_show_placeholders(&mut shown);
        Ok(Value::Object(shown))
    }

    async fn search_result(
        &self,
        record: &Value,
        identity: &Identity,
    ) -> VitalityResult<Map<String, Value>> {
        let dataset_id = record_id(record)?;
        self.ensure_provisioned(dataset_id, record).await?;

        let known = self
            .store
            .elements()
            .get_metadata_fields(dataset_id)
            .await?;
        let visible = self
            .resolver
            .resolve_visible_fields(dataset_id, identity)
            .await?;
        let mut result = into_map(self.filter.filter(record, &known, &visible)?);
        let public = self.resolver.get_public_fields(dataset_id).await?;
        result.insert(PUBLIC_VISIBILITY_KEY.into(), json!(public));
        Ok(result)
    }

    /// Provisions a dataset whose `public` binding is missing: never seen
    /// before, or a previous provisioning was interrupted.
    async fn ensure_provisioned(&self, dataset_id: &str, record: &Value) -> VitalityResult<()> {
        let access = self
            .store
            .templates()
            .template_access_for_role(dataset_id, PUBLIC_ROLE_ID)
            .await?;
        if access.is_none() {
            info!(dataset_id, "Provisioning dataset on first read");
            self.provisioner
                .provision(&DatasetRecord::from_record(record)?)
                .await?;
        }
        Ok(())
    }

    /// Registers unknown fields in the dataset's `Full` template and
    /// returns how many were new.
    async fn heal_drift(&self, dataset_id: &str, missing: &FieldMap) -> VitalityResult<usize> {
        let full = self
            .store
            .templates()
            .list_by_dataset(dataset_id)
            .await?
            .into_iter()
            .find(|t| t.is_full())
            .ok_or_else(|| VitalityError::NotFound {
                entity: "template".into(),
                id: format!("{dataset_id}/{FULL_TEMPLATE}"),
            })?;
        let added = self
            .store
            .elements()
            .add_metadata_fields(dataset_id, missing, &full.id)
            .await?;
        if added == 0 {
            debug!(
                dataset_id,
                detected = missing.len(),
                "Unknown record fields already registered"
            );
        } else {
            warn!(
                dataset_id,
                detected = missing.len(),
                added,
                "Registered unknown record fields"
            );
        }
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub async fn on_user_created(&self, event: UserEvent) -> VitalityResult<()> {
        let user = self
            .store
            .users()
            .create(CreateUser {
                id: event.id,
                username: event.username,
                email: event.email,
            })
            .await?;
        if event.sysadmin {
            self.store
                .roles()
                .set_user_role(&user.id, ADMIN_ROLE_ID)
                .await?;
            info!(user_id = %user.id, "Sysadmin bound to admin role");
        }
        Ok(())
    }

    pub async fn on_user_updated(&self, event: UserEvent) -> VitalityResult<()> {
        self.store
            .users()
            .update(
                &event.id,
                UpdateUser {
                    username: event.username,
                    email: event.email,
                    gid: None,
                },
            )
            .await
    }

    pub async fn on_user_deleted(&self, user_id: &str) -> VitalityResult<()> {
        self.store.users().delete(user_id).await
    }

    // -----------------------------------------------------------------------
    // Organizations & membership
    // -----------------------------------------------------------------------

    /// Registers the organization with its members and gives every admin
    /// access to its administration form. Unknown usernames are skipped.
    pub async fn on_organization_created(&self, event: OrganizationEvent) -> VitalityResult<()> {
        let users = self.store.users();
        let mut member_ids = Vec::with_capacity(event.member_usernames.len());
        for username in &event.member_usernames {
            match users.get_by_username(username).await {
                Ok(user) => member_ids.push(user.id),
                Err(VitalityError::NotFound { .. }) => {
                    debug!(username = %username, "Skipping unknown organization member");
                }
                Err(e) => return Err(e),
            }
        }

        let organizations = self.store.organizations();
        let organization = organizations
            .create(CreateOrganization {
                id: event.id,
                name: event.name,
                member_ids,
            })
            .await?;
        for admin_id in self.store.roles().get_admins().await? {
            organizations
                .set_admin_form_access(&admin_id, &organization.id)
                .await?;
        }
        Ok(())
    }

    pub async fn on_organization_updated(
        &self,
        organization_id: &str,
        name: &str,
    ) -> VitalityResult<()> {
        self.store
            .organizations()
            .update(
                organization_id,
                UpdateOrganization {
                    name: Some(name.to_string()),
                },
            )
            .await
    }

    pub async fn on_organization_deleted(&self, organization_id: &str) -> VitalityResult<()> {
        self.store.organizations().delete(organization_id).await
    }

    /// Binds the user to the organization's `member` role.
    pub async fn on_member_added(&self, organization_id: &str, username: &str) -> VitalityResult<()> {
        let user = match self.store.users().get_by_username(username).await {
            Ok(user) => user,
            Err(VitalityError::NotFound { .. }) => {
                debug!(organization_id, username, "Member is not a known user");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let Some(role) = self.member_role(organization_id).await? else {
            debug!(organization_id, "Organization has no member role");
            return Ok(());
        };
        self.store.roles().set_user_role(&user.id, &role.id).await
    }

    pub async fn on_member_removed(&self, organization_id: &str, user_id: &str) -> VitalityResult<()> {
        let Some(role) = self.member_role(organization_id).await? else {
            return Ok(());
        };
        self.store.roles().detach_user_role(user_id, &role.id).await
    }

    async fn member_role(&self, organization_id: &str) -> VitalityResult<Option<Role>> {
        Ok(self
            .store
            .roles()
            .list(Some(organization_id))
            .await?
            .into_iter()
            .find(|role| role.name.as_deref() == Some(MEMBER_ROLE_NAME)))
    }
}

fn record_type(record: &Value) -> Option<&str> {
    record.get("type").and_then(Value::as_str)
}

/// Records typed as something other than a dataset pass through untouched.
/// Untyped records are treated as datasets.
fn is_other_type(record: &Value) -> bool {
    record_type(record).is_some_and(|t| t != DATASET_TYPE)
}

fn record_id(record: &Value) -> VitalityResult<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| VitalityError::Validation {
            message: "record has no id".into(),
        })
}

/// A translated value, either inline or JSON-encoded.
fn translated(record: &Value, key: &str) -> Option<Value> {
    match record.get(key)? {
        Value::String(raw) => try_parse_json(raw),
        other @ Value::Object(_) => Some(other.clone()),
        _ => None,
    }
}

/// Parses a posted field list: a JSON array of names, inline or encoded.
fn field_names(raw: &Value) -> VitalityResult<Vec<String>> {
    let invalid = |message: String| VitalityError::Validation { message };
    let parsed = match raw {
        Value::String(text) => serde_json::from_str::<Value>(text)
            .map_err(|e| invalid(format!("{PUBLIC_VISIBILITY_KEY} is not JSON: {e}")))?,
        other => other.clone(),
    };
    serde_json::from_value(parsed)
        .map_err(|e| invalid(format!("{PUBLIC_VISIBILITY_KEY} is not a list of names: {e}")))
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Keys the catalog templates dereference unconditionally.
fn fill_show_placeholders(map: &mut Map<String, Value>) {
    map.entry("resources").or_insert_with(|| json!([]));
    for key in [
        "xml_location_url",
        "relationships_as_object",
        "relationships_as_subject",
    ] {
        map.entry(key).or_insert_with(|| json!(""));
    }
}

fn fill_search_placeholders(map: &mut Map<String, Value>) {
    let marker = json!({"format": "VITALITY"});
    match map.get_mut("resources") {
        Some(Value::Array(resources)) => resources.push(marker),
        _ => {
            map.insert("resources".into(), json!([marker]));
        }
    }
    if map.get("notes_translated").is_none_or(is_blank) {
        map.insert("notes_translated".into(), json!({"fr": "-", "en": "-"}));
    }
    if map.get("xml_location_url").is_none_or(is_blank) {
        map.insert("xml_location_url".into(), json!("-"));
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}
