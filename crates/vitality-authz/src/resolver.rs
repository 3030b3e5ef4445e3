//! Visibility resolution: `user -> role -> template -> elements`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use vitality_core::error::VitalityResult;
use vitality_core::models::template::FULL_TEMPLATE;
use vitality_core::models::user::PUBLIC_USER_ID;
use vitality_core::repository::{ElementRepository, MetaStore, TemplateRepository};

use crate::identity::Identity;

/// Computes which field ids an identity may see in a dataset.
///
/// Generic over the store so that resolution has no dependency on the
/// database crate.
pub struct VisibilityResolver<S: MetaStore> {
    store: Arc<S>,
}

impl<S: MetaStore> Clone for VisibilityResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: MetaStore> VisibilityResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Element ids visible to `identity`. A user with no binding for this
    /// dataset sees what the public identity sees.
    pub async fn resolve_visible_fields(
        &self,
        dataset_id: &str,
        identity: &Identity,
    ) -> VitalityResult<BTreeSet<String>> {
        let visible = self
            .store
            .templates()
            .visible_field_ids(dataset_id, identity.subject_id())
            .await?;
        if !visible.is_empty() || identity.is_public() {
            return Ok(visible);
        }

        debug!(
            dataset_id,
            user_id = identity.subject_id(),
            "No template bound for user, using public visibility"
        );
        self.store
            .templates()
            .visible_field_ids(dataset_id, PUBLIC_USER_ID)
            .await
    }

    /// Name of the template `identity` sees the dataset through, with the
    /// same public fallback as [`Self::resolve_visible_fields`].
    pub async fn template_access(
        &self,
        dataset_id: &str,
        identity: &Identity,
    ) -> VitalityResult<Option<String>> {
        let templates = self.store.templates();
        let access = templates
            .template_access_for_user(dataset_id, identity.subject_id())
            .await?;
        match access {
            Some(name) => Ok(Some(name)),
            None if identity.is_public() => Ok(None),
            None => {
                templates
                    .template_access_for_user(dataset_id, PUBLIC_USER_ID)
                    .await
            }
        }
    }

    /// Whether the public identity sees the dataset unrestricted.
    pub async fn is_unrestricted(&self, dataset_id: &str) -> VitalityResult<bool> {
        self.is_unrestricted_for_user(dataset_id, &Identity::Public)
            .await
    }

    pub async fn is_unrestricted_for_user(
        &self,
        dataset_id: &str,
        identity: &Identity,
    ) -> VitalityResult<bool> {
        let access = self.template_access(dataset_id, identity).await?;
        Ok(access.as_deref() == Some(FULL_TEMPLATE))
    }

    /// Names of the fields the public identity may see, sorted.
    pub async fn get_public_fields(&self, dataset_id: &str) -> VitalityResult<Vec<String>> {
        let visible = self
            .resolve_visible_fields(dataset_id, &Identity::Public)
            .await?;
        let known = self.store.elements().get_metadata_fields(dataset_id).await?;
        Ok(known
            .into_iter()
            .filter(|(_, id)| visible.contains(id))
            .map(|(name, _)| name)
            .collect())
    }
}
