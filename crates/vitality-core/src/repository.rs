//! Registry trait definitions for the authorization graph.
//!
//! Creation is idempotent by id everywhere: a second `create` with a known
//! id returns the stored entity untouched. Mutations that reference an
//! absent entity are silent no-ops; only single-entity lookups report
//! [`VitalityError::NotFound`](crate::VitalityError::NotFound).

use std::collections::BTreeSet;

use crate::error::VitalityResult;
use crate::models::{
    dataset::{CreateDataset, Dataset},
    element::{Element, FieldMap},
    group::{CreateGroup, Group},
    organization::{CreateOrganization, Organization, UpdateOrganization},
    role::{CreateRole, Role},
    template::{CreateTemplate, Template},
    user::{CreateUser, UpdateUser, User},
};

// ---------------------------------------------------------------------------
// Identity & organization registry
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = VitalityResult<User>> + Send;
    fn get_by_id(&self, id: &str) -> impl Future<Output = VitalityResult<User>> + Send;
    fn get_by_username(&self, username: &str)
    -> impl Future<Output = VitalityResult<User>> + Send;
    fn update(
        &self,
        id: &str,
        input: UpdateUser,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    /// Removes the user and every relation touching it.
    fn delete(&self, id: &str) -> impl Future<Output = VitalityResult<()>> + Send;
    fn list(&self) -> impl Future<Output = VitalityResult<Vec<User>>> + Send;
}

pub trait OrganizationRepository: Send + Sync {
    /// Creates the organization, its `member` role and the member bindings.
    /// Members already holding `admin` are left alone.
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = VitalityResult<Organization>> + Send;
    fn get_by_id(&self, id: &str) -> impl Future<Output = VitalityResult<Organization>> + Send;
    fn update(
        &self,
        id: &str,
        input: UpdateOrganization,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    /// Removes the organization and its relations. Roles it managed are kept.
    fn delete(&self, id: &str) -> impl Future<Output = VitalityResult<()>> + Send;
    fn list(&self) -> impl Future<Output = VitalityResult<Vec<Organization>>> + Send;
    /// Grants `user_id` access to the organization's administration form.
    fn set_admin_form_access(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
}

pub trait GroupRepository: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = VitalityResult<Group>> + Send;
    fn list(&self) -> impl Future<Output = VitalityResult<Vec<Group>>> + Send;
    fn get_members(&self, id: &str) -> impl Future<Output = VitalityResult<Vec<User>>> + Send;
    fn delete(&self, id: &str) -> impl Future<Output = VitalityResult<()>> + Send;
}

pub trait RoleRepository: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = VitalityResult<Role>> + Send;
    fn get_by_id(&self, id: &str) -> impl Future<Output = VitalityResult<Role>> + Send;
    /// Roles managed by `organization_id`, or every role when `None`.
    fn list(
        &self,
        organization_id: Option<&str>,
    ) -> impl Future<Output = VitalityResult<Vec<Role>>> + Send;
    /// Binds the user to the role. A prior binding to another role of the
    /// same organization is replaced.
    fn set_user_role(
        &self,
        user_id: &str,
        role_id: &str,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    fn detach_user_role(
        &self,
        user_id: &str,
        role_id: &str,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    fn get_user_roles(&self, user_id: &str)
    -> impl Future<Output = VitalityResult<Vec<Role>>> + Send;
    /// Ids of every user holding the global `admin` role.
    fn get_admins(&self) -> impl Future<Output = VitalityResult<BTreeSet<String>>> + Send;
}

// ---------------------------------------------------------------------------
// Template & field registry
// ---------------------------------------------------------------------------

pub trait DatasetRepository: Send + Sync {
    /// Creates the dataset if unknown and (re)establishes the single
    /// ownership edge from `owner_org_id`.
    fn create(&self, input: CreateDataset) -> impl Future<Output = VitalityResult<Dataset>> + Send;
    fn get_by_id(&self, id: &str) -> impl Future<Output = VitalityResult<Dataset>> + Send;
    fn set_name(&self, id: &str, name: &str) -> impl Future<Output = VitalityResult<()>> + Send;
    fn set_description(
        &self,
        id: &str,
        language: &str,
        text: &str,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    /// Removes the dataset together with its templates and elements.
    fn delete(&self, id: &str) -> impl Future<Output = VitalityResult<()>> + Send;
    fn list(&self) -> impl Future<Output = VitalityResult<Vec<Dataset>>> + Send;
}

pub trait TemplateRepository: Send + Sync {
    /// Provisions a template exposing every entry of `fields`. Does nothing
    /// and returns `false` when the dataset already has templates.
    fn create_full(
        &self,
        dataset_id: &str,
        input: CreateTemplate,
        fields: &FieldMap,
    ) -> impl Future<Output = VitalityResult<bool>> + Send;
    /// Creates a template and binds it to `dataset_id`, detaching any prior
    /// dataset association.
    fn create(
        &self,
        dataset_id: &str,
        input: CreateTemplate,
    ) -> impl Future<Output = VitalityResult<Template>> + Send;
    fn list_by_dataset(
        &self,
        dataset_id: &str,
    ) -> impl Future<Output = VitalityResult<Vec<Template>>> + Send;
    /// Binds the role to the template, replacing the role's prior binding
    /// for the same dataset.
    fn set_template_access(
        &self,
        role_id: &str,
        template_id: &str,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    fn set_template_access_by_name(
        &self,
        dataset_id: &str,
        role_id: &str,
        template_name: &str,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    /// Binds the role to the `Full` template of every dataset.
    fn set_full_access_to_datasets(
        &self,
        role_id: &str,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    fn template_access_for_role(
        &self,
        dataset_id: &str,
        role_id: &str,
    ) -> impl Future<Output = VitalityResult<Option<String>>> + Send;
    fn template_access_for_user(
        &self,
        dataset_id: &str,
        user_id: &str,
    ) -> impl Future<Output = VitalityResult<Option<String>>> + Send;
    /// Replaces the template's whitelist. Ids that are not elements of the
    /// template's dataset are ignored.
    fn set_visible_fields(
        &self,
        template_id: &str,
        element_ids: &BTreeSet<String>,
    ) -> impl Future<Output = VitalityResult<()>> + Send;
    fn visible_fields_for_template(
        &self,
        template_id: &str,
    ) -> impl Future<Output = VitalityResult<FieldMap>> + Send;
    /// Element ids reachable from the user through
    /// `has_role -> uses_template -> can_see` within one dataset.
    fn visible_field_ids(
        &self,
        dataset_id: &str,
        user_id: &str,
    ) -> impl Future<Output = VitalityResult<BTreeSet<String>>> + Send;
}

pub trait ElementRepository: Send + Sync {
    /// Registers every `(name, id)` whose name is unknown for the dataset
    /// and attaches it to `template_id`. Returns the number added.
    fn add_metadata_fields(
        &self,
        dataset_id: &str,
        fields: &FieldMap,
        template_id: &str,
    ) -> impl Future<Output = VitalityResult<usize>> + Send;
    fn get_metadata_fields(
        &self,
        dataset_id: &str,
    ) -> impl Future<Output = VitalityResult<FieldMap>> + Send;
    fn get_elements(
        &self,
        dataset_id: &str,
    ) -> impl Future<Output = VitalityResult<Vec<Element>>> + Send;
}

/// Handle over every registry backed by one store.
pub trait MetaStore: Send + Sync {
    type Users: UserRepository;
    type Organizations: OrganizationRepository;
    type Groups: GroupRepository;
    type Roles: RoleRepository;
    type Datasets: DatasetRepository;
    type Templates: TemplateRepository;
    type Elements: ElementRepository;

    fn users(&self) -> &Self::Users;
    fn organizations(&self) -> &Self::Organizations;
    fn groups(&self) -> &Self::Groups;
    fn roles(&self) -> &Self::Roles;
    fn datasets(&self) -> &Self::Datasets;
    fn templates(&self) -> &Self::Templates;
    fn elements(&self) -> &Self::Elements;
}
