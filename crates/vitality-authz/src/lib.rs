//! Vitality Authz: who sees which fields of a catalog record.
//!
//! Visibility is resolved along `user -> role -> template -> element` in
//! the graph store. [`CatalogHooks`] ties resolution, first-encounter
//! provisioning and the content filter to the host catalog's trigger
//! points.

pub mod config;
pub mod events;
pub mod hooks;
pub mod identity;
pub mod provision;
pub mod resolver;

pub use config::AuthzConfig;
pub use events::{OrganizationEvent, UserEvent};
pub use hooks::{CatalogHooks, PUBLIC_VISIBILITY_KEY};
pub use identity::Identity;
pub use provision::{DatasetRecord, Provisioner, full_template_id, minimal_template_id};
pub use resolver::VisibilityResolver;
