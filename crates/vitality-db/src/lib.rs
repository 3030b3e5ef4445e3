//! Vitality Database: SurrealDB graph store adapter.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - SurrealDB implementations of every `vitality-core` registry trait,
//!   bundled as [`SurrealMetaStore`]

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{
    DbConfig, DbManager, ENV_CONFIG_PATH, ENV_GRAPH_DATABASE, ENV_GRAPH_HOST,
    ENV_GRAPH_NAMESPACE, ENV_GRAPH_PASSWORD, ENV_GRAPH_USER,
};
pub use error::DbError;
pub use repository::SurrealMetaStore;
pub use schema::{latest_version, run_migrations, schema_v1};
