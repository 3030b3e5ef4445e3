//! SurrealDB repository implementations.

mod dataset;
mod element;
mod group;
mod organization;
mod role;
mod template;
mod user;

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use vitality_core::repository::MetaStore;

use crate::error::DbError;

pub use dataset::SurrealDatasetRepository;
pub use element::SurrealElementRepository;
pub use group::SurrealGroupRepository;
pub use organization::SurrealOrganizationRepository;
pub use role::SurrealRoleRepository;
pub use template::SurrealTemplateRepository;
pub use user::SurrealUserRepository;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Returns whether `table:id` exists.
pub(crate) async fn record_exists<C: Connection>(
    db: &Surreal<C>,
    table: &'static str,
    id: &str,
) -> Result<bool, DbError> {
    let mut result = db
        .query("SELECT count() AS total FROM type::record($table, $id) GROUP ALL")
        .bind(("table", table))
        .bind(("id", id.to_string()))
        .await?;
    let rows: Vec<CountRow> = result.take(0)?;
    Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
}

/// Returns whether an `edge` relation from `from_table:from_id` to
/// `to_table:to_id` exists.
pub(crate) async fn edge_exists<C: Connection>(
    db: &Surreal<C>,
    edge: &'static str,
    from: (&'static str, &str),
    to: (&'static str, &str),
) -> Result<bool, DbError> {
    let mut result = db
        .query(format!(
            "SELECT count() AS total FROM {edge} \
             WHERE in = type::record($from_table, $from_id) \
             AND out = type::record($to_table, $to_id) GROUP ALL"
        ))
        .bind(("from_table", from.0))
        .bind(("from_id", from.1.to_string()))
        .bind(("to_table", to.0))
        .bind(("to_id", to.1.to_string()))
        .await?;
    let rows: Vec<CountRow> = result.take(0)?;
    Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
}

/// Creates a single edge. A concurrent writer that got there first is
/// not an error.
async fn relate<C: Connection>(
    db: &Surreal<C>,
    edge: &'static str,
    from: (&'static str, &str),
    to: (&'static str, &str),
) -> Result<(), DbError> {
    let result = db
        .query(format!(
            "LET $from = type::record($from_table, $from_id); \
             LET $to = type::record($to_table, $to_id); \
             RELATE $from -> {edge} -> $to;"
        ))
        .bind(("from_table", from.0))
        .bind(("from_id", from.1.to_string()))
        .bind(("to_table", to.0))
        .bind(("to_id", to.1.to_string()))
        .await?;

    if let Err(e) = result.check() {
        if edge_exists(db, edge, from, to).await? {
            return Ok(());
        }
        return Err(DbError::Query(e.to_string()));
    }
    Ok(())
}

/// Every registry over one SurrealDB handle.
#[derive(Clone)]
pub struct SurrealMetaStore<C: Connection> {
    users: SurrealUserRepository<C>,
    organizations: SurrealOrganizationRepository<C>,
    groups: SurrealGroupRepository<C>,
    roles: SurrealRoleRepository<C>,
    datasets: SurrealDatasetRepository<C>,
    templates: SurrealTemplateRepository<C>,
    elements: SurrealElementRepository<C>,
}

impl<C: Connection> SurrealMetaStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            users: SurrealUserRepository::new(db.clone()),
            organizations: SurrealOrganizationRepository::new(db.clone()),
            groups: SurrealGroupRepository::new(db.clone()),
            roles: SurrealRoleRepository::new(db.clone()),
            datasets: SurrealDatasetRepository::new(db.clone()),
            templates: SurrealTemplateRepository::new(db.clone()),
            elements: SurrealElementRepository::new(db),
        }
    }
}

impl<C: Connection> MetaStore for SurrealMetaStore<C> {
    type Users = SurrealUserRepository<C>;
    type Organizations = SurrealOrganizationRepository<C>;
    type Groups = SurrealGroupRepository<C>;
    type Roles = SurrealRoleRepository<C>;
    type Datasets = SurrealDatasetRepository<C>;
    type Templates = SurrealTemplateRepository<C>;
    type Elements = SurrealElementRepository<C>;

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn organizations(&self) -> &Self::Organizations {
        &self.organizations
    }

    fn groups(&self) -> &Self::Groups {
        &self.groups
    }

    fn roles(&self) -> &Self::Roles {
        &self.roles
    }

    fn datasets(&self) -> &Self::Datasets {
        &self.datasets
    }

    fn templates(&self) -> &Self::Templates {
        &self.templates
    }

    fn elements(&self) -> &Self::Elements {
        &self.elements
    }
}
