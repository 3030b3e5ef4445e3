//! Graph schema for the visibility model and its migration runner.
//!
//! Nodes are SCHEMAFULL tables keyed by the host catalog's ids. Edges are
//! relation tables with a unique `(in, out)` index so a binding can exist
//! at most once.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use vitality_core::models::role::{ADMIN_ROLE_ID, PUBLIC_ROLE_ID};
use vitality_core::models::user::PUBLIC_USER_ID;

use crate::error::DbError;
use crate::repository::{edge_exists, record_exists};

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "builtin_subjects",
        sql: SEED_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Identity & organization registry
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE option<string>;
DEFINE FIELD email ON TABLE user TYPE option<string>;
DEFINE FIELD gid ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username;

DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD name ON TABLE organization TYPE option<string>;
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();

DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD created_at ON TABLE group TYPE datetime DEFAULT time::now();

DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD name ON TABLE role TYPE option<string>;
DEFINE FIELD organization_id ON TABLE role TYPE option<string>;
DEFINE FIELD created_at ON TABLE role TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_role_organization ON TABLE role COLUMNS organization_id;

-- =======================================================================
-- Template & field registry
-- =======================================================================
DEFINE TABLE dataset SCHEMAFULL;
DEFINE FIELD name ON TABLE dataset TYPE option<string>;
DEFINE FIELD owner_org_id ON TABLE dataset TYPE option<string>;
DEFINE FIELD descriptions ON TABLE dataset TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE dataset TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE dataset TYPE datetime \
    DEFAULT time::now();

DEFINE TABLE template SCHEMAFULL;
DEFINE FIELD dataset_id ON TABLE template TYPE string;
DEFINE FIELD name ON TABLE template TYPE option<string>;
DEFINE FIELD description ON TABLE template TYPE option<string>;
DEFINE FIELD created_at ON TABLE template TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_template_dataset ON TABLE template COLUMNS dataset_id;

DEFINE TABLE element SCHEMAFULL;
DEFINE FIELD dataset_id ON TABLE element TYPE string;
DEFINE FIELD name ON TABLE element TYPE string;
DEFINE FIELD required ON TABLE element TYPE bool DEFAULT false;
DEFINE INDEX idx_element_dataset_name ON TABLE element \
    COLUMNS dataset_id, name UNIQUE;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- Organization -> Dataset ownership
DEFINE TABLE owns TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_owns_pair ON TABLE owns COLUMNS in, out UNIQUE;

-- Organization -> Role scope
DEFINE TABLE manages_role TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_manages_role_pair ON TABLE manages_role \
    COLUMNS in, out UNIQUE;

-- User -> Role binding
DEFINE TABLE has_role TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_has_role_pair ON TABLE has_role COLUMNS in, out UNIQUE;

-- Group -> User membership
DEFINE TABLE has_member TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_has_member_pair ON TABLE has_member \
    COLUMNS in, out UNIQUE;

-- User -> Organization administration form access
DEFINE TABLE serves TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_serves_pair ON TABLE serves COLUMNS in, out UNIQUE;

-- Dataset -> Template scope
DEFINE TABLE has_template TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_has_template_pair ON TABLE has_template \
    COLUMNS in, out UNIQUE;

-- Role -> Template binding
DEFINE TABLE uses_template TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_uses_template_pair ON TABLE uses_template \
    COLUMNS in, out UNIQUE;

-- Template -> Element whitelist
DEFINE TABLE can_see TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_can_see_pair ON TABLE can_see COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Seed v2: process-wide roles and the public identity
// -----------------------------------------------------------------------

const SEED_V2: &str = "\
CREATE role:admin SET name = 'admin';
CREATE role:public SET name = 'public';
CREATE user:public SET username = 'public';
RELATE user:public -> has_role -> role:public;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Applies every migration newer than the last one recorded in
/// `_migration`, then checks that the built-in subjects are in place.
/// Re-running on an up-to-date store changes nothing.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let applied = applied_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        debug!(version = applied, "Graph schema up to date");
    }
    for migration in pending {
        apply(db, migration).await?;
    }

    verify_builtin_subjects(db).await
}

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map_or(0, |m| m.version))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    db.query(migration.sql).await?.check().map_err(|e| {
        DbError::Migration(format!(
            "graph migration v{} ({}) failed: {e}",
            migration.version, migration.name
        ))
    })?;

    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!(
                "graph migration v{} applied but not recorded: {e}",
                migration.version
            ))
        })?;

    info!(
        version = migration.version,
        name = migration.name,
        "Graph migration applied"
    );
    Ok(())
}

/// Subjects every visibility lookup can fall back on.
const BUILTIN_SUBJECTS: [(&str, &str); 3] = [
    ("role", ADMIN_ROLE_ID),
    ("role", PUBLIC_ROLE_ID),
    ("user", PUBLIC_USER_ID),
];

/// Fails when a seeded subject, or the `public` user's binding to the
/// `public` role, has been removed from the store.
async fn verify_builtin_subjects<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    for (table, id) in BUILTIN_SUBJECTS {
        if !record_exists(db, table, id).await? {
            return Err(DbError::Migration(format!(
                "built-in {table} '{id}' is missing"
            )));
        }
    }
    let public_bound = edge_exists(
        db,
        "has_role",
        ("user", PUBLIC_USER_ID),
        ("role", PUBLIC_ROLE_ID),
    )
    .await?;
    if !public_bound {
        return Err(DbError::Migration(
            "public user is not bound to the public role".into(),
        ));
    }
    debug!("Built-in subjects present");
    Ok(())
}

/// DDL of the graph schema (migration 1).
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

/// Highest migration version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_edge_is_unique_per_pair() {
        for edge in [
            "owns",
            "manages_role",
            "has_role",
            "has_member",
            "serves",
            "has_template",
            "uses_template",
            "can_see",
        ] {
            assert!(SCHEMA_V1.contains(&format!("DEFINE TABLE {edge} TYPE RELATION")));
            assert!(SCHEMA_V1.contains(&format!("ON TABLE {edge} COLUMNS in, out UNIQUE")));
        }
    }
}
