//! Vitality bootstrap: prepares a graph store for the catalog hooks.
//!
//! Connects with the `VITALITY_GRAPH_*` settings, applies pending schema
//! migrations (which also seed the `admin` and `public` subjects) and
//! reports what the store holds.

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use vitality_core::VitalityResult;
use vitality_core::repository::{
    DatasetRepository, MetaStore, OrganizationRepository, UserRepository,
};
use vitality_db::{DbConfig, DbError, DbManager, SurrealMetaStore, latest_version, run_migrations};

#[tokio::main]
async fn main() -> ExitCode {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vitality=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting Vitality bootstrap...");

    let manager = match connect().await {
        Ok(manager) => manager,
        Err(e) => {
            error!(error = %e, "Failed to prepare graph store");
            return ExitCode::FAILURE;
        }
    };

    let store = SurrealMetaStore::new(manager.client().clone());
    if let Err(e) = report(&store).await {
        error!(error = %e, "Failed to read graph store contents");
        return ExitCode::FAILURE;
    }

    info!("Vitality bootstrap finished.");
    ExitCode::SUCCESS
}

async fn connect() -> Result<DbManager, DbError> {
    let config = DbConfig::from_env()?;
    let manager = DbManager::connect(&config).await?;
    run_migrations(manager.client()).await?;
    info!(schema_version = latest_version(), "Schema up to date");
    Ok(manager)
}

async fn report<S: MetaStore>(store: &S) -> VitalityResult<()> {
    let users = store.users().list().await?;
    let organizations = store.organizations().list().await?;
    let datasets = store.datasets().list().await?;
    info!(
        users = users.len(),
        organizations = organizations.len(),
        datasets = datasets.len(),
        "Graph store ready"
    );
    Ok(())
}
