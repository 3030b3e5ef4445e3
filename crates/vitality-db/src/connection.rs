//! SurrealDB connection management.

use std::collections::HashMap;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;

pub const ENV_CONFIG_PATH: &str = "VITALITY_CONFIG_PATH";
pub const ENV_GRAPH_HOST: &str = "VITALITY_GRAPH_HOST";
pub const ENV_GRAPH_USER: &str = "VITALITY_GRAPH_USER";
pub const ENV_GRAPH_PASSWORD: &str = "VITALITY_GRAPH_PASSWORD";
pub const ENV_GRAPH_NAMESPACE: &str = "VITALITY_GRAPH_NAMESPACE";
pub const ENV_GRAPH_DATABASE: &str = "VITALITY_GRAPH_DATABASE";

/// Configuration for connecting to the graph store.
#[derive(Clone)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "vitality".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Reads the optional `KEY=VALUE` file named by `VITALITY_CONFIG_PATH`,
    /// then overlays the process environment.
    pub fn from_env() -> Result<Self, DbError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                merged.extend(parse_env_file(config_path)?);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    /// Builds a config from already-collected key/value pairs. Missing or
    /// blank keys fall back to [`DbConfig::default`].
    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, DbError> {
        let defaults = Self::default();
        let pick = |key: &str, default: String| {
            kv.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or(default)
        };

        let url = pick(ENV_GRAPH_HOST, defaults.url);
        // The websocket engine wants a bare host:port.
        let url = url
            .strip_prefix("ws://")
            .or_else(|| url.strip_prefix("wss://"))
            .unwrap_or(&url)
            .trim_end_matches('/')
            .to_string();
        if url.is_empty() {
            return Err(DbError::Config(format!("{ENV_GRAPH_HOST} is empty")));
        }

        Ok(Self {
            url,
            namespace: pick(ENV_GRAPH_NAMESPACE, defaults.namespace),
            database: pick(ENV_GRAPH_DATABASE, defaults.database),
            username: pick(ENV_GRAPH_USER, defaults.username),
            password: pick(ENV_GRAPH_PASSWORD, defaults.password),
        })
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, DbError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| DbError::Config(format!("failed to read config file at {path}: {e}")))?;

    let mut kv = HashMap::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            DbError::Config(format!(
                "invalid config line {} (expected KEY=VALUE)",
                idx + 1
            ))
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(DbError::Config(format!(
                "invalid config line {} (empty key)",
                idx + 1
            )));
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Authenticates as root, selects the configured namespace and
    /// database, and returns a ready-to-use manager.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to graph store"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Connected to graph store");

        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
