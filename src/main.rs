use anyhow::Result;
use axum::Router;
use lfs_depot::{
    config::{AppConfig, MappingBackend},
    routes,
    services::{
        mapping_store::{JsonMappingStore, MappingStore, SqliteMappingStore},
        object_store::{DiskObjectStore, ObjectStore},
        path_resolver::{NoHints, PathHintSource, WorkingTreeHints},
        AppState, ServerSettings,
    },
};
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const MIGRATION_SQL: &str = include_str!("../migrations/0001_init.sql");

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting lfs-depot with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.data_dir).exists() {
        fs::create_dir_all(&cfg.data_dir)?;
        tracing::info!("Created storage directory at {}", cfg.data_dir);
    }

    // --- Build the mapping store ---
    let mapping: Arc<dyn MappingStore> = match cfg.mapping_backend {
        MappingBackend::Sqlite => {
            let db_url = &cfg.database_url;
            tracing::debug!("Connecting using raw URL => {}", db_url);

            // Extract the local file path SQLx will use
            let db_path = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("file:");
            tracing::debug!("Interpreted SQLite path => {}", db_path);

            // Create parent directory if needed
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.exists() {
                    fs::create_dir_all(parent)?;
                    tracing::info!("Created missing directory {:?}", parent);
                }
            }

            // SQLx won't create the database file on its own
            if let Err(e) = fs::OpenOptions::new().create(true).write(true).open(db_path) {
                tracing::warn!("Failed to pre-create database file: {}", e);
            }

            let db = Arc::new(
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect(db_url)
                    .await?,
            );

            // Schema is idempotent; applied at every startup.
            run_migrations(&db).await?;
            if migrate {
                tracing::info!("Database migration complete.");
                return Ok(()); // exit after migration
            }

            Arc::new(SqliteMappingStore::new(db))
        }
        MappingBackend::Json => {
            if migrate {
                tracing::info!("JSON mapping backend needs no migration.");
                return Ok(());
            }
            Arc::new(JsonMappingStore::new(&cfg.json_mapping_path))
        }
    };

    // --- Initialize core services ---
    let store: Arc<dyn ObjectStore> =
        Arc::new(DiskObjectStore::new(&cfg.data_dir, &cfg.bucket));
    let hints: Arc<dyn PathHintSource> = match &cfg.hints_dir {
        Some(dir) => {
            tracing::info!("Scanning {} for path hints", dir);
            Arc::new(WorkingTreeHints::new(dir))
        }
        None => Arc::new(NoHints),
    };
    let state = AppState::new(
        mapping,
        store,
        hints,
        ServerSettings {
            public_url: cfg.public_url.clone(),
            action_ttl_secs: cfg.action_ttl_secs,
            backend_timeout: Duration::from_secs(cfg.backend_timeout_secs),
            bucket: cfg.bucket.clone(),
            storage_dir: cfg.data_dir.clone(),
            mapping_backend_name: cfg.mapping_backend.name(),
        },
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run SQLite migrations from the embedded SQL file.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>) -> Result<()> {
    let statements = MIGRATION_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::debug!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(&**db).await?;
    }

    Ok(())
}
