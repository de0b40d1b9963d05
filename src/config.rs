use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::env;

/// Which implementation backs the OID mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MappingBackend {
    /// Durable SQLite table (default).
    Sqlite,
    /// Single JSON file, for development setups.
    Json,
}

impl MappingBackend {
    pub fn name(self) -> &'static str {
        match self {
            MappingBackend::Sqlite => "sqlite",
            MappingBackend::Json => "json",
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: String,
    pub bucket: String,
    pub mapping_backend: MappingBackend,
    pub database_url: String,
    pub json_mapping_path: String,
    pub hints_dir: Option<String>,
    pub public_url: String,
    pub action_ttl_secs: u64,
    pub backend_timeout_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Git LFS server with human-readable storage paths")]
pub struct Args {
    /// Host to bind to (overrides LFS_DEPOT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides LFS_DEPOT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where object payloads are stored (overrides LFS_DEPOT_DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Bucket name payloads are stored under (overrides LFS_DEPOT_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Mapping table backend (overrides LFS_DEPOT_MAPPING_BACKEND)
    #[arg(long, value_enum)]
    pub mapping_backend: Option<MappingBackend>,

    /// SQLite database URL (overrides LFS_DEPOT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// JSON mapping file path (overrides LFS_DEPOT_JSON_MAPPING_PATH)
    #[arg(long)]
    pub json_mapping_path: Option<String>,

    /// Working tree scanned for OID → path hints (overrides LFS_DEPOT_HINTS_DIR)
    #[arg(long)]
    pub hints_dir: Option<String>,

    /// Public base URL advertised in batch hrefs (overrides LFS_DEPOT_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Advertised lifetime of batch actions in seconds (overrides LFS_DEPOT_ACTION_TTL_SECS)
    #[arg(long)]
    pub action_ttl_secs: Option<u64>,

    /// Timeout for object-store calls in seconds (overrides LFS_DEPOT_BACKEND_TIMEOUT_SECS)
    #[arg(long)]
    pub backend_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("LFS_DEPOT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("LFS_DEPOT_PORT", 8123)?;
        let env_data_dir =
            env::var("LFS_DEPOT_DATA_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_bucket = env::var("LFS_DEPOT_BUCKET").unwrap_or_else(|_| "lfs".into());
        let env_backend = match env::var("LFS_DEPOT_MAPPING_BACKEND") {
            Ok(value) => MappingBackend::from_str(&value, true)
                .map_err(|e| anyhow::anyhow!("parsing LFS_DEPOT_MAPPING_BACKEND: {}", e))?,
            Err(_) => MappingBackend::Sqlite,
        };
        let env_db = env::var("LFS_DEPOT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/lfs_depot.db".into());
        let env_json_path = env::var("LFS_DEPOT_JSON_MAPPING_PATH")
            .unwrap_or_else(|_| "./data/meta/mappings.json".into());
        let env_hints = env::var("LFS_DEPOT_HINTS_DIR").ok();
        let env_public_url = env::var("LFS_DEPOT_PUBLIC_URL").ok();
        let env_ttl = parse_env("LFS_DEPOT_ACTION_TTL_SECS", 3600)?;
        let env_timeout = parse_env("LFS_DEPOT_BACKEND_TIMEOUT_SECS", 30)?;

        // --- Merge ---
        let port = args.port.unwrap_or(env_port);
        let public_url = args
            .public_url
            .or(env_public_url)
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port,
            data_dir: args.data_dir.unwrap_or(env_data_dir),
            bucket: args.bucket.unwrap_or(env_bucket),
            mapping_backend: args.mapping_backend.unwrap_or(env_backend),
            database_url: args.database_url.unwrap_or(env_db),
            json_mapping_path: args.json_mapping_path.unwrap_or(env_json_path),
            hints_dir: args.hints_dir.or(env_hints),
            public_url,
            action_ttl_secs: args.action_ttl_secs.unwrap_or(env_ttl),
            backend_timeout_secs: args.backend_timeout_secs.unwrap_or(env_timeout),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
