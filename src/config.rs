use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub public_base_url: String,
    pub upload_token_secret: String,
    pub upload_token_ttl_secs: i64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Marketplace REST API")]
pub struct Args {
    /// Host to bind to (overrides MARKETPLACE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MARKETPLACE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where image blobs are stored (overrides MARKETPLACE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides MARKETPLACE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL clients reach this service under (overrides MARKETPLACE_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

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
        let env_host = env::var("MARKETPLACE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("MARKETPLACE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing MARKETPLACE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading MARKETPLACE_PORT"),
        };
        let env_storage =
            env::var("MARKETPLACE_STORAGE_DIR").unwrap_or_else(|_| "./data/images".into());
        let env_db = env::var("MARKETPLACE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/marketplace.db".into());
        let env_base_url = env::var("MARKETPLACE_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());
        let upload_token_secret = match env::var("MARKETPLACE_UPLOAD_SECRET") {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    "MARKETPLACE_UPLOAD_SECRET not set; falling back to an insecure dev secret"
                );
                "dev-upload-secret".into()
            }
        };
        let upload_token_ttl_secs = match env::var("MARKETPLACE_UPLOAD_TTL_SECS") {
            Ok(value) => value
                .parse::<i64>()
                .with_context(|| format!("parsing MARKETPLACE_UPLOAD_TTL_SECS value `{}`", value))?,
            Err(_) => 900,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url: args.public_base_url.unwrap_or(env_base_url),
            upload_token_secret,
            upload_token_ttl_secs,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
