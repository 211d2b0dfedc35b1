use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 6] = ["txt", "jpg", "jpeg", "png", "json", "pdf"];

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub database_url: String,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub cors_origin: String,
    pub environment: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "File storage HTTP service")]
pub struct Args {
    /// Host to bind to (overrides FILE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded files are stored (overrides FILE_STORE_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Database URL (overrides FILE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Maximum accepted upload size in bytes (overrides FILE_STORE_MAX_FILE_SIZE)
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Comma separated list of accepted extensions (overrides FILE_STORE_ALLOWED_EXTENSIONS)
    #[arg(long)]
    pub allowed_extensions: Option<String>,

    /// Origin allowed by CORS (overrides FILE_STORE_CORS_ORIGIN)
    #[arg(long)]
    pub cors_origin: Option<String>,

    /// Runtime environment, `production` hides error details (overrides FILE_STORE_ENV)
    #[arg(long)]
    pub environment: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILE_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("FILE_STORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing FILE_STORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 5000,
            Err(err) => return Err(err).context("reading FILE_STORE_PORT"),
        };
        let env_max_size = match env::var("FILE_STORE_MAX_FILE_SIZE") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| format!("parsing FILE_STORE_MAX_FILE_SIZE value `{}`", value))?,
            Err(env::VarError::NotPresent) => DEFAULT_MAX_FILE_SIZE,
            Err(err) => return Err(err).context("reading FILE_STORE_MAX_FILE_SIZE"),
        };
        let env_upload = env::var("FILE_STORE_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_db = env::var("FILE_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/file_store.db".into());
        let env_extensions = env::var("FILE_STORE_ALLOWED_EXTENSIONS").ok();
        let env_cors =
            env::var("FILE_STORE_CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".into());
        let env_environment = env::var("FILE_STORE_ENV").unwrap_or_else(|_| "development".into());

        // --- Merge ---
        let allowed_extensions = match args.allowed_extensions.or(env_extensions) {
            Some(list) => parse_extension_list(&list),
            None => DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        };
        if allowed_extensions.is_empty() {
            anyhow::bail!("allowed extension list must not be empty");
        }

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.unwrap_or(env_upload),
            database_url: args.database_url.unwrap_or(env_db),
            max_file_size: args.max_file_size.unwrap_or(env_max_size),
            allowed_extensions,
            cors_origin: args.cors_origin.unwrap_or(env_cors),
            environment: args.environment.unwrap_or(env_environment),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn upload_path(&self) -> PathBuf {
        PathBuf::from(&self.upload_dir)
    }
}

/// Split a comma separated extension list, normalizing case and leading dots.
pub fn parse_extension_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
