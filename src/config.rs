use crate::error::{IngestError, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

const DEFAULT_DATABASE_URL: &str = "data/bikeshare.db";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Where the trip store lives: a local SQLite file path, or a remote
/// Turso/libSQL URL plus auth token.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
}

impl DatabaseConfig {
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("libsql://")
            || self.url.starts_with("http://")
            || self.url.starts_with("https://")
    }
}

/// Service configuration, read once at startup from the environment
/// (`.env` is loaded first, see `main`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub batch_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
        };

        let port = match env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| IngestError::Config(format!("PORT is not a valid port: {value:?}")))?,
            Err(_) => DEFAULT_PORT,
        };

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOADS_DIR));

        let batch_size = match env::var("BATCH_SIZE") {
            Ok(value) => value.parse::<usize>().ok().filter(|b| *b > 0).ok_or_else(|| {
                IngestError::Config(format!(
                    "BATCH_SIZE must be a positive integer, got {value:?}"
                ))
            })?,
            Err(_) => DEFAULT_BATCH_SIZE,
        };

        Ok(Self {
            database,
            port,
            uploads_dir,
            batch_size,
        })
    }
}
