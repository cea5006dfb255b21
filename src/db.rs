use crate::config::DatabaseConfig;
use crate::error::{IngestError, Result};
use libsql::{Builder, Connection};
use std::path::Path;
use tracing::info;

pub struct Database {
    db: libsql::Database,
    is_remote: bool,
}

impl Database {
    /// Open the database described by the config: a remote Turso/libSQL
    /// URL with an auth token, or a local SQLite file otherwise.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let is_remote = config.is_remote();
        let db = if is_remote {
            let auth_token = config.auth_token.clone().ok_or_else(|| {
                IngestError::Config(
                    "DATABASE_AUTH_TOKEN is required for remote databases".to_string(),
                )
            })?;

            info!("Connecting to remote database at {}", config.url);

            Builder::new_remote(config.url.clone(), auth_token)
                .build()
                .await
                .map_err(|e| {
                    IngestError::Connection(format!("failed to open remote database: {e}"))
                })?
        } else {
            if let Some(parent) = Path::new(&config.url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            info!("Opening local database at {}", config.url);

            Builder::new_local(&config.url).build().await.map_err(|e| {
                IngestError::Connection(format!("failed to open local database: {e}"))
            })?
        };

        Ok(Self { db, is_remote })
    }

    /// Hand out a connection for one import. Every acquire applies the
    /// connection settings: a busy timeout and WAL journaling so
    /// concurrent imports queue on the write lock instead of erroring,
    /// plus foreign key enforcement.
    pub async fn acquire(&self) -> Result<Connection> {
        let conn = self.db.connect().map_err(|e| {
            IngestError::Connection(format!("failed to get database connection: {e}"))
        })?;

        // Journal and lock tuning only mean something for a local file
        if !self.is_remote {
            pragma(&conn, "PRAGMA busy_timeout = 5000").await?;
            pragma(&conn, "PRAGMA journal_mode = WAL").await?;
        }
        pragma(&conn, "PRAGMA foreign_keys = ON").await?;

        Ok(conn)
    }

    /// Apply the schema. Idempotent, runs on every startup.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        let conn = self.acquire().await?;
        let migration_sql = include_str!("../migrations/001_create_schema.sql");

        conn.execute_batch(migration_sql).await?;

        info!("Database migrations completed");
        Ok(())
    }
}

/// Some pragmas answer with a result row, so they go through `query`;
/// draining the cursor is what runs the statement.
async fn pragma(conn: &Connection, sql: &str) -> Result<()> {
    let mut rows = conn.query(sql, libsql::params![]).await?;
    while rows.next().await?.is_some() {}
    Ok(())
}
