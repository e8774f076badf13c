//! Database connection management
//!
//! The cache can live in an embedded SQLite file or on a PostgreSQL server.
//! The backend is picked once from the URL scheme at startup; everything
//! above this module only sees the [`StreamCache`] trait.
//!
//! [`StreamCache`]: crate::repositories::StreamCache

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::errors::{StorageError, StorageResult};
use crate::repositories::{PgStreamCache, SqliteStreamCache, StreamCache};

/// Schema shared by both backends
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cached_stream_info (
        video_link      TEXT PRIMARY KEY NOT NULL,
        status          INTEGER NOT NULL,
        title           TEXT NOT NULL,
        thumbnail       TEXT,
        start_time      BIGINT,
        members_only    BOOLEAN NOT NULL,
        type            INTEGER NOT NULL,
        last_check_time BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS config (
        name TEXT PRIMARY KEY NOT NULL,
        val  TEXT NOT NULL
    )
    "#,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    SQLite,
    PostgreSQL,
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::SQLite => "SQLite",
            DatabaseType::PostgreSQL => "PostgreSQL",
        }
    }
}

/// Long-lived connection pool owned by the process
#[derive(Clone)]
pub enum Database {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl Database {
    /// Work out the backend from the URL scheme
    pub fn detect_database_type(url: &str) -> StorageResult<DatabaseType> {
        if url.starts_with("sqlite:") {
            Ok(DatabaseType::SQLite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DatabaseType::PostgreSQL)
        } else {
            Err(StorageError::UnsupportedBackend { url: url.to_string() })
        }
    }

    /// Connect, retrying a fixed number of times before giving up
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        let database_type = Self::detect_database_type(&config.url)?;
        info!("Connecting to {} database", database_type.as_str());

        let attempts = config.connect_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match Self::try_connect(config, database_type).await {
                Ok(database) => return Ok(database),
                Err(e) => {
                    warn!(
                        "Database connection attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        let pause = 250 + fastrand::u64(0..250);
                        tokio::time::sleep(Duration::from_millis(pause)).await;
                    }
                }
            }
        }

        Err(StorageError::Connection {
            attempts,
            message: last_error,
        })
    }

    async fn try_connect(config: &DatabaseConfig, database_type: DatabaseType) -> StorageResult<Self> {
        let max_connections = config.max_connections.unwrap_or(5);

        match database_type {
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::from_str(&config.url)?
                    .create_if_missing(true)
                    .busy_timeout(config.connect_timeout());
                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(config.connect_timeout())
                    .connect_with(options)
                    .await?;
                Ok(Database::Sqlite(pool))
            }
            DatabaseType::PostgreSQL => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(config.connect_timeout())
                    .connect(&config.url)
                    .await?;
                Ok(Database::Postgres(pool))
            }
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            Database::Sqlite(_) => DatabaseType::SQLite,
            Database::Postgres(_) => DatabaseType::PostgreSQL,
        }
    }

    /// Create the cache tables if they do not exist yet
    pub async fn migrate(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            match self {
                Database::Sqlite(pool) => {
                    sqlx::query(statement).execute(pool).await?;
                }
                Database::Postgres(pool) => {
                    sqlx::query(statement).execute(pool).await?;
                }
            }
        }
        info!("Cache schema ready on {}", self.database_type().as_str());
        Ok(())
    }

    /// The cache coordinator backed by this pool
    pub fn stream_cache(&self) -> Arc<dyn StreamCache> {
        match self {
            Database::Sqlite(pool) => Arc::new(SqliteStreamCache::new(pool.clone())),
            Database::Postgres(pool) => Arc::new(PgStreamCache::new(pool.clone())),
        }
    }
}
