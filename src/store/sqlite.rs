//! SQLite secret store backend
//!
//! Keeps key share records in a local database file, for running the
//! sidecar next to a Vault that is not hosted on Kubernetes.
//!
//! Architectural role:
//! - Implements [`SecretStore`] on a pooled connection
//! - Enforces create-once through a UNIQUE constraint on the record name
//! - Runs queries on the blocking thread pool

use crate::interface::SecretStore;
use crate::store::{PersistedSecretRecord, StoreError};
use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database connection pool type
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Secret store backed by a SQLite file
#[derive(Clone)]
pub struct SqliteSecretStore {
    pool: Arc<DbPool>,
}

impl SqliteSecretStore {
    /// Open (or create) the database at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path.as_ref());
        Self::with_manager(manager)
    }

    /// A private in-memory database, only useful in tests
    pub fn in_memory() -> Result<Self, StoreError> {
        // One connection, otherwise each pooled connection gets its own database.
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())?;
        Self::init_database(&pool.get()?)?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn with_manager(manager: SqliteConnectionManager) -> Result<Self, StoreError> {
        let pool = Pool::new(manager)?;
        Self::init_database(&pool.get()?)?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize the database with required tables
    fn init_database(conn: &DbConnection) -> Result<(), StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS secret_records (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                root_token TEXT NOT NULL,
                shares TEXT NOT NULL
            )",
            [],
        )?;
        debug!("Secret store database initialized");
        Ok(())
    }

    /// Run a query on the blocking pool with a pooled connection
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&DbConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("SQLite task failed: {}", e)))?
    }
}

#[async_trait]
impl SecretStore for SqliteSecretStore {
    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM secret_records WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn save(&self, name: &str, record: &PersistedSecretRecord) -> Result<(), StoreError> {
        let name = name.to_string();
        let shares = serde_json::to_string(&record.shares)
            .map_err(|e| StoreError::Backend(format!("Failed to serialize shares: {}", e)))?;
        let root_token = record.root_token.clone();
        let count = record.shares.len();

        self.with_conn(move |conn| {
            match conn.execute(
                "INSERT INTO secret_records (name, root_token, shares) VALUES (?1, ?2, ?3)",
                params![name, root_token, shares],
            ) {
                Ok(_) => {
                    info!("Saved secret record {} with {} shares", name, count);
                    Ok(())
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Conflict(name.clone()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn load(&self, name: &str) -> Result<PersistedSecretRecord, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT root_token, shares FROM secret_records WHERE name = ?1",
                    params![name],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            let (root_token, shares_json) = row.ok_or_else(|| StoreError::NotFound(name.clone()))?;
            let shares: Vec<String> = serde_json::from_str(&shares_json).map_err(|e| {
                StoreError::Decode(format!("Failed to deserialize shares of {}: {}", name, e))
            })?;
            Ok(PersistedSecretRecord { root_token, shares })
        })
        .await
    }
}
