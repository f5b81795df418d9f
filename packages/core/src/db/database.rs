//! Database Connection Management
//!
//! This module provides the database connection and schema initialization
//! for the versioned graph store, using libsql (embedded SQLite).
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Versioned rows**: Every table except `change_sets` stores one physical row
//!   per (tenancy, logical id, change set)
//! - **WAL mode**: Write-Ahead Logging so readers never block the writer
//! - **No in-process locks**: concurrent writers are serialized by SQLite
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions** so concurrent
//! operations wait for the lock instead of failing with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use propgraph_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/propgraph.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::StoreConfig;
use crate::db::error::DatabaseError;
use crate::db::standard_model::{standard_table_sql, VERSIONED_TABLES};
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing libsql connection and schema
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u32,
}

impl DatabaseService {
    /// Open (or create) a database with default settings
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the parent directory cannot be created, the
    /// connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_config(&StoreConfig::new(db_path)).await
    }

    /// Open a database described by a [`StoreConfig`]
    pub async fn with_config(config: &StoreConfig) -> Result<Self, DatabaseError> {
        if config.database_path.as_os_str().is_empty() {
            return Err(DatabaseError::invalid_path(config.database_path.clone()));
        }
        config
            .validate()
            .map_err(DatabaseError::initialization_failed)?;

        let db_path = config.database_path.clone();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms: config.busy_timeout_ms,
        };

        service.initialize_schema(config.wal).await?;
        tracing::info!(path = %service.db_path.display(), "graph store database ready");

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent: every statement uses `IF NOT EXISTS`.
    ///
    /// # Schema
    ///
    /// - versioned tables listed in [`VERSIONED_TABLES`], each with the
    ///   standard tenancy/visibility columns
    /// - `change_sets`: unversioned change set registry
    async fn initialize_schema(&self, wal: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        if wal {
            self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
                .await?;
        }

        for table in VERSIONED_TABLES {
            conn.execute(&standard_table_sql(table), ())
                .await
                .map_err(|e| {
                    DatabaseError::initialization_failed(format!(
                        "Failed to create {} table: {}",
                        table.name, e
                    ))
                })?;

            conn.execute(
                &format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_{t}_version
                     ON {t}(tenancy_workspace_id, id, visibility_change_set_id)",
                    t = table.name
                ),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index 'idx_{}_version': {}",
                    table.name, e
                ))
            })?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS change_sets (
                id TEXT PRIMARY KEY,
                tenancy_workspace_id TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create change_sets table: {}",
                e
            ))
        })?;

        self.create_lookup_indexes(&conn).await?;

        Ok(())
    }

    /// Indexes backing the relation lookups of tree and resolution queries
    async fn create_lookup_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_prop_belongs_to_prop_parent",
                "prop_belongs_to_prop(tenancy_workspace_id, belongs_to_id)",
            ),
            (
                "idx_prop_belongs_to_prop_child",
                "prop_belongs_to_prop(tenancy_workspace_id, object_id)",
            ),
            (
                "idx_attribute_values_prop",
                "attribute_values(tenancy_workspace_id, attribute_context_prop_id)",
            ),
            (
                "idx_sockets_variant",
                "sockets(tenancy_workspace_id, schema_variant_id)",
            ),
        ];

        for (name, target) in indexes {
            conn.execute(&format!("CREATE INDEX IF NOT EXISTS {name} ON {target}"), ())
                .await
                .map_err(|e| {
                    DatabaseError::initialization_failed(format!(
                        "Failed to create index '{}': {}",
                        name, e
                    ))
                })?;
        }

        Ok(())
    }

    /// Get a raw connection to the database
    ///
    /// Prefer `connect_with_timeout()` in async code.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// Sets the configured busy timeout so concurrent writers wait and retry
    /// instead of failing immediately when the database is locked.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_errors_keep_their_reason() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = StoreConfig::new(temp_dir.path().join("test.db"));
        config.busy_timeout_ms = u32::MAX;

        let err = DatabaseService::with_config(&config).await.err().unwrap();
        match err {
            DatabaseError::InitializationFailed(msg) => {
                assert!(msg.contains("busy_timeout_ms"), "unexpected message: {}", msg)
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!temp_dir.path().join("test.db").exists());

        let err = DatabaseService::with_config(&StoreConfig::new(PathBuf::new()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DatabaseError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn test_with_config_opens_and_initializes() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path().join("nested").join("test.db"));

        let db = DatabaseService::with_config(&config).await.unwrap();
        assert!(db.connect_with_timeout().await.is_ok());
        assert!(config.database_path.exists());
    }
}
