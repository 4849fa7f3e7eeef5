#![cfg_attr(
    not(any(feature = "pg", feature = "sqlite")),
    allow(
        unused_imports,
        unused_variables,
        dead_code,
        unreachable_code,
        unused_lifetimes
    )
)]

//! Database abstraction crate providing a database-agnostic `DbHandle`.
//!
//! This crate provides a unified interface for working with SQLite and
//! PostgreSQL through SQLx, with SeaORM integration for the modules that
//! own typed entities.
//!
//! # Features
//! - `pg`, `sqlite`: enable SQLx backends
//! - `sea-orm`: add SeaORM integration for type-safe operations
//!
//! # Example
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> db::Result<()> {
//!     use db::{DbHandle, ConnectOpts};
//!
//!     let db = DbHandle::connect("sqlite://./registrations.db", ConnectOpts::default()).await?;
//!
//!     #[cfg(feature = "sea-orm")]
//!     {
//!         let _conn = db.sea();
//!     }
//!
//!     db.close().await;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod retry;

pub use retry::{with_retry, RetryConfig};

use std::collections::HashMap;
use std::time::Duration;

use sqlx::pool::PoolOptions;
#[cfg(feature = "pg")]
use sqlx::PgPool;
#[cfg(feature = "sqlite")]
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};

#[cfg(feature = "sea-orm")]
use sea_orm::DatabaseConnection;
#[cfg(all(feature = "sea-orm", feature = "pg"))]
use sea_orm::SqlxPostgresConnector;
#[cfg(all(feature = "sea-orm", feature = "sqlite"))]
use sea_orm::SqlxSqliteConnector;

use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Typed error for the DB handle and helpers.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unknown DSN: {0}")]
    UnknownDsn(String),

    #[error("Feature not enabled: {0}")]
    FeatureDisabled(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[cfg(feature = "sea-orm")]
    #[error(transparent)]
    Sea(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Supported engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbEngine {
    Postgres,
    Sqlite,
}

/// Connection options.
/// Covers the common sqlx pool knobs; each driver applies the subset it supports.
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    /// Maximum number of connections in the pool.
    pub max_conns: Option<u32>,
    /// Minimum number of connections in the pool.
    pub min_conns: Option<u32>,
    /// Timeout to acquire a connection from the pool.
    pub acquire_timeout: Option<Duration>,
    /// Idle timeout before a connection is closed.
    pub idle_timeout: Option<Duration>,
    /// Maximum lifetime for a connection.
    pub max_lifetime: Option<Duration>,
    /// Test connection health before acquire.
    pub test_before_acquire: bool,

    /// SQLite-specific: busy timeout applied via PRAGMA busy_timeout.
    /// A `busy_timeout` query parameter in the DSN wins over this value.
    pub sqlite_busy_timeout: Option<Duration>,
    /// For SQLite file DSNs, create parent directories if missing.
    pub create_sqlite_dirs: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(10),
            min_conns: None,
            acquire_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            max_lifetime: None,
            test_before_acquire: false,

            sqlite_busy_timeout: Some(Duration::from_millis(5_000)),
            create_sqlite_dirs: true,
        }
    }
}

/// One concrete sqlx pool.
#[derive(Clone, Debug)]
pub enum DbPool {
    #[cfg(feature = "pg")]
    Postgres(PgPool),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

/// Main handle.
#[derive(Debug)]
pub struct DbHandle {
    engine: DbEngine,
    pool: DbPool,
    dsn: String,
    #[cfg(feature = "sea-orm")]
    sea: DatabaseConnection,
}

impl DbHandle {
    /// Detect engine by DSN.
    ///
    /// Note: we only check scheme prefixes and don't mutate the tail (credentials etc.).
    pub fn detect(dsn: &str) -> Result<DbEngine> {
        let s = dsn.trim_start();

        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            Ok(DbEngine::Postgres)
        } else if s.starts_with("sqlite:") {
            Ok(DbEngine::Sqlite)
        } else {
            Err(DbError::UnknownDsn(dsn.to_string()))
        }
    }

    /// Connect and build handle.
    pub async fn connect(dsn: &str, opts: ConnectOpts) -> Result<Self> {
        let engine = Self::detect(dsn)?;
        match engine {
            #[cfg(feature = "pg")]
            DbEngine::Postgres => {
                let pool = pool_options::<sqlx::Postgres>(&opts).connect(dsn).await?;
                #[cfg(feature = "sea-orm")]
                let sea = SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone());
                Ok(Self {
                    engine,
                    pool: DbPool::Postgres(pool),
                    dsn: dsn.to_string(),
                    #[cfg(feature = "sea-orm")]
                    sea,
                })
            }
            #[cfg(feature = "sqlite")]
            DbEngine::Sqlite => {
                use std::str::FromStr;

                let dsn = prepare_sqlite_path(dsn, opts.create_sqlite_dirs)?;

                // Parse pragma settings from DSN query parameters BEFORE removing them
                let dsn_pragmas = parse_sqlite_pragmas_from_dsn(&dsn);

                // SQLx doesn't understand the pragma parameters
                let clean_dsn = remove_sqlite_pragmas_from_dsn(&dsn);
                let in_memory = is_in_memory_dsn(&clean_dsn);

                let connect_options =
                    SqliteConnectOptions::from_str(&clean_dsn)?.create_if_missing(true);

                let busy = opts.sqlite_busy_timeout;
                let o = pool_options::<sqlx::Sqlite>(&opts).after_connect(move |conn, _meta| {
                    let pragmas = dsn_pragmas.clone();
                    Box::pin(async move {
                        let journal = pragmas
                            .get("journal_mode")
                            .cloned()
                            // In-memory databases don't support WAL mode properly
                            .unwrap_or_else(|| {
                                if in_memory { "DELETE" } else { "WAL" }.to_string()
                            });
                        let stmt = format!("PRAGMA journal_mode = {journal}");
                        sqlx::query(&stmt).execute(&mut *conn).await?;

                        let sync = pragmas
                            .get("synchronous")
                            .cloned()
                            .unwrap_or_else(|| "NORMAL".to_string());
                        let stmt = format!("PRAGMA synchronous = {sync}");
                        sqlx::query(&stmt).execute(&mut *conn).await?;

                        let busy_ms = pragmas.get("busy_timeout").cloned().or_else(|| {
                            busy.map(|d| std::cmp::min(d.as_millis(), i64::MAX as u128).to_string())
                        });
                        if let Some(ms) = busy_ms {
                            // PRAGMA can't use bind parameters; value is validated numeric.
                            let stmt = format!("PRAGMA busy_timeout = {ms}");
                            sqlx::query(&stmt).execute(&mut *conn).await?;
                        }

                        Ok(())
                    })
                });

                let pool = o.connect_with(connect_options).await?;
                #[cfg(feature = "sea-orm")]
                let sea = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool.clone());

                Ok(Self {
                    engine,
                    pool: DbPool::Sqlite(pool),
                    dsn: clean_dsn,
                    #[cfg(feature = "sea-orm")]
                    sea,
                })
            }
            #[cfg(not(feature = "pg"))]
            DbEngine::Postgres => Err(DbError::FeatureDisabled("PostgreSQL feature not enabled")),
            #[cfg(not(feature = "sqlite"))]
            DbEngine::Sqlite => Err(DbError::FeatureDisabled("SQLite feature not enabled")),
        }
    }

    /// Graceful pool close. (Dropping the pool also closes it; this just makes it explicit.)
    pub async fn close(self) {
        match self.pool {
            #[cfg(feature = "pg")]
            DbPool::Postgres(p) => p.close().await,
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(p) => p.close().await,
        }
    }

    /// Get the backend.
    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    /// Get the DSN used for this connection (pragma parameters stripped).
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlx_sqlite(&self) -> Option<&SqlitePool> {
        match self.pool {
            DbPool::Sqlite(ref p) => Some(p),
            #[cfg(feature = "pg")]
            _ => None,
        }
    }

    // --- SeaORM accessor ---
    #[cfg(feature = "sea-orm")]
    /// Get SeaORM connection (clone; cheap handle).
    pub fn sea(&self) -> DatabaseConnection {
        self.sea.clone()
    }
}

// ===================== helpers =====================

/// Pool knobs shared by both engines.
fn pool_options<DB: sqlx::Database>(opts: &ConnectOpts) -> PoolOptions<DB> {
    let mut o = PoolOptions::<DB>::new()
        .acquire_timeout(opts.acquire_timeout.unwrap_or(Duration::from_secs(30)))
        .idle_timeout(opts.idle_timeout)
        .max_lifetime(opts.max_lifetime)
        .test_before_acquire(opts.test_before_acquire);
    if let Some(n) = opts.max_conns {
        o = o.max_connections(n);
    }
    if let Some(n) = opts.min_conns {
        o = o.min_connections(n);
    }
    o
}

fn is_in_memory_dsn(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

#[cfg(feature = "sqlite")]
fn prepare_sqlite_path(dsn: &str, create_dirs: bool) -> Result<String> {
    // Only try to create directories for plain file paths; ignore :memory: cases.
    if !create_dirs || is_in_memory_dsn(dsn) {
        return Ok(dsn.to_string());
    }

    // Handles "sqlite:/path" and "sqlite://path".
    // For URI forms like "sqlite:file:memdb?..." there is no filesystem dir to create.
    let raw = if let Some(rest) = dsn.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = dsn.strip_prefix("sqlite:") {
        rest
    } else {
        dsn
    };
    let path = raw.split('?').next().unwrap_or(raw);

    if !path.starts_with("file:") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                // One-time blocking call during startup; acceptable for setup paths.
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    Ok(dsn.to_string())
}

const SQLITE_PRAGMA_PARAMS: &[&str] = &["wal", "synchronous", "busy_timeout", "journal_mode"];

/// Remove SQLite-specific PRAGMA parameters from DSN for SQLx connection.
fn remove_sqlite_pragmas_from_dsn(dsn: &str) -> String {
    let Some((base, query)) = dsn.split_once('?') else {
        return dsn.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or("").to_lowercase();
            !key.is_empty() && !SQLITE_PRAGMA_PARAMS.contains(&key.as_str())
        })
        .collect();

    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

/// Parse and validate SQLite PRAGMA settings from DSN query parameters.
/// Only accepts parameters from a strict whitelist and validates their values.
/// Invalid parameters are logged as warnings but don't cause failures.
/// `wal=true|false` is folded into `journal_mode` unless that is given explicitly.
fn parse_sqlite_pragmas_from_dsn(dsn: &str) -> HashMap<String, String> {
    let mut pragmas = HashMap::new();
    let Some((_, query)) = dsn.split_once('?') else {
        return pragmas;
    };

    let mut wal = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let key_lower = key.to_lowercase();
        let validated = match key_lower.as_str() {
            "wal" => {
                wal = validate_wal_pragma(&value);
                wal.clone()
            }
            "synchronous" => validate_synchronous_pragma(&value),
            "busy_timeout" => validate_busy_timeout_pragma(&value).map(|v| v.to_string()),
            "journal_mode" => validate_journal_mode_pragma(&value),
            _ => {
                tracing::debug!(param = %key, "Unknown SQLite parameter in DSN, ignoring");
                continue;
            }
        };
        match validated {
            Some(v) if key_lower != "wal" => {
                pragmas.insert(key_lower, v);
            }
            Some(_) => {}
            None => {
                tracing::warn!(param = %key, value = %value, "Invalid SQLite PRAGMA value in DSN, ignoring");
            }
        }
    }

    if let Some(mode) = wal {
        pragmas.entry("journal_mode".to_string()).or_insert(mode);
    }

    pragmas
}

/// Accepts "true", "false", "1", "0" (case-insensitive); returns "WAL" or "DELETE".
fn validate_wal_pragma(value: &str) -> Option<String> {
    match value.to_lowercase().as_str() {
        "true" | "1" => Some("WAL".to_string()),
        "false" | "0" => Some("DELETE".to_string()),
        _ => None,
    }
}

fn validate_synchronous_pragma(value: &str) -> Option<String> {
    match value.to_uppercase().as_str() {
        "OFF" | "NORMAL" | "FULL" | "EXTRA" => Some(value.to_uppercase()),
        _ => None,
    }
}

/// Must be a non-negative integer in milliseconds.
fn validate_busy_timeout_pragma(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|&timeout| timeout >= 0)
}

fn validate_journal_mode_pragma(value: &str) -> Option<String> {
    match value.to_uppercase().as_str() {
        "DELETE" | "WAL" | "MEMORY" | "TRUNCATE" | "PERSIST" | "OFF" => Some(value.to_uppercase()),
        _ => None,
    }
}

// ===================== tests =====================
