//! Database operations for the grocery API.
//!
//! # Database: `SQLite`
//!
//! ## Tables
//!
//! - `user` - Accounts (email, username, password hash, flags)
//! - `store` - Shopping lists owned by a user
//! - `grocery` - Line items, each belonging to one store and one owner
//! - `store_share` - Accounts a store is shared with (not used for access)
//! - `profile` / `profile_friend` - Per-user profile and symmetric friend set
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/`, embedded in
//! [`MIGRATOR`], and run via:
//! ```bash
//! cargo run -p grocery-cli -- migrate
//! ```

pub mod profiles;
pub mod stores;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;

pub use profiles::ProfileRepository;
pub use stores::StoreRepository;
pub use users::{NewUser, UserRepository};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, naming the column.
    pub(crate) fn from_unique(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            let message = db_err.message();
            let column = if message.contains(".email") {
                "email"
            } else if message.contains(".username") {
                "username"
            } else {
                "record"
            };
            return Self::Conflict(column.to_owned());
        }
        Self::Database(err)
    }
}

/// How long a connection waits on another writer's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a `SQLite` connection pool with sensible defaults.
///
/// The database file is created if missing and foreign keys are enforced on
/// every connection. The journal runs in WAL mode so reads never block on a
/// writer, and writers queue for up to [`BUSY_TIMEOUT`] instead of failing
/// with `SQLITE_BUSY`.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be established.
pub async fn create_pool(
    database_url: &SecretString,
    max_connections: u32,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Create a migrated in-memory database.
///
/// The pool holds exactly one connection that never expires, since every
/// `SQLite` in-memory connection is its own database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection or a migration fails.
pub async fn create_in_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Begin a transaction that holds the write lock from its first statement.
///
/// A deferred `BEGIN` that reads before writing must upgrade its lock later,
/// and `SQLite` refuses that upgrade outright when another writer got there
/// first. Taking the lock up front makes concurrent writers wait their turn.
///
/// # Errors
///
/// Returns `sqlx::Error` if no connection is available or the lock cannot be
/// acquired within the busy timeout.
pub async fn begin_write(
    pool: &SqlitePool,
) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `sqlx::Error` if a migration fails to apply.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    MIGRATOR.run(pool).await?;
    Ok(())
}
