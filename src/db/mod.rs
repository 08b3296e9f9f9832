//! Database module for trigger persistence

mod schema;
pub mod trigger;

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;

use crate::config::DatabaseLocation;
use crate::{Error, Result};

pub use schema::SCHEMA_VERSION;
pub use trigger::{Trigger, TriggerRepo, casefold};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// How long a checkout waits for a free pooled connection
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `SQLite` waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-connection setup: busy timeout and the `casefold()` SQL function
///
/// `casefold(text)` applies the same folding as [`casefold`], so rows whose
/// stored key was computed elsewhere can still be compared in SQL.
fn configure(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: String = ctx.get(0)?;
            Ok(casefold(&text))
        },
    )
}

/// Open the database described by the configuration
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn open(location: &DatabaseLocation) -> Result<DbPool> {
    match location {
        DatabaseLocation::File(path) => init(path),
        DatabaseLocation::Memory => init_memory(),
    }
}

/// Initialize the database
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(configure);
    let pool = Pool::builder()
        .max_size(4)
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    // Run migrations on first connection
    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(configure);
    let pool = Pool::builder()
        .max_size(1)
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    Ok(pool)
}
