//! Database schema and migrations

use rusqlite::Connection;

use super::trigger::casefold;
use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Trigger table, layout shared with the admin UI
        CREATE TABLE IF NOT EXISTS triggers (
            id INTEGER PRIMARY KEY,
            trigger VARCHAR(200) NOT NULL UNIQUE,
            response TEXT NOT NULL
        );

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    // Casefolded lookup key, backfilled for rows written before v2
    tx.execute_batch("ALTER TABLE triggers ADD COLUMN trigger_key TEXT;")?;

    let rows: Vec<(i64, String)> = {
        let mut stmt = tx.prepare("SELECT id, trigger FROM triggers")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    for (id, trigger) in &rows {
        tx.execute(
            "UPDATE triggers SET trigger_key = ?1 WHERE id = ?2",
            rusqlite::params![casefold(trigger.trim()), id],
        )?;
    }

    // Rows written by other clients get an ASCII-lowercased key
    tx.execute_batch(
        r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_triggers_key ON triggers(trigger_key);

        CREATE TRIGGER IF NOT EXISTS triggers_key_insert
        AFTER INSERT ON triggers WHEN NEW.trigger_key IS NULL
        BEGIN
            UPDATE triggers SET trigger_key = lower(trim(NEW.trigger)) WHERE id = NEW.id;
        END;

        CREATE TRIGGER IF NOT EXISTS triggers_key_update
        AFTER UPDATE OF trigger ON triggers
        BEGIN
            UPDATE triggers SET trigger_key = lower(trim(NEW.trigger)) WHERE id = NEW.id;
        END;

        PRAGMA user_version = 2;
        ",
    )?;

    tx.commit()?;

    tracing::info!(backfilled = rows.len(), "migrated to schema v2 (casefolded trigger keys)");
    Ok(())
}
