//! Trigger repository
//!
//! Rows are owned by the admin collaborator; the dispatch path only reads
//! them through [`TriggerRepo::find_by_casefolded_text`].

use super::DbPool;
use crate::{Error, Result};

/// Normalize text for trigger comparison
#[must_use]
pub fn casefold(text: &str) -> String {
    text.to_lowercase()
}

/// A stored trigger → response pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub id: i64,
    pub trigger_text: String,
    pub response_text: String,
}

/// Repository for trigger rows
#[derive(Debug, Clone)]
pub struct TriggerRepo {
    pool: DbPool,
}

impl TriggerRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up the trigger whose casefolded text equals `key`
    ///
    /// `key` must already be casefolded. Rows whose stored key was computed
    /// by another client (SQLite's ASCII-only `lower()`) are matched by
    /// folding `trigger` in SQL; the stored key wins when both match.
    ///
    /// # Errors
    ///
    /// Returns error if no connection can be acquired or the query fails
    pub fn find_by_casefolded_text(&self, key: &str) -> Result<Option<Trigger>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let result = conn.query_row(
            "SELECT id, trigger, response FROM triggers
             WHERE trigger_key = ?1 OR casefold(trim(trigger)) = ?1
             ORDER BY trigger_key = ?1 DESC, id
             LIMIT 1",
            [key],
            |row| {
                Ok(Trigger {
                    id: row.get(0)?,
                    trigger_text: row.get(1)?,
                    response_text: row.get(2)?,
                })
            },
        );

        match result {
            Ok(trigger) => Ok(Some(trigger)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a trigger
    ///
    /// Both texts are trimmed; an existing trigger with the same casefolded
    /// text is rejected.
    ///
    /// # Errors
    ///
    /// Returns error if either text is empty, the trigger already exists, or
    /// the database operation fails
    pub fn insert(&self, trigger_text: &str, response_text: &str) -> Result<Trigger> {
        let trigger_text = trigger_text.trim();
        let response_text = response_text.trim();
        if trigger_text.is_empty() || response_text.is_empty() {
            return Err(Error::Database(
                "trigger and response are required".to_string(),
            ));
        }

        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        // Catches rows whose stored key came from another client
        let key = casefold(trigger_text);
        let clash: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM triggers WHERE casefold(trim(trigger)) = ?1)",
            [&key],
            |row| row.get(0),
        )?;
        if clash {
            return Err(Error::Database(format!("trigger already exists: {trigger_text}")));
        }

        let inserted = conn.execute(
            "INSERT INTO triggers (trigger, trigger_key, response) VALUES (?1, ?2, ?3)",
            rusqlite::params![trigger_text, key, response_text],
        );

        match inserted {
            Ok(_) => Ok(Trigger {
                id: conn.last_insert_rowid(),
                trigger_text: trigger_text.to_string(),
                response_text: response_text.to_string(),
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Database(format!("trigger already exists: {trigger_text}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a trigger by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let deleted = conn.execute("DELETE FROM triggers WHERE id = ?1", [id])?;

        Ok(deleted > 0)
    }

    /// List all triggers ordered by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<Trigger>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT id, trigger, response FROM triggers ORDER BY id")?;

        let triggers = stmt
            .query_map([], |row| {
                Ok(Trigger {
                    id: row.get(0)?,
                    trigger_text: row.get(1)?,
                    response_text: row.get(2)?,
                })
            })?
            .flatten()
            .collect();

        Ok(triggers)
    }
}
