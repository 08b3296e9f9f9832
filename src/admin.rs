//! Operator commands for the trigger table

use std::io::Write;

use clap::Subcommand;

use crate::db::TriggerRepo;
use crate::{Error, Result};

/// Trigger maintenance subcommands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum TriggerAction {
    /// List all triggers
    List,
    /// Add a trigger
    Add {
        /// Text that fires the reply (matched case-insensitively)
        trigger: String,
        /// Reply sent back to the chat
        response: String,
    },
    /// Remove a trigger by ID
    Remove {
        /// Trigger ID as shown by `list`
        id: i64,
    },
}

/// Run one maintenance command, writing its report to `out`
///
/// # Errors
///
/// Returns error if the trigger is rejected (empty or duplicate), the ID
/// does not exist, or the database or `out` fails
pub fn manage_triggers<W: Write>(repo: &TriggerRepo, action: TriggerAction, out: &mut W) -> Result<()> {
    match action {
        TriggerAction::List => {
            let triggers = repo.list()?;
            if triggers.is_empty() {
                writeln!(out, "No triggers stored")?;
            }
            for t in triggers {
                writeln!(out, "{}\t{}\t{}", t.id, t.trigger_text, t.response_text)?;
            }
        }
        TriggerAction::Add { trigger, response } => {
            let stored = repo.insert(&trigger, &response)?;
            tracing::info!(trigger_id = stored.id, "trigger added");
            writeln!(out, "Added trigger {} ({})", stored.id, stored.trigger_text)?;
        }
        TriggerAction::Remove { id } => {
            if !repo.delete(id)? {
                return Err(Error::Database(format!("no trigger with id {id}")));
            }
            writeln!(out, "Removed trigger {id}")?;
        }
    }

    Ok(())
}
