//! Trigger Gateway - canned Telegram replies for exact trigger phrases
//!
//! Updates arrive over a secret-checked webhook, a `getUpdates` long-poll
//! loop, or both. Each update is normalized, deduplicated by `update_id`,
//! matched case-insensitively against the trigger table and answered with a
//! single best-effort `sendMessage`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │  POST /telegram/...  │   │  getUpdates poller   │
//! └──────────┬───────────┘   └──────────┬───────────┘
//!            │        normalize         │
//! ┌──────────▼──────────────────────────▼───────────┐
//! │          Dispatcher (dedup, lookup)              │
//! └──────────┬──────────────────────────┬───────────┘
//!            │                          │
//! ┌──────────▼───────────┐   ┌──────────▼───────────┐
//! │  TriggerRepo (SQLite)│   │  TelegramClient send │
//! └──────────────────────┘   └──────────────────────┘
//! ```

pub mod admin;
pub mod api;
pub mod channels;
pub mod config;
pub mod daemon;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod security;

pub use channels::{MessageSender, TelegramClient, Update};
pub use config::{Config, Mode};
pub use daemon::Daemon;
pub use db::{DbConn, DbPool, Trigger, TriggerRepo};
pub use dispatch::{DispatchResult, Dispatcher, LookupOutcome, TriggerStore};
pub use error::{Error, Result};
