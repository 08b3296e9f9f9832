//! Messaging channel adapters
//!
//! Transport-neutral types shared by both ingress paths, plus the Telegram
//! Bot API adapter.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::{PollCursor, Poller, TelegramClient, UpdateDedup, UpdateSource, normalize};

/// One inbound chat message, normalized from either transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Chat the message came from (and the reply goes to)
    pub chat_id: i64,

    /// Message text, trimmed and never empty
    pub text: String,

    /// Platform update ID, when the payload carried one
    pub update_id: Option<i64>,
}

/// Outbound message delivery
///
/// Implementations make a single best-effort attempt and report the outcome;
/// failures are logged by the implementation and never raised.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send `text` to `chat_id`, returning `true` only on confirmed delivery
    async fn send(&self, chat_id: i64, text: &str) -> bool;
}
