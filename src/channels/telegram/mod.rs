//! Telegram channel adapter
//!
//! Updates arrive through the webhook route or the polling loop; replies go
//! out through the Bot API `sendMessage` call.

mod api;
pub mod dedup;
pub mod normalize;
pub mod polling;
mod types;

pub use api::TelegramClient;
pub use dedup::UpdateDedup;
pub use normalize::normalize;
pub use polling::{BatchSummary, PollCursor, PollOutcome, Poller, UpdateSource};
