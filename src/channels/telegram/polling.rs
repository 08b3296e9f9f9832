//! Telegram polling mode: getUpdates loop with an offset cursor

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use super::normalize::normalize;
use crate::Result;
use crate::config::PollingConfig;
use crate::dispatch::{DispatchResult, Dispatcher};

/// Source of raw update batches
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetch updates starting at `offset` (or the oldest retained backlog)
    async fn fetch(&self, offset: Option<i64>, long_poll: Duration)
    -> Result<Vec<serde_json::Value>>;
}

/// Last processed update ID, held in memory only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollCursor {
    last_update_id: Option<i64>,
}

impl PollCursor {
    /// Last update ID consumed, if any
    #[must_use]
    pub const fn last_update_id(&self) -> Option<i64> {
        self.last_update_id
    }

    /// Offset for the next `getUpdates` call
    ///
    /// Saturates at `i64::MAX`; the dedup cache absorbs the repeated update.
    #[must_use]
    pub fn next_offset(&self) -> Option<i64> {
        self.last_update_id.map(|id| id.saturating_add(1))
    }

    /// Move the cursor forward to `update_id`; never moves it back
    pub fn advance(&mut self, update_id: i64) {
        if self.last_update_id.is_none_or(|last| update_id > last) {
            self.last_update_id = Some(update_id);
        }
    }
}

/// Counts for one processed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Entries returned by the fetch
    pub received: usize,
    /// Updates that normalized and reached the dispatcher
    pub dispatched: usize,
    /// Dispatched updates that produced a reply
    pub sent: usize,
}

/// Result of one fetch-and-process iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Batch fetched and processed
    Batch(BatchSummary),
    /// Fetch failed; cursor untouched
    FetchFailed,
}

/// Sequential polling worker
///
/// One instance per bot token: two pollers sharing a token race on the
/// offset.
pub struct Poller<S> {
    source: S,
    dispatcher: Arc<Dispatcher>,
    config: PollingConfig,
    cursor: PollCursor,
}

impl<S: UpdateSource> Poller<S> {
    /// Create a poller with an empty cursor
    #[must_use]
    pub fn new(source: S, dispatcher: Arc<Dispatcher>, config: PollingConfig) -> Self {
        Self {
            source,
            dispatcher,
            config,
            cursor: PollCursor::default(),
        }
    }

    /// Current cursor
    #[must_use]
    pub const fn cursor(&self) -> PollCursor {
        self.cursor
    }

    /// Fetch one batch from the current cursor
    async fn fetch(&self) -> Option<Vec<serde_json::Value>> {
        let offset = self.cursor.next_offset();
        match self.source.fetch(offset, self.config.long_poll_timeout).await {
            Ok(updates) => Some(updates),
            Err(e) => {
                tracing::warn!(?offset, error = %e, "Telegram getUpdates failed");
                None
            }
        }
    }

    /// Process a fetched batch in received order
    ///
    /// The cursor advances past each update before it is dispatched, so a
    /// failed dispatch is never fetched again.
    pub async fn process_batch(&mut self, updates: Vec<serde_json::Value>) -> BatchSummary {
        let mut summary = BatchSummary {
            received: updates.len(),
            ..BatchSummary::default()
        };

        for raw in updates {
            let Some(update_id) = raw.get("update_id").and_then(serde_json::Value::as_i64) else {
                tracing::debug!("skipping update without update_id");
                continue;
            };
            self.cursor.advance(update_id);

            let Some(update) = normalize(&raw) else {
                tracing::debug!(update_id, "ignoring update without usable text");
                continue;
            };

            summary.dispatched += 1;
            if self.dispatcher.dispatch(update).await == DispatchResult::Sent {
                summary.sent += 1;
            }
        }

        summary
    }

    /// Run one fetch-and-process iteration
    pub async fn poll_once(&mut self) -> PollOutcome {
        match self.fetch().await {
            Some(updates) => PollOutcome::Batch(self.process_batch(updates).await),
            None => PollOutcome::FetchFailed,
        }
    }

    /// Poll until `shutdown` flips to `true` (or its sender is dropped)
    ///
    /// Shutdown interrupts a pending fetch or sleep; a batch already being
    /// processed runs to completion. Returns the final cursor.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PollCursor {
        tracing::info!("Telegram polling started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let fetched = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                fetched = self.fetch() => fetched,
            };

            let pause = match fetched {
                Some(updates) => {
                    let summary = self.process_batch(updates).await;
                    if summary.received > 0 {
                        tracing::debug!(
                            received = summary.received,
                            dispatched = summary.dispatched,
                            sent = summary.sent,
                            cursor = ?self.cursor.last_update_id(),
                            "processed Telegram batch"
                        );
                    }
                    self.config.interval
                }
                None => self.config.backoff,
            };

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!(cursor = ?self.cursor.last_update_id(), "Telegram polling stopped");
        self.cursor
    }
}
