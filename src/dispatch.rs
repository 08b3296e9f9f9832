//! Trigger dispatch engine
//!
//! Takes a normalized [`Update`], looks up the matching trigger and sends its
//! response. Nothing here returns an error to the ingress: every outcome is a
//! [`DispatchResult`], logged once at this boundary.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::Result;
use crate::channels::{MessageSender, Update, UpdateDedup};
use crate::db::{Trigger, TriggerRepo, casefold};

/// Read access to stored triggers
pub trait TriggerStore: Send + Sync + 'static {
    /// Find the trigger whose casefolded text equals `key`
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    fn find_by_casefolded_text(&self, key: &str) -> Result<Option<Trigger>>;
}

impl TriggerStore for TriggerRepo {
    fn find_by_casefolded_text(&self, key: &str) -> Result<Option<Trigger>> {
        Self::find_by_casefolded_text(self, key)
    }
}

/// Outcome of a trigger lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// A trigger matched
    Found(Trigger),
    /// No trigger matched
    NotFound,
    /// The store failed or timed out
    TransientError(String),
}

/// Outcome of dispatching one update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// No trigger matched; nothing sent
    NotMatched,
    /// Trigger matched and the response was delivered
    Sent,
    /// Trigger matched but delivery failed
    SendFailed,
    /// The trigger store could not be queried
    LookupFailed,
    /// Update ID already dispatched recently
    Duplicate,
}

impl DispatchResult {
    /// Short label for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotMatched => "not_matched",
            Self::Sent => "sent",
            Self::SendFailed => "send_failed",
            Self::LookupFailed => "lookup_failed",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Default upper bound for one trigger lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Dispatch engine shared by both ingress paths
pub struct Dispatcher {
    store: Arc<dyn TriggerStore>,
    sender: Arc<dyn MessageSender>,
    lookup_timeout: Duration,
    dedup: Mutex<UpdateDedup>,
}

impl Dispatcher {
    /// Create a dispatcher over a trigger store and an outbound sender
    #[must_use]
    pub fn new(store: Arc<dyn TriggerStore>, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            store,
            sender,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            dedup: Mutex::new(UpdateDedup::default()),
        }
    }

    /// Override the lookup timeout
    #[must_use]
    pub const fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Replace the dedup cache
    #[must_use]
    pub fn with_dedup(mut self, dedup: UpdateDedup) -> Self {
        self.dedup = Mutex::new(dedup);
        self
    }

    /// Look up the trigger for `text`
    ///
    /// The store query runs on the blocking pool under `lookup_timeout`; a
    /// store error, a panicked query or a timeout all become
    /// [`LookupOutcome::TransientError`].
    pub async fn lookup(&self, text: &str) -> LookupOutcome {
        let store = Arc::clone(&self.store);
        let key = casefold(text);
        let query = tokio::task::spawn_blocking(move || store.find_by_casefolded_text(&key));

        match tokio::time::timeout(self.lookup_timeout, query).await {
            Ok(Ok(Ok(Some(trigger)))) => LookupOutcome::Found(trigger),
            Ok(Ok(Ok(None))) => LookupOutcome::NotFound,
            Ok(Ok(Err(e))) => LookupOutcome::TransientError(e.to_string()),
            Ok(Err(e)) => LookupOutcome::TransientError(format!("lookup task failed: {e}")),
            Err(_) => LookupOutcome::TransientError(format!(
                "lookup timed out after {}ms",
                self.lookup_timeout.as_millis()
            )),
        }
    }

    /// Dispatch one update
    ///
    /// Sends the matching trigger's response to the update's chat, at most
    /// once per `update_id`.
    pub async fn dispatch(&self, update: Update) -> DispatchResult {
        if let Some(update_id) = update.update_id
            && self.is_duplicate(update_id)
        {
            tracing::debug!(update_id, chat_id = update.chat_id, "duplicate update, skipping");
            return DispatchResult::Duplicate;
        }

        let result = match self.lookup(&update.text).await {
            LookupOutcome::NotFound => DispatchResult::NotMatched,
            LookupOutcome::TransientError(error) => {
                tracing::warn!(
                    chat_id = update.chat_id,
                    update_id = ?update.update_id,
                    %error,
                    "trigger lookup failed"
                );
                DispatchResult::LookupFailed
            }
            LookupOutcome::Found(trigger) => {
                tracing::debug!(trigger_id = trigger.id, chat_id = update.chat_id, "trigger matched");
                if self.sender.send(update.chat_id, &trigger.response_text).await {
                    DispatchResult::Sent
                } else {
                    DispatchResult::SendFailed
                }
            }
        };

        tracing::info!(
            chat_id = update.chat_id,
            update_id = ?update.update_id,
            result = result.as_str(),
            "dispatched update"
        );
        result
    }

    fn is_duplicate(&self, update_id: i64) -> bool {
        self.dedup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_duplicate(update_id)
    }
}
