//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;
use trigger_gateway::api::ApiState;
use trigger_gateway::{DbPool, Dispatcher, MessageSender, TriggerRepo, db};

/// Secret the test router expects in the webhook header
pub const TEST_SECRET: &str = "test-secret";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Store a trigger in the test database
pub fn create_test_trigger(db: &DbPool, trigger: &str, response: &str) -> trigger_gateway::Trigger {
    TriggerRepo::new(db.clone())
        .insert(trigger, response)
        .expect("failed to create test trigger")
}

/// Sender that records every message instead of calling Telegram
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(i64, String)>>,
    fail: bool,
}

impl RecordingSender {
    /// A sender whose deliveries all fail
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    /// Messages sent so far, as `(chat_id, text)`
    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, chat_id: i64, text: &str) -> bool {
        self.sent.lock().await.push((chat_id, text.to_string()));
        !self.fail
    }
}

/// Dispatcher backed by the test database and `sender`
#[must_use]
pub fn build_dispatcher(db: &DbPool, sender: Arc<RecordingSender>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        Arc::new(TriggerRepo::new(db.clone())),
        sender,
    ))
}

/// Build the API router with an optional webhook secret
#[must_use]
pub fn build_test_router(
    db: DbPool,
    dispatcher: Arc<Dispatcher>,
    secret: Option<&str>,
) -> axum::Router {
    let state = Arc::new(ApiState {
        db,
        dispatcher,
        webhook_secret: secret.map(|s| SecretString::from(s.to_string())),
    });
    trigger_gateway::api::router(state)
}

/// A Telegram text-message update
#[must_use]
pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id * 10,
            "date": 1_700_000_000,
            "chat": { "id": chat_id, "type": "private" },
            "from": { "id": chat_id, "is_bot": false, "first_name": "Test" },
            "text": text
        }
    })
}
