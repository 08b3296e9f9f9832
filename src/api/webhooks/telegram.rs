//! Telegram webhook handler
//!
//! After the secret check every request is answered `200 ok`: Telegram
//! retries non-2xx deliveries, and a retried update would fire its trigger
//! again.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::api::ApiState;
use crate::channels::normalize;
use crate::security::verify_secret;

/// Header carrying the secret registered with `setWebhook`
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

const OK: (StatusCode, &str) = (StatusCode::OK, "ok");
const FORBIDDEN: (StatusCode, &str) = (StatusCode::FORBIDDEN, "forbidden");

/// Handle an incoming Telegram update
///
/// The body is taken as raw bytes so malformed JSON is acknowledged rather
/// than rejected by an extractor.
pub async fn handle_update(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let Some(expected) = state.webhook_secret.as_ref() else {
        tracing::warn!("Telegram webhook called but no secret is configured");
        return FORBIDDEN;
    };

    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !verify_secret(expected, provided) {
        tracing::warn!("Telegram webhook secret mismatch");
        return FORBIDDEN;
    }

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unparseable Telegram webhook body");
            return OK;
        }
    };

    let Some(update) = normalize(&raw) else {
        tracing::debug!("ignoring Telegram update without usable text");
        return OK;
    };

    tracing::debug!(chat_id = update.chat_id, update_id = ?update.update_id, "received Telegram update");

    // Dispatch on its own task so a panic surfaces as a JoinError, not a dropped connection
    let dispatcher = Arc::clone(&state.dispatcher);
    if let Err(e) = tokio::spawn(async move { dispatcher.dispatch(update).await }).await {
        tracing::error!(error = %e, "Telegram dispatch task failed");
    }

    OK
}
