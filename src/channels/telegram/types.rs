//! Telegram Bot API request/response types

use serde::{Deserialize, Serialize};

/// Update kinds requested from Telegram
pub(crate) const ALLOWED_UPDATES: &[&str] = &["message"];

/// Telegram sendMessage request
#[derive(Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

/// Telegram getUpdates request
#[derive(Serialize)]
pub(crate) struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

/// Telegram setWebhook request
#[derive(Serialize)]
pub(crate) struct SetWebhookRequest<'a> {
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<&'a str>,
    pub allowed_updates: &'static [&'static str],
}

/// Envelope wrapping every Bot API response
#[derive(Debug, Deserialize)]
pub(crate) struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}
