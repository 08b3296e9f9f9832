//! Raw Telegram Bot API calls

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use super::polling::UpdateSource;
use super::types::{
    ALLOWED_UPDATES, GetUpdatesRequest, SendMessageRequest, SetWebhookRequest, TelegramResponse,
};
use crate::channels::MessageSender;
use crate::config::TelegramConfig;
use crate::{Error, Result};

/// Extra time granted to a long poll beyond its server-side timeout
const LONG_POLL_MARGIN: Duration = Duration::from_secs(10);

/// Timeout for webhook management calls
const ADMIN_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    token: SecretString,
    api_base: String,
    client: Client,
    send_timeout: Duration,
}

impl TelegramClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("trigger-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            token: config.token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
            send_timeout: config.send_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token.expose_secret())
    }

    /// Call a Bot API method and unwrap its `result`
    ///
    /// Transport errors are stripped of their URL, which embeds the token.
    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram {method} error: {}", e.without_url())))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::Channel(format!("Telegram {method} read error: {}", e.without_url()))
        })?;

        if !status.is_success() {
            return Err(Error::Channel(format!(
                "Telegram {method} error: {status} - {body}"
            )));
        }

        let parsed: TelegramResponse<T> = serde_json::from_str(&body)
            .map_err(|e| Error::Channel(format!("Telegram {method} parse error: {e}")))?;

        if !parsed.ok {
            return Err(Error::Channel(format!(
                "Telegram {method} rejected: {}",
                parsed.description.unwrap_or_default()
            )));
        }

        parsed
            .result
            .ok_or_else(|| Error::Channel(format!("Telegram {method} returned no result")))
    }

    /// Send a plain-text message to a chat
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, timeout, non-success status or
    /// `ok: false`
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };
        let _: IgnoredAny = self.call("sendMessage", &request, self.send_timeout).await?;

        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    /// Fetch pending updates with a long poll
    ///
    /// Updates are returned undecoded so a single malformed entry cannot
    /// spoil the batch.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is not a valid
    /// update list
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        long_poll: Duration,
    ) -> Result<Vec<serde_json::Value>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: long_poll.as_secs(),
            allowed_updates: ALLOWED_UPDATES,
        };

        self.call("getUpdates", &request, long_poll + LONG_POLL_MARGIN)
            .await
    }

    /// Register the webhook URL with Telegram
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&SecretString>) -> Result<()> {
        let request = SetWebhookRequest {
            url,
            secret_token: secret_token.map(|s| s.expose_secret()),
            allowed_updates: ALLOWED_UPDATES,
        };
        let _: IgnoredAny = self.call("setWebhook", &request, ADMIN_CALL_TIMEOUT).await?;

        tracing::info!(url, "Telegram webhook set");
        Ok(())
    }

    /// Delete the webhook so `getUpdates` is accepted
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn delete_webhook(&self) -> Result<()> {
        let _: IgnoredAny = self
            .call("deleteWebhook", &serde_json::json!({}), ADMIN_CALL_TIMEOUT)
            .await?;

        tracing::info!("Telegram webhook deleted");
        Ok(())
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send(&self, chat_id: i64, text: &str) -> bool {
        match self.send_message(chat_id, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "failed to send Telegram message");
                false
            }
        }
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn fetch(
        &self,
        offset: Option<i64>,
        long_poll: Duration,
    ) -> Result<Vec<serde_json::Value>> {
        self.get_updates(offset, long_poll).await
    }
}
