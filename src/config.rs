//! Configuration management for the trigger gateway
//!
//! Everything is sourced from the environment. Required values that are
//! missing abort startup with [`Error::Config`].

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

/// Default Telegram Bot API host
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Which ingress paths the gateway runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// Pull updates with `getUpdates`
    #[default]
    Polling,
    /// Receive updates on `POST /telegram/webhook`
    Webhook,
    /// Run both ingress paths side by side
    Both,
}

impl Mode {
    /// Whether the webhook route accepts updates in this mode
    #[must_use]
    pub const fn webhook_enabled(self) -> bool {
        matches!(self, Self::Webhook | Self::Both)
    }

    /// Whether the polling loop runs in this mode
    #[must_use]
    pub const fn polling_enabled(self) -> bool {
        matches!(self, Self::Polling | Self::Both)
    }
}

/// Where the trigger database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// `SQLite` file on disk
    File(PathBuf),
    /// Private in-memory database
    Memory,
}

impl DatabaseLocation {
    /// Parse a `DATABASE_URL` value
    ///
    /// Accepts `sqlite:///relative.db`, `sqlite:////absolute.db`,
    /// `sqlite://path.db`, `:memory:` and bare file paths.
    ///
    /// # Errors
    ///
    /// Returns error for empty values and non-sqlite URL schemes
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Config("DATABASE_URL is empty".to_string()));
        }

        let path = url
            .strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
            .unwrap_or(url);

        if path == ":memory:" || path.is_empty() {
            return Ok(Self::Memory);
        }

        if path.contains("://") {
            return Err(Error::Config(format!(
                "unsupported DATABASE_URL scheme: {url}"
            )));
        }

        Ok(Self::File(PathBuf::from(path)))
    }
}

/// Telegram Bot API configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token
    pub token: SecretString,

    /// Shared secret expected in `X-Telegram-Bot-Api-Secret-Token`
    pub webhook_secret: Option<SecretString>,

    /// Public URL registered with `setWebhook` on startup
    pub webhook_url: Option<String>,

    /// API host, without the `/bot<token>` suffix
    pub api_base: String,

    /// Timeout for a single `sendMessage` call
    pub send_timeout: Duration,
}

/// Polling loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Long-poll timeout passed to `getUpdates`
    pub long_poll_timeout: Duration,

    /// Sleep between successful fetches
    pub interval: Duration,

    /// Sleep after a failed fetch
    pub backoff: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            long_poll_timeout: Duration::from_secs(30),
            interval: Duration::from_secs(1),
            backoff: Duration::from_secs(5),
        }
    }
}

/// Trigger gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Active ingress mode
    pub mode: Mode,

    /// HTTP listen port
    pub port: u16,

    /// Telegram settings
    pub telegram: TelegramConfig,

    /// Trigger database
    pub database: DatabaseLocation,

    /// Polling loop timing
    pub polling: PollingConfig,

    /// Upper bound for one trigger lookup
    pub lookup_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is invalid
    pub fn from_env(mode: Mode, port: u16) -> Result<Self> {
        Self::from_vars(mode, port, |key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is invalid
    pub fn from_vars<F>(mode: Mode, port: u16, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let token = non_empty("TELEGRAM_TOKEN")
            .or_else(|| non_empty("TELEGRAM_BOT_TOKEN"))
            .ok_or_else(|| Error::Config("TELEGRAM_TOKEN is not set".to_string()))?;

        let webhook_secret = non_empty("TELEGRAM_SECRET");
        if mode.webhook_enabled() && webhook_secret.is_none() {
            return Err(Error::Config(
                "TELEGRAM_SECRET must be set when the webhook is enabled".to_string(),
            ));
        }

        let database_url = non_empty("DATABASE_URL")
            .ok_or_else(|| Error::Config("DATABASE_URL is not set".to_string()))?;
        let database = DatabaseLocation::parse(&database_url)?;

        let api_base = non_empty("TELEGRAM_API_BASE")
            .map_or_else(|| DEFAULT_API_BASE.to_string(), |b| b.trim_end_matches('/').to_string());

        let polling = PollingConfig {
            long_poll_timeout: secs(&var, "POLL_TIMEOUT_SECS", 30)?,
            interval: secs(&var, "POLL_INTERVAL_SECS", 1)?,
            backoff: secs(&var, "POLL_BACKOFF_SECS", 5)?,
        };

        Ok(Self {
            mode,
            port,
            telegram: TelegramConfig {
                token: SecretString::from(token),
                webhook_secret: webhook_secret.map(SecretString::from),
                webhook_url: non_empty("WEBHOOK_URL"),
                api_base,
                send_timeout: secs(&var, "SEND_TIMEOUT_SECS", 10)?,
            },
            database,
            polling,
            lookup_timeout: Duration::from_millis(number(&var, "LOOKUP_TIMEOUT_MS", 2000)?),
        })
    }
}

fn number<F>(var: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    var(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
    })
}

fn secs<F>(var: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    number(var, key, default).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_polling_config_with_defaults() {
        let config = Config::from_vars(
            Mode::Polling,
            DEFAULT_PORT,
            vars(&[("TELEGRAM_TOKEN", "123:abc"), ("DATABASE_URL", "sqlite:///bot.db")]),
        )
        .unwrap();

        assert_eq!(config.telegram.token.expose_secret(), "123:abc");
        assert!(config.telegram.webhook_secret.is_none());
        assert_eq!(config.telegram.api_base, DEFAULT_API_BASE);
        assert_eq!(config.database, DatabaseLocation::File(PathBuf::from("bot.db")));
        assert_eq!(config.polling, PollingConfig::default());
        assert_eq!(config.lookup_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn missing_token_fails_fast() {
        let err = Config::from_vars(
            Mode::Polling,
            DEFAULT_PORT,
            vars(&[("DATABASE_URL", "bot.db")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_TOKEN"));
    }

    #[test]
    fn legacy_token_variable_is_accepted() {
        let config = Config::from_vars(
            Mode::Polling,
            DEFAULT_PORT,
            vars(&[("TELEGRAM_BOT_TOKEN", "t"), ("DATABASE_URL", "bot.db")]),
        )
        .unwrap();
        assert_eq!(config.telegram.token.expose_secret(), "t");
    }

    #[test]
    fn webhook_mode_requires_secret() {
        let env = [("TELEGRAM_TOKEN", "t"), ("DATABASE_URL", "bot.db")];

        let err = Config::from_vars(Mode::Webhook, DEFAULT_PORT, vars(&env)).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_SECRET"));

        let err = Config::from_vars(Mode::Both, DEFAULT_PORT, vars(&env)).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_SECRET"));
    }

    #[test]
    fn missing_database_url_fails_fast() {
        let err = Config::from_vars(Mode::Polling, DEFAULT_PORT, vars(&[("TELEGRAM_TOKEN", "t")]))
            .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = Config::from_vars(
            Mode::Polling,
            DEFAULT_PORT,
            vars(&[
                ("TELEGRAM_TOKEN", "t"),
                ("DATABASE_URL", "bot.db"),
                ("POLL_BACKOFF_SECS", "soon"),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("POLL_BACKOFF_SECS"));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let config = Config::from_vars(
            Mode::Webhook,
            DEFAULT_PORT,
            vars(&[
                ("TELEGRAM_TOKEN", "very-secret-token"),
                ("TELEGRAM_SECRET", "hook-secret"),
                ("DATABASE_URL", "bot.db"),
            ]),
        )
        .unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret-token"));
        assert!(!debug.contains("hook-secret"));
    }

    #[test]
    fn database_url_forms() {
        assert_eq!(
            DatabaseLocation::parse("sqlite:////var/lib/bot.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/var/lib/bot.db"))
        );
        assert_eq!(
            DatabaseLocation::parse("sqlite://data/bot.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("data/bot.db"))
        );
        assert_eq!(
            DatabaseLocation::parse("/tmp/bot.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/tmp/bot.db"))
        );
        assert_eq!(DatabaseLocation::parse(":memory:").unwrap(), DatabaseLocation::Memory);
        assert!(DatabaseLocation::parse("postgres://localhost/bot").is_err());
    }

    #[test]
    fn mode_flags() {
        assert!(Mode::Polling.polling_enabled());
        assert!(!Mode::Polling.webhook_enabled());
        assert!(Mode::Webhook.webhook_enabled());
        assert!(!Mode::Webhook.polling_enabled());
        assert!(Mode::Both.webhook_enabled() && Mode::Both.polling_enabled());
    }
}
