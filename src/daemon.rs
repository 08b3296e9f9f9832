//! Gateway daemon: wires storage, dispatch and both ingress paths

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::api::{self, ApiState};
use crate::channels::{Poller, TelegramClient};
use crate::config::{Config, Mode};
use crate::db::{self, DbPool, TriggerRepo};
use crate::dispatch::Dispatcher;
use crate::{Error, Result};

/// Trigger gateway daemon
pub struct Daemon {
    config: Config,
    db: DbPool,
    telegram: TelegramClient,
    dispatcher: Arc<Dispatcher>,
}

impl Daemon {
    /// Open the database and build the dispatch pipeline
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or the HTTP client
    /// cannot be built
    pub fn new(config: Config) -> Result<Self> {
        let db = db::open(&config.database)?;
        let telegram = TelegramClient::new(&config.telegram)?;

        let store = Arc::new(TriggerRepo::new(db.clone()));
        let dispatcher = Arc::new(
            Dispatcher::new(store, Arc::new(telegram.clone()))
                .with_lookup_timeout(config.lookup_timeout),
        );

        Ok(Self {
            config,
            db,
            telegram,
            dispatcher,
        })
    }

    /// Run until Ctrl+C
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to listen for Ctrl+C");
                    // Keep the sender alive so receivers don't read a closed channel as shutdown
                    std::future::pending::<()>().await;
                }
            }
        });

        let addr = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;
        tracing::info!(port = self.config.port, "API server listening");

        self.run_until(listener, shutdown_rx).await
    }

    /// Run on `listener` until `shutdown` flips to `true`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails
    pub async fn run_until(
        self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mode = self.config.mode;
        tracing::info!(?mode, "starting trigger gateway");

        self.register_webhook(mode).await;

        let poller = if mode.polling_enabled() {
            let poller = Poller::new(
                self.telegram.clone(),
                Arc::clone(&self.dispatcher),
                self.config.polling,
            );
            Some(tokio::spawn(poller.run(shutdown.clone())))
        } else {
            None
        };

        let state = Arc::new(ApiState {
            db: self.db.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            webhook_secret: if mode.webhook_enabled() {
                self.config.telegram.webhook_secret.clone()
            } else {
                None
            },
        });

        let mut server_shutdown = shutdown;
        let served = api::serve(listener, state, async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await;

        if let Some(handle) = poller {
            match handle.await {
                Ok(cursor) => {
                    tracing::debug!(last_update_id = ?cursor.last_update_id(), "poller joined");
                }
                Err(e) => tracing::error!(error = %e, "Telegram poller task failed"),
            }
        }

        tracing::info!("daemon stopped");
        served
    }

    /// Point Telegram at the right ingress
    ///
    /// Pure webhook mode registers `WEBHOOK_URL` when configured; pure
    /// polling mode removes any webhook so `getUpdates` is not refused. Both
    /// calls are best effort.
    async fn register_webhook(&self, mode: Mode) {
        match mode {
            Mode::Webhook => {
                let Some(url) = self.config.telegram.webhook_url.as_deref() else {
                    tracing::info!("WEBHOOK_URL not set, assuming the webhook is registered externally");
                    return;
                };
                if let Err(e) = self
                    .telegram
                    .set_webhook(url, self.config.telegram.webhook_secret.as_ref())
                    .await
                {
                    tracing::error!(error = %e, "failed to register Telegram webhook");
                }
            }
            Mode::Polling => {
                if let Err(e) = self.telegram.delete_webhook().await {
                    tracing::warn!(error = %e, "failed to delete Telegram webhook before polling");
                }
            }
            Mode::Both => {
                tracing::warn!(
                    "running webhook and polling together; Telegram refuses getUpdates while a webhook is registered"
                );
            }
        }
    }
}
