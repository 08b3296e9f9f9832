//! HTTP API server for the trigger gateway

pub mod health;
pub mod webhooks;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::db::DbPool;
use crate::dispatch::Dispatcher;
use crate::{Error, Result};

/// Shared state for HTTP handlers
pub struct ApiState {
    /// Trigger database, checked by `/ready`
    pub db: DbPool,

    /// Dispatch engine fed by the webhook
    pub dispatcher: Arc<Dispatcher>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token`; `None` rejects every
    /// webhook request
    pub webhook_secret: Option<SecretString>,
}

/// Build the full router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(webhooks::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already bound listener until `shutdown` resolves
///
/// # Errors
///
/// Returns error if the server fails
pub async fn serve<F>(listener: TcpListener, state: Arc<ApiState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Config(format!("API server error: {e}")))?;

    tracing::info!("API server stopped");
    Ok(())
}
