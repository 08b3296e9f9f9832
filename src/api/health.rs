//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggers: Option<i64>,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub database: CheckResult,
    pub webhook: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }

    fn unavailable() -> Self {
        Self {
            status: "unavailable",
            message: Some("not configured".to_string()),
        }
    }
}

/// Liveness check - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - can triggers be looked up?
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let db = state.db.clone();
    let (db_check, triggers) = tokio::task::spawn_blocking(move || check_database(&db))
        .await
        .unwrap_or_else(|e| (CheckResult::fail(format!("check failed: {e}")), None));

    let webhook_check = if state.webhook_secret.is_some() {
        CheckResult::ok()
    } else {
        CheckResult::unavailable()
    };

    let all_ok = db_check.status == "ok";

    let status = if all_ok { "ok" } else { "degraded" };
    let http_status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            triggers,
            checks: ReadinessChecks {
                database: db_check,
                webhook: webhook_check,
            },
        }),
    )
}

/// Check that the trigger table is readable, returning its row count
fn check_database(db: &crate::DbPool) -> (CheckResult, Option<i64>) {
    let conn = match db.get() {
        Ok(conn) => conn,
        Err(e) => return (CheckResult::fail(format!("connection failed: {e}")), None),
    };

    match conn.query_row("SELECT COUNT(*) FROM triggers", [], |row| row.get(0)) {
        Ok(count) => (CheckResult::ok(), Some(count)),
        Err(e) => (CheckResult::fail(format!("query failed: {e}")), None),
    }
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
