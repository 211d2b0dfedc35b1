//! Health handlers.
//!
//! - GET /health           -> liveness; always 200, `success` reflects the store
//! - GET /health/database  -> deep store probe; 200 when healthy, 503 otherwise

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// `GET /health`
///
/// Runs `SELECT 1` and checks the `files` table. Store trouble is reported in
/// the body, never as a failed request.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.liveness().await;
    let healthy = report.is_healthy();

    let database = DatabaseStatus {
        status: if healthy {
            "connected"
        } else if report.store_reachable {
            "degraded"
        } else {
            "error"
        },
        message: report.detail,
        tables: healthy.then(|| vec!["files".to_string()]),
    };

    let body = HealthResponse {
        success: healthy,
        message: if healthy {
            "Server is running".into()
        } else {
            "Server running but database has issues".into()
        },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.info.started_at.elapsed().as_secs_f64(),
        environment: state.info.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
        database,
    };

    (StatusCode::OK, Json(body))
}

/// `GET /health/database`
///
/// Reports SQLite version, tables and the file count. HTTP 503 when any
/// probe fails; the failure text is only included outside production.
pub async fn health_database(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.database().await;
    let healthy = report.is_healthy();

    let body = DatabaseHealthResponse {
        success: healthy,
        message: if healthy {
            "Database health check successful"
        } else {
            "Database health check failed"
        },
        database: DatabaseInfo {
            reachable: report.store_reachable,
            version: report.version,
            tables: report.tables,
            file_count: report.record_count,
            path: state.info.database_url.clone(),
        },
        error: (!healthy && !state.info.is_production()).then_some(report.detail),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    message: String,
    timestamp: String,
    uptime: f64,
    environment: String,
    version: &'static str,
    database: DatabaseStatus,
}

#[derive(Serialize)]
struct DatabaseStatus {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tables: Option<Vec<String>>,
}

#[derive(Serialize)]
struct DatabaseHealthResponse {
    success: bool,
    message: &'static str,
    database: DatabaseInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseInfo {
    reachable: bool,
    version: Option<String>,
    tables: Vec<String>,
    file_count: Option<i64>,
    path: String,
}
