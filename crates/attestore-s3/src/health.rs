//! `/health`, `/health/ready`, `/health/live` — readiness and liveness
//! probes distinct enough for a load balancer or orchestrator to treat
//! "still booting" differently from "backend unreachable".

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct CheckResult {
    name: String,
    status: String,
    error: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    checks: Vec<CheckResult>,
    version: String,
    #[serde(rename = "uptimeSeconds")]
    uptime_seconds: u64,
    #[serde(rename = "startTime")]
    start_time: String,
    #[serde(rename = "checkedAt")]
    checked_at: String,
}

async fn run_checks(state: &AppState) -> Vec<CheckResult> {
    let meta_store = match state.meta_store.health_check().await {
        Ok(()) => CheckResult { name: "metastore".to_string(), status: "healthy".to_string(), error: None },
        Err(e) => CheckResult { name: "metastore".to_string(), status: "unhealthy".to_string(), error: Some(e.to_string()) },
    };
    let backend = match state.backend.health_check().await {
        Ok(()) => CheckResult { name: "backend".to_string(), status: "healthy".to_string(), error: None },
        Err(e) => CheckResult { name: "backend".to_string(), status: "unhealthy".to_string(), error: Some(e.to_string()) },
    };
    vec![meta_store, backend]
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let checks = run_checks(&state).await;
    let healthy = checks.iter().all(|c| c.status == "healthy");
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let body = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        checks,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        start_time: state.start_time.to_rfc3339(),
        checked_at: chrono::Utc::now().to_rfc3339(),
    };
    (status, Json(body))
}

pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let checks = run_checks(&state).await;
    if checks.iter().all(|c| c.status == "healthy") {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn health_live() -> impl IntoResponse {
    StatusCode::OK
}
