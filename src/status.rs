use crate::target::{format_timestamp, Target, TargetRegistry, TargetStatus};
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Local;
use serde::Serialize;
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub timestamp: String,
    pub servers: Vec<ServerStatus>,
}

#[derive(Debug, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub url: String,
    pub status: TargetStatus,
    #[serde(rename = "lastNotified", skip_serializing_if = "Option::is_none")]
    pub last_notified: Option<String>,
    #[serde(rename = "consecutiveFailures")]
    pub consecutive_failures: u32,
}

impl From<&Target> for ServerStatus {
    fn from(target: &Target) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            status: target.status(),
            last_notified: target.last_notified.as_ref().map(format_timestamp),
            consecutive_failures: target.consecutive_failures,
        }
    }
}

impl StatusResponse {
    pub fn from_targets(targets: &[Target]) -> Self {
        Self {
            timestamp: format_timestamp(&Local::now()),
            servers: targets.iter().map(ServerStatus::from).collect(),
        }
    }
}

async fn status_handler(State(targets): State<TargetRegistry>) -> Json<StatusResponse> {
    let snapshot = targets.snapshot().await;
    Json(StatusResponse::from_targets(&snapshot))
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Read-only routes over the shared registry.
pub fn router(targets: TargetRegistry) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(targets)
}
