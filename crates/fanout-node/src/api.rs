//! HTTP API for the fanout node.
//!
//! Producers publish through `POST /api/events`; subscribers stream from the
//! routes in [`crate::sse_api`].

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fanout_sse::{ClientId, Event, Hub, HubStats, SseError};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::sse_api::sse_routes;

/// Content type of the Prometheus text exposition.
const METRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The broadcast hub.
    pub hub: Hub,
}

impl AppState {
    /// Wrap a running hub.
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }
}

/// API error types.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("sse error: {0}")]
    Sse(#[from] SseError),

    #[error("metrics are disabled")]
    MetricsDisabled,

    #[error("failed to encode metrics")]
    Encode(#[from] std::fmt::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MetricsDisabled => StatusCode::NOT_FOUND,
            ApiError::Sse(_) | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Request to publish an event.
///
/// String `data` is sent as-is; any other JSON value is sent serialized.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub retry: Option<u64>,
}

impl PublishRequest {
    fn into_event(self) -> Result<Event, ApiError> {
        if self.event.trim().is_empty() {
            return Err(ApiError::BadRequest("event name is required".to_string()));
        }

        let data = match self.data {
            serde_json::Value::String(text) => text,
            serde_json::Value::Null => String::new(),
            value => value.to_string(),
        };
        let mut event = Event::new(self.event, data);
        if let Some(id) = self.id {
            event = event.with_id(id);
        }
        if let Some(retry) = self.retry {
            event = event.with_retry(retry);
        }
        Ok(event)
    }
}

/// Registered clients and cumulative counters.
#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub clients: Vec<ClientId>,
    pub stats: HubStats,
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/clients", get(list_clients))
        .route("/api/events", post(broadcast_event))
        .route("/api/events/{id}", post(notify_event))
        .merge(sse_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus exposition of the hub metrics.
async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let metrics = state.hub.metrics().ok_or(ApiError::MetricsDisabled)?;
    let body = metrics.encode()?;
    Ok(([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response())
}

/// Lists registered clients.
async fn list_clients(State(state): State<AppState>) -> impl IntoResponse {
    let clients = state.hub.client_ids().await;
    Json(ClientsResponse {
        clients,
        stats: state.hub.stats(),
    })
}

/// Publishes an event to every client.
async fn broadcast_event(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<StatusCode, ApiError> {
    let event = req.into_event()?;
    debug!(event = %event.event, "Broadcast requested");
    state.hub.broadcast(event).await;
    Ok(StatusCode::ACCEPTED)
}

/// Publishes an event to one client.
async fn notify_event(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
    Json(req): Json<PublishRequest>,
) -> Result<StatusCode, ApiError> {
    let event = req.into_event()?;
    debug!(client_id = %client_id, event = %event.event, "Notify requested");
    state.hub.notify(client_id, event).await;
    Ok(StatusCode::ACCEPTED)
}
