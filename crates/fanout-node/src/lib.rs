//! # Fanout Node
//!
//! HTTP service around the [`fanout_sse`] hub.
//!
//! ## Endpoints
//!
//! | Method | Path                | Description                          |
//! |--------|---------------------|--------------------------------------|
//! | GET    | `/events`           | SSE stream, generated client ID      |
//! | GET    | `/events/{id}`      | SSE stream, chosen client ID         |
//! | POST   | `/api/events`       | Broadcast an event                   |
//! | POST   | `/api/events/{id}`  | Send an event to one client          |
//! | GET    | `/api/clients`      | Registered clients and counters      |
//! | GET    | `/metrics`          | Prometheus exposition (if enabled)   |
//! | GET    | `/health`           | Liveness                             |
//!
//! ## Example
//!
//! ```rust,no_run
//! use fanout_node::api::{create_router, AppState};
//! use fanout_sse::{Hub, SseConfig};
//!
//! # async fn run() -> std::io::Result<()> {
//! let hub = Hub::new(SseConfig::default());
//! let app = create_router(AppState::new(hub));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await
//! # }
//! ```

pub mod api;
pub mod config;
pub mod logging;
pub mod sse_api;
