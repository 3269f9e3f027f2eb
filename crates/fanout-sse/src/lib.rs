//! # Fanout SSE
//!
//! Server-Sent Events fan-out for long-lived streaming clients.
//!
//! ## Features
//!
//! - **Hub actor**: a single task owns the client registry; producers talk to
//!   it only through an ordered mailbox, so no lock guards the registry
//! - **Targeted and broadcast delivery**: `notify` one client or `broadcast`
//!   to every registered client
//! - **Backpressure**: each client has a small bounded event channel; a slow
//!   consumer parks the hub until it catches up
//! - **Stream loop**: writes SSE frames, enforces an idle timeout, emits
//!   `connected`/`closing` lifecycle events and optional keep-alives
//! - **Metrics**: optional Prometheus gauge, histogram and counter per client
//!
//! ## Example
//!
//! ```rust,no_run
//! use fanout_sse::{Event, Hub, SseConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), fanout_sse::SseError> {
//! let hub = Hub::new(SseConfig::default());
//!
//! // Register a client; dropping the connection unsubscribes it.
//! let connection = hub.connect(Some("alice".to_string())).await;
//!
//! // Pump its events into any async writer.
//! let mut sink = tokio::io::sink();
//! let stream = tokio::spawn(async move {
//!     let fanout_sse::Connection { receiver, subscription } = connection;
//!     let result = fanout_sse::stream::run(receiver, &mut sink, CancellationToken::new(), None).await;
//!     drop(subscription);
//!     result
//! });
//!
//! hub.notify("alice", Event::new("push", r#"{"ref":"main"}"#)).await;
//! hub.broadcast(Event::new("announcement", "maintenance at noon")).await;
//!
//! // Every stream receives `closing` and ends.
//! hub.close().await;
//! # let _ = stream.await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Wire format
//!
//! ```text
//! id: 42
//! event: push
//! data: {"ref":"main"}
//!
//! ```
//!
//! ## Architecture
//!
//! ```text
//! producers ──notify/broadcast/subscribe/unsubscribe──► mailbox
//!                                                          │
//!                                              ┌───────────▼──────────┐
//!                                              │       HubActor       │
//!                                              │  client_id -> Client │
//!                                              └───────────┬──────────┘
//!                                          event channel   │   done signal
//!                                              ┌───────────▼──────────┐
//!                                              │  stream loop (1/conn)│──► wire
//!                                              └──────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod hub;
pub mod metrics;
pub mod stream;

// Re-export main types
pub use client::{create_client, Client, ClientId, ClientReceiver};
pub use config::{MetricsConfig, SseConfig};
pub use error::SseError;
pub use event::{Event, EVENT_CLOSING, EVENT_CONNECTED, KEEP_ALIVE_FRAME};
pub use hub::{Connection, Hub, HubStats, RoutingMessage, Subscription, Target};
pub use metrics::HubMetrics;
pub use stream::StreamEnd;
