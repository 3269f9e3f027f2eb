//! Server-Sent Events endpoints.
//!
//! - `/events` - stream with a generated client ID
//! - `/events/{id}` - stream under a caller-chosen client ID
//!
//! Registration happens in [`register_client`], a route layer that runs
//! before the handler. It stores the subscribed client in the request
//! extensions; [`SseClient`] takes it back out. If the handler never takes
//! it, the stored subscription guard unsubscribes when the request ends.

use axum::{
    body::Body,
    extract::{rejection::PathRejection, FromRequestParts, Path, Request, State},
    http::{header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use fanout_sse::{stream, Connection, SseError};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{debug, info, warn};

use crate::api::{ApiError, AppState};

/// In-memory pipe capacity between the stream loop and the response body.
const PIPE_CAPACITY: usize = 8 * 1024;

/// Create the SSE routes.
pub fn sse_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/events", get(stream_events))
        .route("/events/{id}", get(stream_events))
        .route_layer(middleware::from_fn_with_state(state, register_client))
}

/// Per-request slot holding the registered client until the handler takes it.
#[derive(Clone)]
struct ClientSlot(Arc<Mutex<Option<Connection>>>);

/// Subscribe a client for this request and stash it in the extensions.
pub async fn register_client(
    State(state): State<AppState>,
    path: Result<Path<HashMap<String, String>>, PathRejection>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_id = path.ok().and_then(|Path(mut params)| params.remove("id"));
    let connection = state.hub.connect(client_id).await;
    info!(
        client_id = %connection.receiver.id,
        uri = %request.uri(),
        "SSE client registered"
    );

    request
        .extensions_mut()
        .insert(ClientSlot(Arc::new(Mutex::new(Some(connection)))));
    next.run(request).await
}

/// Extractor for the client registered by [`register_client`].
#[derive(Debug)]
pub struct SseClient(pub Connection);

impl<S> FromRequestParts<S> for SseClient
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let slot = parts
            .extensions
            .get::<ClientSlot>()
            .ok_or(SseError::ClientNotFound)?;
        let connection = slot.0.lock().take().ok_or(SseError::ClientTaken)?;
        Ok(SseClient(connection))
    }
}

/// Stream the client's events as `text/event-stream`.
///
/// The stream loop runs in its own task and writes into an in-memory pipe
/// whose read half becomes the response body. Dropping the body (peer went
/// away) cancels the loop.
pub async fn stream_events(
    State(state): State<AppState>,
    SseClient(connection): SseClient,
) -> Response {
    let Connection {
        receiver,
        subscription,
    } = connection;
    let client_id = receiver.id.clone();
    let keep_alive = state.hub.config().keep_alive();

    let (reader, mut writer) = tokio::io::duplex(PIPE_CAPACITY);
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();

    tokio::spawn(async move {
        match stream::run(receiver, &mut writer, loop_cancel, keep_alive).await {
            Ok(end) => debug!(client_id = %client_id, end = ?end, "SSE stream ended"),
            Err(e) => warn!(client_id = %client_id, error = %e, "SSE stream failed"),
        }
        drop(subscription);
    });

    let guard = cancel.drop_guard();
    let body = ReaderStream::new(reader).map(move |chunk| {
        let _ = &guard;
        chunk
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
