//! End-to-end tests for the HTTP surface: publishing, streaming, metrics.

use axum::{
    body::{Body, BodyDataStream},
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use fanout_node::api::{create_router, AppState};
use fanout_node::sse_api::stream_events;
use fanout_sse::{Hub, MetricsConfig, SseConfig};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

const BOUND: Duration = Duration::from_secs(5);

fn test_config() -> SseConfig {
    SseConfig {
        keep_alive_ms: 0,
        ..SseConfig::default()
    }
}

fn create_test_app(config: SseConfig) -> (Hub, Router) {
    let hub = Hub::new(config);
    let app = create_router(AppState::new(hub.clone()));
    (hub, app)
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn publish(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Read from the body until `buffer` contains `needle`.
async fn read_until(stream: &mut BodyDataStream, buffer: &mut String, needle: &str) {
    tokio::time::timeout(BOUND, async {
        while !buffer.contains(needle) {
            let chunk = stream.next().await.unwrap().unwrap();
            buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_health_check() {
    let (_hub, app) = create_test_app(test_config());

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_publish_validation() {
    let (_hub, app) = create_test_app(test_config());

    let response = app
        .clone()
        .oneshot(publish("/api/events", json!({"event": "", "data": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("event name"));

    let response = app
        .clone()
        .oneshot(publish("/api/events", json!({"event": "push", "data": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Unknown client: accepted and dropped.
    let response = app
        .oneshot(publish("/api/events/nobody", json!({"event": "push"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let (_hub, app) = create_test_app(test_config());

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "metrics are disabled");
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (hub, app) = create_test_app(SseConfig {
        metrics: MetricsConfig {
            enabled: true,
            namespace: "fanout".to_string(),
            version: "1.2.3".to_string(),
        },
        ..test_config()
    });

    let _connection = hub.connect(Some("alice".to_string())).await;
    hub.client_ids().await;

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("fanout_http_sse_clients_count"));
    assert!(text.contains(r#"client="alice""#));
    assert!(text.contains(r#"version="1.2.3""#));
}

#[tokio::test]
async fn test_sse_stream_lifecycle() {
    let (hub, app) = create_test_app(test_config());

    let response = app
        .clone()
        .oneshot(get_request("/events/alice"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let mut stream = response.into_body().into_data_stream();
    let mut received = String::new();
    read_until(&mut stream, &mut received, "event: connected\ndata: alice\n\n").await;

    let response = app
        .clone()
        .oneshot(publish(
            "/api/events/alice",
            json!({"event": "push", "data": {"ref": "main"}, "id": "1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    read_until(
        &mut stream,
        &mut received,
        "id: 1\nevent: push\ndata: {\"ref\":\"main\"}\n\n",
    )
    .await;

    let response = app.oneshot(get_request("/api/clients")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["clients"], json!(["alice"]));
    assert_eq!(body["stats"]["current_clients"], 1);

    tokio::time::timeout(BOUND, hub.close()).await.unwrap();
    read_until(&mut stream, &mut received, "event: closing\ndata: alice\n\n").await;

    let end = tokio::time::timeout(BOUND, stream.next()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_dropped_body_unsubscribes() {
    let (hub, app) = create_test_app(test_config());

    let response = app.oneshot(get_request("/events/bob")).await.unwrap();
    let mut stream = response.into_body().into_data_stream();
    let mut received = String::new();
    read_until(&mut stream, &mut received, "data: bob\n\n").await;
    assert!(hub.contains("bob").await);

    drop(stream);

    tokio::time::timeout(BOUND, async {
        while hub.contains("bob").await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(hub.stats().total_unsubscribes, 1);
}

#[tokio::test]
async fn test_generated_client_id() {
    let (hub, app) = create_test_app(test_config());

    let response = app.oneshot(get_request("/events")).await.unwrap();
    let mut stream = response.into_body().into_data_stream();
    let mut received = String::new();
    read_until(&mut stream, &mut received, "\n\n").await;

    let ids = hub.client_ids().await;
    assert_eq!(ids.len(), 1);
    assert_eq!(
        received,
        format!("event: connected\ndata: {}\n\n", ids[0])
    );
}

#[tokio::test]
async fn test_handler_without_middleware_fails() {
    let hub = Hub::new(test_config());
    let app = Router::new()
        .route("/raw", get(stream_events))
        .with_state(AppState::new(hub));

    let response = app.oneshot(get_request("/raw")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("not found"));
}
