//! Router-level tests: status codes, headers and bodies without a socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use palette_server::lifecycle::build_service;
use palette_server::palette::{ConfigService, ConfigStore, DurableStore, Snapshot, StorageError};
use palette_server::HttpServer;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

fn router_with(config: palette_server::ServerConfig) -> Router {
    let service = build_service(&config).unwrap();
    HttpServer::new(config, service).router()
}

fn router() -> Router {
    router_with(common::test_config(Duration::from_millis(300)))
}

fn post_colors(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/colors")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_read_returns_default_with_headers() {
    let response = router().oneshot(get("/colors")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-config-version"), Some("1"));
    assert_eq!(header_str(&response, "x-wait-outcome"), Some("immediate"));
    assert_eq!(header_str(&response, "cache-control"), Some("no-store"));
    assert_eq!(header_str(&response, "x-content-type-options"), Some("nosniff"));
    assert!(header_str(&response, "x-request-id").is_some());

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(
        body,
        json!({
            "colors": ["FFFFFF", "FF00FF"],
            "display_duration_ms": 1000,
            "fadeout_duration_ms": 1000,
        })
    );
}

#[tokio::test]
async fn test_caller_request_id_is_echoed() {
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(header_str(&response, "x-request-id"), Some("abc-123"));
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let app = router();

    let response = app
        .clone()
        .oneshot(post_colors(
            r#"{"colors":["00ff00","0000FF"],"display_duration_ms":250,"fadeout_duration_ms":0}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-config-version"), Some("2"));

    let response = app.oneshot(get("/colors")).await.unwrap();
    assert_eq!(header_str(&response, "x-config-version"), Some("2"));
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["colors"], json!(["00FF00", "0000FF"]));
    assert_eq!(body["display_duration_ms"], 250);
    assert_eq!(body["fadeout_duration_ms"], 0);
}

#[tokio::test]
async fn test_rejections_map_to_bad_request() {
    let cases = [
        ("not json", "Could not parse body as JSON."),
        (
            r#"{"colors":["FFFFFF"],"display_duration_ms":100}"#,
            "Expected key missing: fadeout_duration_ms",
        ),
        (
            r#"{"colors":["FFFFFF"],"display_duration_ms":"100","fadeout_duration_ms":100}"#,
            "display_duration_ms must be an integer.",
        ),
        (
            r#"{"colors":["FFFFFF"],"display_duration_ms":100,"fadeout_duration_ms":100,"extra":1}"#,
            "Unexpected key: extra",
        ),
        (
            r#"{"colors":["FFFFFF"],"display_duration_ms":4001,"fadeout_duration_ms":100}"#,
            "'display_duration_ms' must be in the range [0, 4000]. Received: 4001",
        ),
        (
            r#"{"colors":["ABCDEF"],"display_duration_ms":100,"fadeout_duration_ms":100}"#,
            "Unrecognized color: ABCDEF",
        ),
    ];

    let app = router();
    for (body, expected) in cases {
        let response = app.clone().oneshot(post_colors(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert!(header_str(&response, "x-config-version").is_none());
        let text = body_text(response).await;
        assert_eq!(text.trim_end(), expected, "body: {body}");
        assert_eq!(text.lines().count(), 1);
    }

    let response = app.oneshot(get("/colors")).await.unwrap();
    assert_eq!(header_str(&response, "x-config-version"), Some("1"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = common::test_config(Duration::from_millis(300));
    config.security.max_body_size = 64;
    let app = router_with(config);

    let padding = " ".repeat(128);
    let body = format!(
        r#"{{"colors":["FFFFFF"],"display_duration_ms":1,"fadeout_duration_ms":1}}{padding}"#
    );
    let response = app.oneshot(post_colors(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_hanging_read_times_out_via_router() {
    let response = router()
        .oneshot(get("/colors?hang=1&baseline=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-config-version"), Some("1"));
    assert_eq!(header_str(&response, "x-wait-outcome"), Some("timeout"));
}

#[tokio::test]
async fn test_baseline_header_is_honored() {
    let app = router();
    app.clone()
        .oneshot(post_colors(
            r#"{"colors":["000000"],"display_duration_ms":1,"fadeout_duration_ms":1}"#,
        ))
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/colors?hang=true")
        .header("x-config-version", "1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(header_str(&response, "x-config-version"), Some("2"));
    assert_eq!(header_str(&response, "x-wait-outcome"), Some("immediate"));
}

#[tokio::test]
async fn test_limits_and_status() {
    let app = router();

    let response = app.clone().oneshot(get("/limits")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let limits: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(limits["min_colors"], 1);
    assert_eq!(limits["max_colors"], 10);
    assert_eq!(limits["max_duration_ms"], 4000);
    assert_eq!(limits["supported_colors"].as_array().unwrap().len(), 8);

    let response = app.oneshot(get("/status")).await.unwrap();
    let status: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(status["version"], 1);
    assert_eq!(status["pending_waiters"], 0);
    assert_eq!(status["max_wait_ms"], 300);
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let app = router();
    let response = app.clone().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let request = Request::builder()
        .method("DELETE")
        .uri("/colors")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

/// Backend whose saves take a long time once switched to slow mode.
#[derive(Default)]
struct SlowStore {
    record: Mutex<Option<Snapshot>>,
    slow: AtomicBool,
}

impl DurableStore for SlowStore {
    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        Ok(self.record.lock().unwrap().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if self.slow.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(800));
        }
        *self.record.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_save_does_not_stall_other_requests() {
    let durable = Arc::new(SlowStore::default());
    let store = Arc::new(ConfigStore::open(durable.clone()).unwrap());
    let config = common::test_config(Duration::from_millis(300));
    let service = Arc::new(ConfigService::new(store, config.service_policy()));
    let app = HttpServer::new(config, service).router();
    durable.slow.store(true, Ordering::SeqCst);

    let started = Instant::now();
    let write = tokio::spawn(app.clone().oneshot(post_colors(
        r#"{"colors":["000000"],"display_duration_ms":1,"fadeout_duration_ms":1}"#,
    )));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(!write.is_finished());

    let response = write.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-config-version"), Some("2"));
}

#[tokio::test]
async fn test_malformed_baseline_is_bad_request() {
    let app = router();

    let response = app
        .clone()
        .oneshot(get("/colors?hang=1&baseline=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_text(response).await.trim_end(),
        "baseline must be a version number. Received: abc"
    );

    let request = Request::builder()
        .uri("/colors?hang=1")
        .header("x-config-version", "abc")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_text(response).await.trim_end(),
        "baseline must be a version number. Received: abc"
    );
}
