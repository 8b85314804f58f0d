//! Tests for status and chaos endpoints
//!
//! Each test runs its own server on an ephemeral port with isolated
//! chaos state.

use super::*;
use crate::chaos::ChaosState;
use crate::clock::MockClock;
use crate::config::ServerConfig;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    chaos: ChaosState,
    client: reqwest::Client,
    controller: ShutdownController,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let clock = MockClock::new(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
        Self::start_with_clock(config, Arc::new(clock)).await
    }

    async fn start_with_clock(config: ServerConfig, clock: Arc<MockClock>) -> Self {
        let chaos = ChaosState::new();
        let state = AppState::with_clock(config, chaos.clone(), clock);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let (controller, signal) = shutdown_channel();
        let handle = tokio::spawn(run_server(listener, state, signal));

        Self {
            addr,
            chaos,
            client: reqwest::Client::new(),
            controller,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .expect("POST request failed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn blue_config() -> ServerConfig {
    ServerConfig {
        pool: "blue".to_string(),
        release_id: "blue-v1.0.0".to_string(),
        port: 0,
    }
}

async fn body(response: reqwest::Response) -> Value {
    response.json().await.expect("Response body is not JSON")
}

#[tokio::test]
async fn test_version_returns_metadata_and_headers() {
    let server = TestServer::start(blue_config()).await;

    let response = server.get("/version").await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[X_APP_POOL], "blue");
    assert_eq!(response.headers()[X_RELEASE_ID], "blue-v1.0.0");
    assert_eq!(
        body(response).await,
        json!({
            "version": "1.0.0",
            "pool": "blue",
            "releaseId": "blue-v1.0.0",
            "timestamp": "2025-01-02T03:04:05.000Z",
        })
    );
}

#[tokio::test]
async fn test_version_defaults_to_unknown_metadata() {
    let server = TestServer::start(ServerConfig::default()).await;

    let response = server.get("/version").await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[X_APP_POOL], "unknown");
    assert_eq!(response.headers()[X_RELEASE_ID], "unknown");
    let body = body(response).await;
    assert_eq!(body["pool"], "unknown");
    assert_eq!(body["releaseId"], "unknown");
}

#[tokio::test]
async fn test_version_timestamp_is_computed_per_request() {
    let clock = Arc::new(MockClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ));
    let server = TestServer::start_with_clock(blue_config(), clock.clone()).await;

    let first = body(server.get("/version").await).await;
    clock.advance(chrono::Duration::milliseconds(250));
    let second = body(server.get("/version").await).await;

    assert_eq!(first["timestamp"], "2025-06-01T12:00:00.000Z");
    assert_eq!(second["timestamp"], "2025-06-01T12:00:00.250Z");
}

#[tokio::test]
async fn test_version_returns_500_in_error_mode_until_stopped() {
    let server = TestServer::start(blue_config()).await;

    let started = server.post("/chaos/start?mode=error").await;
    assert_eq!(started.status(), 200);

    for _ in 0..3 {
        let response = server.get("/version").await;
        assert_eq!(response.status(), 500);
        assert!(response.headers().get(X_APP_POOL).is_none());
        assert_eq!(body(response).await, json!({"error": "Chaos mode: error"}));
    }

    server.post("/chaos/stop").await;

    let response = server.get("/version").await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_version_hangs_in_timeout_mode() {
    let server = TestServer::start(blue_config()).await;
    server.post("/chaos/start?mode=timeout").await;

    let result = server
        .client
        .get(server.url("/version"))
        .timeout(Duration::from_millis(300))
        .send()
        .await;

    let err = result.expect_err("Request should not receive a response");
    assert!(err.is_timeout(), "Expected a client timeout, got: {}", err);

    // Other endpoints keep responding while /version hangs
    let health = server.get("/healthz").await;
    assert_eq!(health.status(), 503);

    server.post("/chaos/stop").await;

    let response = server.get("/version").await;
    assert_eq!(response.status(), 200);
}

/// Stopping chaos does not release a request that is already hung
#[tokio::test]
async fn test_hung_request_stays_hung_after_stop() {
    let server = TestServer::start(blue_config()).await;
    server.post("/chaos/start?mode=timeout").await;

    let pending = server
        .client
        .get(server.url("/version"))
        .timeout(Duration::from_millis(600))
        .send();
    let pending = tokio::spawn(pending);

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.post("/chaos/stop").await;

    let result = pending.await.expect("Request task panicked");
    let err = result.expect_err("Hung request should not be answered");
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_unrecognised_mode_only_affects_healthz() {
    let server = TestServer::start(blue_config()).await;

    let started = server.post("/chaos/start?mode=anything-else").await;
    assert_eq!(
        body(started).await,
        json!({"chaos": "anything-else", "status": "started"})
    );

    let health = server.get("/healthz").await;
    assert_eq!(health.status(), 503);
    assert_eq!(
        body(health).await,
        json!({"status": "unhealthy", "chaos": "anything-else"})
    );

    let version = server.get("/version").await;
    assert_eq!(version.status(), 200);
    assert_eq!(version.headers()[X_APP_POOL], "blue");
}

#[tokio::test]
async fn test_healthz_healthy_without_chaos() {
    let server = TestServer::start(blue_config()).await;

    let response = server.get("/healthz").await;

    assert_eq!(response.status(), 200);
    assert_eq!(body(response).await, json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_stop_resets_health_for_every_mode() {
    let server = TestServer::start(blue_config()).await;

    for mode in ["error", "timeout", "custom"] {
        server.post(&format!("/chaos/start?mode={}", mode)).await;
        assert_eq!(server.get("/healthz").await.status(), 503);

        let stopped = server.post("/chaos/stop").await;
        assert_eq!(stopped.status(), 200);

        let response = server.get("/healthz").await;
        assert_eq!(response.status(), 200, "mode {} should be cleared", mode);
        assert_eq!(body(response).await, json!({"status": "healthy"}));
    }
}

#[tokio::test]
async fn test_start_defaults_mode_to_error() {
    let server = TestServer::start(blue_config()).await;

    let response = server.post("/chaos/start").await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        body(response).await,
        json!({"chaos": "error", "status": "started"})
    );
    assert_eq!(server.chaos.current().as_deref(), Some("error"));
}

#[tokio::test]
async fn test_start_with_empty_mode_defaults_to_error() {
    let server = TestServer::start(blue_config()).await;

    let response = server.post("/chaos/start?mode=").await;

    assert_eq!(
        body(response).await,
        json!({"chaos": "error", "status": "started"})
    );
    assert_eq!(server.get("/version").await.status(), 500);
}

#[tokio::test]
async fn test_start_accepts_any_query_string() {
    let server = TestServer::start(blue_config()).await;

    let response = server.post("/chaos/start?verbose=1&mode=first&mode=second").await;
    assert_eq!(response.status(), 200);
    assert_eq!(body(response).await["chaos"], "second");

    let response = server.post("/chaos/start?foo=bar").await;
    assert_eq!(response.status(), 200);
    assert_eq!(body(response).await["chaos"], "error");
}

#[tokio::test]
async fn test_start_overwrites_previous_mode() {
    let server = TestServer::start(blue_config()).await;

    server.post("/chaos/start?mode=error").await;
    server.post("/chaos/start?mode=degraded").await;

    assert_eq!(server.chaos.current().as_deref(), Some("degraded"));
    assert_eq!(server.get("/version").await.status(), 200);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let server = TestServer::start(blue_config()).await;

    for _ in 0..2 {
        let response = server.post("/chaos/stop").await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            body(response).await,
            json!({"chaos": null, "status": "stopped"})
        );
        assert!(!server.chaos.is_active());
    }
}

#[tokio::test]
async fn test_wrong_method_and_unknown_path() {
    let server = TestServer::start(blue_config()).await;

    assert_eq!(server.get("/chaos/start").await.status(), 405);
    assert_eq!(server.post("/version").await.status(), 405);
    assert_eq!(server.get("/nope").await.status(), 404);
}

#[tokio::test]
async fn test_server_stops_on_shutdown_signal() {
    let mut server = TestServer::start(blue_config()).await;
    assert_eq!(server.get("/healthz").await.status(), 200);

    server.controller.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), &mut server.handle)
        .await
        .expect("Server did not stop after shutdown")
        .expect("Server task panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_paths_ignore_trailing_slash_and_case() {
    let server = TestServer::start(blue_config()).await;

    for path in ["/healthz/", "/HEALTHZ", "/Healthz/"] {
        let response = server.get(path).await;
        assert_eq!(response.status(), 200, "{} should reach /healthz", path);
        assert_eq!(body(response).await, json!({"status": "healthy"}));
    }

    let response = server.get("/version/").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[X_APP_POOL], "blue");
}

/// Case folding applies to the path only; the mode keeps its case
#[tokio::test]
async fn test_chaos_start_path_case_keeps_mode_case() {
    let server = TestServer::start(blue_config()).await;

    let response = server.post("/Chaos/Start/?mode=Timeout").await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        body(response).await,
        json!({"chaos": "Timeout", "status": "started"})
    );
    // "Timeout" is not the special-cased "timeout", so /version still answers
    assert_eq!(server.get("/VERSION").await.status(), 200);
}

#[test]
fn test_fold_path_case() {
    let uri: axum::http::Uri = "/Chaos/START?mode=Error".parse().unwrap();
    let folded = fold_path_case(&uri).expect("path has uppercase letters");
    assert_eq!(folded.path(), "/chaos/start");
    assert_eq!(folded.query(), Some("mode=Error"));

    let lower: axum::http::Uri = "/healthz".parse().unwrap();
    assert!(fold_path_case(&lower).is_none());
}
