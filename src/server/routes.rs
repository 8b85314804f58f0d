//! Status and chaos endpoints
//!
//! - `GET /version` - version, pool and release metadata
//! - `GET /healthz` - 503 while any chaos mode is active
//! - `POST /chaos/start?mode=<mode>` - activate chaos (default mode `error`)
//! - `POST /chaos/stop` - deactivate chaos
//!
//! Paths match case-insensitively and ignore a trailing slash, so
//! `/HEALTHZ` and `/healthz/` reach the same handler as `/healthz`.

use crate::chaos::{resolve_mode, ChaosMode, ChaosState};
use crate::clock::{iso_timestamp, Clock, SystemClock};
use crate::config::ServerConfig;
use crate::server::shutdown::ShutdownSignal;
use axum::{
    extract::{Query, Request, State},
    http::{uri::PathAndQuery, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router, ServiceExt,
};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::util::MapRequestLayer;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tracing::{info, warn};

/// Version string reported by `/version`
pub const APP_VERSION: &str = "1.0.0";

pub const X_APP_POOL: &str = "x-app-pool";
pub const X_RELEASE_ID: &str = "x-release-id";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    chaos: ChaosState,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create state backed by the system clock
    pub fn new(config: ServerConfig, chaos: ChaosState) -> Self {
        Self::with_clock(config, chaos, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServerConfig, chaos: ChaosState, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            chaos,
            clock,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: &'static str,
    pub pool: String,
    pub release_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chaos: Option<String>,
}

/// Body for both chaos endpoints; `chaos` serializes as `null` after stop
#[derive(Debug, Serialize)]
pub struct ChaosResponse {
    pub chaos: Option<String>,
    pub status: &'static str,
}

/// Never completes. Used by the `timeout` chaos mode to hold the
/// connection open without writing a response.
async fn hang() -> Response {
    std::future::pending().await
}

fn metadata_headers(config: &ServerConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in [
        (HeaderName::from_static(X_APP_POOL), &config.pool),
        (HeaderName::from_static(X_RELEASE_ID), &config.release_id),
    ] {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                headers.insert(name, v);
            }
            Err(_) => warn!(header = %name, "Value is not a valid header, omitting"),
        }
    }
    headers
}

/// Version handler
///
/// Chaos `error` returns 500, chaos `timeout` never responds. Any other
/// state (including unrecognised modes) returns the metadata.
async fn version(State(state): State<AppState>) -> Response {
    match state.chaos.current().as_deref().map(ChaosMode::classify) {
        Some(ChaosMode::Error) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Chaos mode: error".to_string(),
                }),
            )
                .into_response();
        }
        Some(ChaosMode::Timeout) => return hang().await,
        Some(ChaosMode::Other) | None => {}
    }

    let config = &state.config;
    let body = VersionResponse {
        version: APP_VERSION,
        pool: config.pool.clone(),
        release_id: config.release_id.clone(),
        timestamp: iso_timestamp(state.clock.now()),
    };

    (StatusCode::OK, metadata_headers(config), Json(body)).into_response()
}

/// Health handler
///
/// Returns 200 when no chaos is active, 503 with the mode otherwise.
async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.chaos.current() {
        Some(mode) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                chaos: Some(mode),
            }),
        ),
        None => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                chaos: None,
            }),
        ),
    }
}

/// Query params are taken as a plain map so no query string is ever rejected.
async fn chaos_start(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<ChaosResponse> {
    let mode = resolve_mode(params.get("mode").map(String::as_str));
    state.chaos.start(mode.clone());
    info!(mode = %mode, "Chaos mode started");

    Json(ChaosResponse {
        chaos: Some(mode),
        status: "started",
    })
}

async fn chaos_stop(State(state): State<AppState>) -> Json<ChaosResponse> {
    state.chaos.stop();
    info!("Chaos mode stopped");

    Json(ChaosResponse {
        chaos: None,
        status: "stopped",
    })
}

/// Build the router for status and chaos endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/version", get(version))
        .route("/healthz", get(healthz))
        .route("/chaos/start", post(chaos_start))
        .route("/chaos/stop", post(chaos_stop))
        .with_state(state)
}

/// Lowercase the path of `uri`, keeping the query untouched
///
/// Returns `None` when the path is already lowercase.
pub fn fold_path_case(uri: &Uri) -> Option<Uri> {
    let path = uri.path();
    if !path.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }

    let mut folded = path.to_ascii_lowercase();
    if let Some(query) = uri.query() {
        folded.push('?');
        folded.push_str(query);
    }

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(folded).ok()?);
    Uri::from_parts(parts).ok()
}

fn fold_request_path(mut req: Request) -> Request {
    if let Some(uri) = fold_path_case(req.uri()) {
        *req.uri_mut() = uri;
    }
    req
}

/// Bind the listener on all interfaces
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await
}

/// Serve requests on `listener` until `shutdown` fires
///
/// Graceful shutdown waits for in-flight requests. Requests hung by the
/// `timeout` chaos mode never finish, so callers should bound the wait.
pub async fn run_server(
    listener: TcpListener,
    state: AppState,
    mut shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    // Path rewriting has to happen before routing, so wrap the router
    // instead of using Router::layer.
    let app = NormalizePathLayer::trim_trailing_slash().layer(
        MapRequestLayer::new(fold_request_path as fn(Request) -> Request)
            .layer(build_router(state)),
    );

    let addr = listener.local_addr()?;
    info!(address = %addr, "Status server listening (HTTP)");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
