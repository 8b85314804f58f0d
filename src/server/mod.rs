//! HTTP server for status and chaos endpoints
//!
//! - `/version` - Version metadata (fails or hangs under chaos)
//! - `/healthz` - Health probe (503 while chaos is active)
//! - `/chaos/start`, `/chaos/stop` - Operator chaos toggle
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod routes;
pub mod shutdown;

pub use routes::{
    bind, build_router, fold_path_case, run_server, AppState, ChaosResponse, ErrorResponse, HealthResponse,
    VersionResponse, APP_VERSION, X_APP_POOL, X_RELEASE_ID,
};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
