use chaos_status::chaos::ChaosState;
use chaos_status::config::ServerConfig;
use chaos_status::server::{bind, run_server, shutdown_channel, wait_for_signal, AppState};
use std::time::Duration;
use tracing::{error, info, warn};

/// How long in-flight requests get to finish after a termination signal.
/// Requests hung by the `timeout` chaos mode are cut off after this.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let listener = match bind(config.port).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, port = config.port, "Failed to bind listener");
            return Err(e.into());
        }
    };

    info!(port = config.port, "Server running");
    info!(pool = %config.pool, "Pool");
    info!(release = %config.release_id, "Release");

    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let state = AppState::new(config, ChaosState::new());

    let mut server_handle = tokio::spawn(run_server(listener, state, shutdown_signal));

    tokio::select! {
        result = &mut server_handle => {
            // Server exited on its own; nothing left to drain
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "Server failed");
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            };
        }
        signal = wait_for_signal() => {
            let signal = signal?;
            info!(signal = signal, "Initiating graceful shutdown");
        }
    }

    shutdown_controller.shutdown();

    match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut server_handle).await {
        Ok(Ok(Ok(()))) => info!("All connections drained"),
        Ok(Ok(Err(e))) => warn!(error = %e, "Server exited with error during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "Server task failed during shutdown"),
        Err(_) => {
            warn!(
                grace_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
                "Connections still open after grace period, aborting"
            );
            server_handle.abort();
        }
    }

    info!("chaos-status shut down");
    Ok(())
}
