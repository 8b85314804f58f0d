//! Blue/green access-log watcher
//!
//! Tails the nginx access log and posts failover and error-rate alerts to Slack.

use chaos_status::server::{shutdown_channel, wait_for_signal};
use chaos_status::watcher::{run_watcher, WatcherConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match WatcherConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let webhook_state = if config.slack_webhook_url.is_some() {
        "configured"
    } else {
        "not configured"
    };
    info!(
        log_file = %config.log_file.display(),
        error_rate_threshold = config.error_rate_threshold,
        window_size = config.window_size,
        alert_cooldown_secs = config.alert_cooldown.as_secs(),
        slack_webhook = webhook_state,
        "Blue/green deployment monitor starting"
    );
    if config.slack_webhook_url.is_none() {
        warn!("SLACK_WEBHOOK_URL not set - alerts will only be logged");
    }

    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let mut watcher_handle = tokio::spawn(run_watcher(config, shutdown_signal));

    tokio::select! {
        result = &mut watcher_handle => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "Watcher failed");
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            };
        }
        signal = wait_for_signal() => {
            let signal = signal?;
            info!(signal = signal, "Stopping watcher");
        }
    }

    shutdown_controller.shutdown();
    if let Err(e) = watcher_handle.await {
        warn!(error = %e, "Watcher task failed during shutdown");
    }

    info!("chaos-watcher shut down");
    Ok(())
}
