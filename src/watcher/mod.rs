//! Access-log watcher for blue/green failover
//!
//! Tails the load balancer's access log and posts Slack alerts when:
//! - a single request was retried against another upstream
//! - traffic moves from one pool to another
//! - the 5xx rate over the recent window reaches the threshold
//!
//! Each alert type has its own cooldown so a sustained incident does not
//! flood the channel.

pub mod config;
pub mod monitor;
pub mod notify;
pub mod parse;
pub mod tail;

pub use config::WatcherConfig;
pub use monitor::{Alert, AlertKind, Monitor};
pub use notify::{Delivery, SlackNotifier};
pub use parse::{LogEntry, LogParser};
pub use tail::LogTailer;

use crate::server::ShutdownSignal;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Watch the configured log until `shutdown` fires
pub async fn run_watcher(config: WatcherConfig, shutdown: ShutdownSignal) -> std::io::Result<()> {
    let tailer = {
        let mut shutdown = shutdown.clone();
        tokio::select! {
            tailer = LogTailer::open(&config.log_file) => tailer?,
            _ = shutdown.wait() => return Ok(()),
        }
    };
    watch(tailer, &config, shutdown).await
}

/// Process lines from an already-open tailer
pub async fn watch(
    mut tailer: LogTailer,
    config: &WatcherConfig,
    mut shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    let parser = LogParser::new().map_err(std::io::Error::other)?;
    let notifier = SlackNotifier::new(config.slack_webhook_url.clone());
    let mut monitor = Monitor::from_config(config);

    loop {
        let line = tokio::select! {
            line = tailer.next_line() => line?,
            _ = shutdown.wait() => {
                info!("Watcher stopping");
                return Ok(());
            }
        };

        let Some(entry) = parser.parse(&line) else {
            debug!("Skipping line without pool/upstream fields");
            continue;
        };

        for alert in monitor.observe(&entry, Instant::now()) {
            match notifier.send(&alert).await {
                Ok(_) => monitor.mark_sent(alert.kind(), Instant::now()),
                Err(e) => warn!(kind = %alert.kind(), error = %e, "Failed to send Slack alert"),
            }
        }
    }
}

#[cfg(test)]
#[path = "test_support.rs"]
mod test_support;

#[cfg(test)]
#[path = "config_test.rs"]
mod config_tests;

#[cfg(test)]
#[path = "parse_test.rs"]
mod parse_tests;

#[cfg(test)]
#[path = "monitor_test.rs"]
mod monitor_tests;

#[cfg(test)]
#[path = "notify_test.rs"]
mod notify_tests;

#[cfg(test)]
#[path = "tail_test.rs"]
mod tail_tests;

#[cfg(test)]
#[path = "watcher_test.rs"]
mod watcher_tests;
