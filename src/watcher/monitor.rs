//! Failover and error-rate detection over parsed log entries
//!
//! `Monitor` is pure state: it turns each entry into zero or more alerts
//! and leaves delivery to the caller. Cooldowns only start once the caller
//! reports an alert as sent via [`Monitor::mark_sent`].

use super::config::WatcherConfig;
use super::parse::LogEntry;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

/// The error-rate check stays quiet until the window holds this many requests
pub const MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    ErrorRate,
    FailoverRequest,
    PoolSwitch,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::ErrorRate => "error_rate",
            AlertKind::FailoverRequest => "failover_request",
            AlertKind::PoolSwitch => "pool_switch",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    ErrorRate {
        rate: f64,
        errors: usize,
        total: usize,
        threshold: f64,
    },
    FailoverRequest {
        upstreams: Vec<String>,
        pool: String,
    },
    PoolSwitch {
        from: String,
        to: String,
    },
}

impl Alert {
    pub fn kind(&self) -> AlertKind {
        match self {
            Alert::ErrorRate { .. } => AlertKind::ErrorRate,
            Alert::FailoverRequest { .. } => AlertKind::FailoverRequest,
            Alert::PoolSwitch { .. } => AlertKind::PoolSwitch,
        }
    }

    /// Slack-formatted message text
    pub fn message(&self) -> String {
        match self {
            Alert::ErrorRate {
                rate,
                errors,
                total,
                threshold,
            } => format!(
                "*High Error Rate Alert*\nError Rate: {:.2}%\nErrors: {}/{} requests\nThreshold: {}%",
                rate, errors, total, threshold
            ),
            Alert::FailoverRequest { upstreams, pool } => format!(
                "*Failover Detected in Request*\nNginx tried multiple upstreams: {}\nFinal pool: {}",
                upstreams.join(", "),
                pool
            ),
            Alert::PoolSwitch { from, to } => format!(
                "*Pool Switch Detected*\nTraffic shifted: {} -> {}\nPrimary pool may be down!",
                from, to
            ),
        }
    }
}

/// Per-kind minimum spacing between delivered alerts
#[derive(Debug, Clone)]
pub struct Cooldown {
    period: Duration,
    last_sent: HashMap<AlertKind, Instant>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_sent: HashMap::new(),
        }
    }

    pub fn is_ready(&self, kind: AlertKind, now: Instant) -> bool {
        match self.last_sent.get(&kind) {
            Some(sent) => now.saturating_duration_since(*sent) >= self.period,
            None => true,
        }
    }

    pub fn record(&mut self, kind: AlertKind, now: Instant) {
        self.last_sent.insert(kind, now);
    }
}

#[derive(Debug)]
pub struct Monitor {
    window: VecDeque<u16>,
    window_size: usize,
    threshold: f64,
    last_pool: Option<String>,
    cooldown: Cooldown,
}

impl Monitor {
    pub fn new(window_size: usize, threshold: f64, cooldown: Duration) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            threshold,
            last_pool: None,
            cooldown: Cooldown::new(cooldown),
        }
    }

    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(
            config.window_size,
            config.error_rate_threshold,
            config.alert_cooldown,
        )
    }

    /// Record an entry and return the alerts it triggers that are not cooling down
    ///
    /// Order: failover in request, pool switch, error rate.
    pub fn observe(&mut self, entry: &LogEntry, now: Instant) -> Vec<Alert> {
        if let Some(status) = entry.final_status() {
            if self.window.len() == self.window_size {
                self.window.pop_front();
            }
            self.window.push_back(status);
        }

        let mut alerts = Vec::new();

        if entry.is_failover() {
            alerts.push(Alert::FailoverRequest {
                upstreams: entry.upstreams.clone(),
                pool: entry.pool.clone(),
            });
        }

        if let Some(previous) = self.last_pool.replace(entry.pool.clone()) {
            if previous != entry.pool {
                alerts.push(Alert::PoolSwitch {
                    from: previous,
                    to: entry.pool.clone(),
                });
            }
        }

        if let Some((errors, total, rate)) = self.error_rate() {
            if rate >= self.threshold {
                alerts.push(Alert::ErrorRate {
                    rate,
                    errors,
                    total,
                    threshold: self.threshold,
                });
            }
        }

        alerts.retain(|alert| self.cooldown.is_ready(alert.kind(), now));
        alerts
    }

    /// Start the cooldown for `kind`
    pub fn mark_sent(&mut self, kind: AlertKind, now: Instant) {
        self.cooldown.record(kind, now);
    }

    /// `(errors, total, percent)` over the window, once it has [`MIN_SAMPLES`]
    pub fn error_rate(&self) -> Option<(usize, usize, f64)> {
        let total = self.window.len();
        if total < MIN_SAMPLES {
            return None;
        }
        let errors = self.window.iter().filter(|s| (500..600).contains(*s)).count();
        Some((errors, total, errors as f64 * 100.0 / total as f64))
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
