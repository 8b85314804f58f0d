//! chaos-status: version/health endpoints with an operator-triggered chaos toggle
//!
//! Used as a backend behind a load balancer to exercise failover and retry
//! behavior. See [`server`] for the endpoints and [`watcher`] for the
//! access-log monitor that alerts on failover and error-rate spikes.

pub mod chaos;
pub mod clock;
pub mod config;
pub mod server;
pub mod watcher;
