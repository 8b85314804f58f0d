//! nginx access log parsing
//!
//! The load balancer's log format appends
//! `pool=<pool> release=<release> upstream_status=<statuses> upstream=<addrs>`
//! to each line. When nginx retries against another upstream, both fields
//! hold a comma-separated list, one entry per attempt.

use regex::Regex;

const LOG_PATTERN: &str = r"pool=(?P<pool>\w+)\s+release=(?P<release>[\w.-]+)\s+upstream_status=(?P<upstream_status>[\d,\s-]+)\s+upstream=(?P<upstream>[\d.:,\s]+)";

/// Fields extracted from one access log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub pool: String,
    pub release: String,
    /// Raw status list, e.g. `502, 200`
    pub upstream_status: String,
    /// Upstream addresses in the order nginx tried them
    pub upstreams: Vec<String>,
}

impl LogEntry {
    /// Status of the last upstream attempt
    ///
    /// `None` when nginx logged `-` (no upstream response) or the value is
    /// not numeric.
    pub fn final_status(&self) -> Option<u16> {
        self.upstream_status
            .rsplit(',')
            .next()
            .map(str::trim)
            .and_then(|s| s.parse().ok())
    }

    /// More than one upstream was tried for this request
    pub fn is_failover(&self) -> bool {
        self.upstreams.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct LogParser {
    pattern: Regex,
}

impl LogParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(LOG_PATTERN)?,
        })
    }

    /// Parse a line; lines without the pool/upstream fields yield `None`
    pub fn parse(&self, line: &str) -> Option<LogEntry> {
        let caps = self.pattern.captures(line)?;

        let upstreams = caps["upstream"]
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();

        Some(LogEntry {
            pool: caps["pool"].to_string(),
            release: caps["release"].to_string(),
            upstream_status: caps["upstream_status"].trim().to_string(),
            upstreams,
        })
    }
}
