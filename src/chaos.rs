//! Chaos state shared between request handlers
//!
//! A single optional mode string. `start` overwrites it, `stop` clears it.
//! Only two modes change `/version` behavior:
//! - `error` - respond 500
//! - `timeout` - never respond
//!
//! Any other mode is stored as-is and only affects `/healthz`.

use std::sync::{Arc, PoisonError, RwLock};

/// Mode applied when `/chaos/start` is called without one
pub const DEFAULT_MODE: &str = "error";

/// How a stored mode string affects `/version`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosMode {
    Error,
    Timeout,
    /// Stored but not special-cased
    Other,
}

impl ChaosMode {
    pub fn classify(mode: &str) -> Self {
        match mode {
            "error" => ChaosMode::Error,
            "timeout" => ChaosMode::Timeout,
            _ => ChaosMode::Other,
        }
    }
}

/// Pick the mode for a start request: absent and empty both mean [`DEFAULT_MODE`]
pub fn resolve_mode(requested: Option<&str>) -> String {
    match requested {
        Some(mode) if !mode.is_empty() => mode.to_string(),
        _ => DEFAULT_MODE.to_string(),
    }
}

/// Process-wide chaos mode
///
/// Cheap to clone; clones share the same cell. Reads and writes are
/// last-write-wins with no ordering against in-flight requests.
#[derive(Debug, Clone, Default)]
pub struct ChaosState {
    mode: Arc<RwLock<Option<String>>>,
}

impl ChaosState {
    /// Create a new chaos state (initially inactive)
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate chaos with the given mode, replacing any previous mode
    pub fn start(&self, mode: impl Into<String>) {
        // A poisoned lock still holds a whole Option<String>, so recover it.
        let mut guard = self.mode.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(mode.into());
    }

    /// Deactivate chaos
    pub fn stop(&self) {
        let mut guard = self.mode.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    /// Current mode, if any
    pub fn current(&self) -> Option<String> {
        self.mode
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_active(&self) -> bool {
        self.mode
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
#[path = "chaos_test.rs"]
mod tests;
