use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_WINDOW_MS: u64 = 1000;

/// Window durations for the three dispatch policies.
///
/// Each policy is configured independently; durations are in milliseconds
/// so the struct maps directly onto TOML and environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Quiet period a debounced action waits for
    pub debounce_ms: u64,
    /// Sliding throttle window, extended by every call
    pub limit_ms: u64,
    /// Fixed throttle window, opened by an executed call
    pub throttle_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_WINDOW_MS,
            limit_ms: DEFAULT_WINDOW_MS,
            throttle_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same window for all three policies
    pub fn uniform(window: Duration) -> Self {
        let ms = duration_ms(window);
        Self {
            debounce_ms: ms,
            limit_ms: ms,
            throttle_ms: ms,
        }
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce_ms = duration_ms(window);
        self
    }

    pub fn with_limit(mut self, window: Duration) -> Self {
        self.limit_ms = duration_ms(window);
        self
    }

    pub fn with_throttle(mut self, window: Duration) -> Self {
        self.throttle_ms = duration_ms(window);
        self
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn limit_window(&self) -> Duration {
        Duration::from_millis(self.limit_ms)
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Whole milliseconds in `window`, saturating at `u64::MAX`
pub(crate) fn duration_ms(window: Duration) -> u64 {
    u64::try_from(window.as_millis()).unwrap_or(u64::MAX)
}
