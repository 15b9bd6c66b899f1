use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::duration_ms;
use crate::key::{Key, SubjectKey};
use crate::slot::{Installed, OnOccupied, SlotTable};
use crate::timer::TimerService;

/// How a throttle treats calls made while its window is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleMode {
    /// Suppressed calls push the window out again; the subject must stay
    /// quiet for a full window before the next call executes.
    Sliding,
    /// Suppressed calls are dropped; the window is measured from the last
    /// executed call only.
    Fixed,
}

impl ThrottleMode {
    fn on_occupied(self) -> OnOccupied {
        match self {
            ThrottleMode::Sliding => OnOccupied::Replace,
            ThrottleMode::Fixed => OnOccupied::Keep,
        }
    }
}

/// Leading-edge, per-key throttle.
///
/// An idle key runs its action immediately and opens a window; calls made
/// while the window is open are suppressed. Whether suppressed calls extend
/// the window depends on the [`ThrottleMode`].
pub struct Throttle<K: Key = SubjectKey> {
    mode: ThrottleMode,
    window: Duration,
    timer: Arc<dyn TimerService>,
    slots: Arc<SlotTable<K>>,
}

impl<K: Key> Clone for Throttle<K> {
    fn clone(&self) -> Self {
        Self {
            mode: self.mode,
            window: self.window,
            timer: Arc::clone(&self.timer),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<K: Key> Throttle<K> {
    pub fn new(mode: ThrottleMode, window: Duration, timer: Arc<dyn TimerService>) -> Self {
        Self {
            mode,
            window,
            timer,
            slots: Arc::new(SlotTable::new()),
        }
    }

    pub fn sliding(window: Duration, timer: Arc<dyn TimerService>) -> Self {
        Self::new(ThrottleMode::Sliding, window, timer)
    }

    pub fn fixed(window: Duration, timer: Arc<dyn TimerService>) -> Self {
        Self::new(ThrottleMode::Fixed, window, timer)
    }

    /// Decide whether a call for `key` may execute now, and update the window.
    ///
    /// The window is armed before this returns, so an action that fails or
    /// panics afterwards cannot leave the key stuck open or closed.
    pub fn acquire(&self, key: K) -> bool {
        let outcome = self.slots.install(
            key.clone(),
            self.timer.as_ref(),
            self.window,
            self.mode.on_occupied(),
            None,
        );

        match outcome {
            Installed::Fresh => {
                debug!(
                    key = ?key,
                    mode = ?self.mode,
                    window_ms = duration_ms(self.window),
                    "throttle window opened"
                );
                true
            }
            Installed::Replaced => {
                debug!(key = ?key, mode = ?self.mode, "call suppressed, window extended");
                false
            }
            Installed::Kept => {
                debug!(key = ?key, mode = ?self.mode, "call dropped");
                false
            }
        }
    }

    /// Run `action` now if `key` is idle.
    ///
    /// Returns `Some` with the action's output when it ran and `None` when the
    /// call was suppressed. Action errors are part of the output and reach the
    /// caller unchanged.
    pub async fn call<F, Fut, T>(&self, key: K, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.acquire(key) {
            Some(action().await)
        } else {
            None
        }
    }

    /// Close the window for `key` early. Returns whether it was open.
    pub fn cancel(&self, key: &K) -> bool {
        self.slots.cancel(key)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.slots.is_pending(key)
    }

    /// Time left before `key` becomes idle again
    pub fn remaining(&self, key: &K) -> Option<Duration> {
        self.slots.remaining(key)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }

    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
