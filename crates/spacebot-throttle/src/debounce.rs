use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::config::duration_ms;
use crate::key::{Key, SubjectKey};
use crate::slot::{Installed, OnOccupied, SlotTable};
use crate::timer::TimerService;

/// Runs an action only once a subject has been quiet for the whole window.
///
/// Every call cancels the action still waiting for the same key and schedules
/// its own, so only the last call of a burst executes, `window` after it was made.
pub struct Debouncer<K: Key = SubjectKey> {
    window: Duration,
    timer: Arc<dyn TimerService>,
    slots: Arc<SlotTable<K>>,
}

impl<K: Key> Clone for Debouncer<K> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            timer: Arc::clone(&self.timer),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<K: Key> Debouncer<K> {
    pub fn new(window: Duration, timer: Arc<dyn TimerService>) -> Self {
        Self {
            window,
            timer,
            slots: Arc::new(SlotTable::new()),
        }
    }

    /// Schedule `action` for `key`, discarding whatever was waiting before.
    ///
    /// Returns immediately. A failing action is logged when it runs; nothing
    /// reaches the caller.
    pub fn call<F, Fut, E>(&self, key: K, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let label = key.clone();
        let deferred = async move {
            match action().await {
                Ok(()) => debug!(key = ?label, "debounced action completed"),
                Err(e) => warn!(key = ?label, error = %e, "debounced action failed"),
            }
        }
        .boxed();

        let outcome = self.slots.install(
            key.clone(),
            self.timer.as_ref(),
            self.window,
            OnOccupied::Replace,
            Some(deferred),
        );

        match outcome {
            Installed::Replaced => debug!(key = ?key, "debounce superseded pending action"),
            _ => debug!(
                key = ?key,
                window_ms = duration_ms(self.window),
                "debounce scheduled"
            ),
        }
    }

    /// Drop the action waiting for `key`. Returns whether one was waiting.
    pub fn cancel(&self, key: &K) -> bool {
        let cancelled = self.slots.cancel(key);
        if cancelled {
            debug!(key = ?key, "debounced action cancelled");
        }
        cancelled
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.slots.is_pending(key)
    }

    /// Time left before the waiting action for `key` runs
    pub fn remaining(&self, key: &K) -> Option<Duration> {
        self.slots.remaining(key)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
