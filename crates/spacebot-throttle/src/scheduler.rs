use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::key::{Key, SubjectKey};
use crate::throttle::Throttle;
use crate::timer::{TimerService, TokioTimer};

/// The three per-subject dispatch policies a command handler can sit behind.
///
/// Each policy keeps its own timer state, so the same key can be debounced
/// in one place and throttled in another without interference.
pub struct KeyedActionScheduler<K: Key = SubjectKey> {
    debouncer: Debouncer<K>,
    limiter: Throttle<K>,
    throttler: Throttle<K>,
}

impl<K: Key> Clone for KeyedActionScheduler<K> {
    fn clone(&self) -> Self {
        Self {
            debouncer: self.debouncer.clone(),
            limiter: self.limiter.clone(),
            throttler: self.throttler.clone(),
        }
    }
}

impl<K: Key> KeyedActionScheduler<K> {
    pub fn new(config: &SchedulerConfig, timer: Arc<dyn TimerService>) -> Self {
        Self {
            debouncer: Debouncer::new(config.debounce_window(), Arc::clone(&timer)),
            limiter: Throttle::sliding(config.limit_window(), Arc::clone(&timer)),
            throttler: Throttle::fixed(config.throttle_window(), timer),
        }
    }

    /// Build a scheduler whose timers run on the current tokio runtime
    pub fn with_current_runtime(config: &SchedulerConfig) -> Result<Self> {
        let timer = TokioTimer::current()?;
        Ok(Self::new(config, Arc::new(timer)))
    }

    /// Run `action` once `key` has been quiet for the debounce window.
    pub fn debounce<F, Fut, E>(&self, key: K, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.debouncer.call(key, action)
    }

    /// Run `action` now unless `key` called within the last window
    /// (sliding: every call restarts the window).
    pub async fn limit<F, Fut, T>(&self, key: K, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.limiter.call(key, action).await
    }

    /// Run `action` now unless a window opened by an executed call is
    /// still running for `key`.
    pub async fn throttle<F, Fut, T>(&self, key: K, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.throttler.call(key, action).await
    }

    pub fn debouncer(&self) -> &Debouncer<K> {
        &self.debouncer
    }

    pub fn limiter(&self) -> &Throttle<K> {
        &self.limiter
    }

    pub fn throttler(&self) -> &Throttle<K> {
        &self.throttler
    }
}
