use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::error::{Result, SchedulerError};

/// Handle to a scheduled callback.
///
/// Dropping the handle leaves the callback scheduled; only [`TimerHandle::cancel`]
/// stops it. Cancelling a callback that already ran is a no-op.
pub struct TimerHandle {
    cancel: Box<dyn FnOnce() + Send + Sync>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    pub fn cancel(self) {
        (self.cancel)()
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

/// Runs a task after a delay, with the option to cancel it before it fires.
///
/// Implementations must never poll `task` synchronously inside `schedule`;
/// the scheduler holds a per-key lock while calling it.
pub trait TimerService: Send + Sync + 'static {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle;
}

/// Timer backed by the tokio runtime: one spawned task per scheduled callback,
/// cancelled through its abort handle.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    runtime: Handle,
}

impl TokioTimer {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Bind to the runtime of the calling context.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| SchedulerError::NoRuntime)
    }
}

impl TimerService for TokioTimer {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        TimerHandle::new(move || join.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let timer = TokioTimer::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let _handle = timer.schedule(
            Duration::from_millis(100),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let timer = TokioTimer::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let handle = timer.schedule(
            Duration::from_millis(100),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let timer = TokioTimer::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let handle = timer.schedule(
            Duration::from_millis(10),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_current_without_runtime() {
        assert!(matches!(TokioTimer::current(), Err(SchedulerError::NoRuntime)));
    }
}
