//! Per-subject action scheduling for chat command handlers.
//!
//! Three policies guard how often a handler may run for a given subject:
//! [`Debouncer`] (run after a quiet period), a sliding [`Throttle`] (`limit`)
//! and a fixed [`Throttle`] (`throttle`). State is keyed per subject and
//! backed by a [`TimerService`].

pub mod config;
pub mod debounce;
pub mod error;
pub mod key;
pub mod scheduler;
pub mod throttle;
pub mod timer;

mod slot;

pub use config::SchedulerConfig;
pub use debounce::Debouncer;
pub use error::{Result, SchedulerError};
pub use key::{Key, SubjectKey};
pub use scheduler::KeyedActionScheduler;
pub use throttle::{Throttle, ThrottleMode};
pub use timer::{TimerHandle, TimerService, TokioTimer};
