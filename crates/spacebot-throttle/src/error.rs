use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("No tokio runtime available to drive scheduler timers")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
