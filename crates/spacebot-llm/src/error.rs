use std::time::Duration;
use thiserror::Error;

/// Hard failures of a delta stream.
///
/// Problems reported *by* the upstream inside the data (unknown model, an
/// error notice) are not errors; they arrive as terminal [`DeltaEvent`]s.
///
/// [`DeltaEvent`]: crate::DeltaEvent
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Malformed frame ({reason}): {line}")]
    MalformedFrame { line: String, reason: String },

    #[error("Invalid UTF-8 in upstream line: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl StreamError {
    pub fn malformed(line: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedFrame {
            line: line.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }

    /// Connection-level failure: timeout, reset, bad status
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Status { .. } | Self::Transport(_)
        )
    }

    /// The upstream sent something the decoder cannot parse
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. } | Self::InvalidUtf8(_))
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        Self::transport(err)
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err)
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
