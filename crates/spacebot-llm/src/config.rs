// Upstream configuration: where generation requests go and how their
// responses are framed on the wire

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Wire format of an upstream's streaming responses.
///
/// Fixed per upstream; a single connection never mixes formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// `data: {json}` lines terminated by `data: [DONE]`
    #[default]
    Sse,
    /// One JSON delta event per line
    Ndjson,
}

/// Configuration for one text-generation upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Request path appended to `base_url`
    #[serde(default = "default_path")]
    pub path: String,
    pub model: String,
    #[serde(default)]
    pub format: WireFormat,
    /// Bound on the whole request, including reading the stream
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bearer token; loaded from the environment, never from config files
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_path() -> String {
    "/chat/completions".to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: default_path(),
            model: model.into(),
            format: WireFormat::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            api_key: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full request URL
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}
