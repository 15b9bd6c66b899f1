// HTTP client for streaming generation upstreams

use async_trait::async_trait;
use futures::{stream, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::buffer_utils::NOT_FOUND_BODY;
use crate::config::{UpstreamConfig, WireFormat};
use crate::error::{Result, StreamError};
use crate::streaming::{decode_stream, DeltaStream};
use crate::traits::{ChatRequest, GenerationClient};

/// Streaming client for one configured upstream (HTTP direct, no SDK)
pub struct HttpGenerationClient {
    http_client: reqwest::Client,
    config: UpstreamConfig,
}

impl HttpGenerationClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(StreamError::Config("upstream base_url is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| StreamError::Config("invalid API key format".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| StreamError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn build_payload(&self, request: &ChatRequest) -> Result<Value> {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        Ok(serde_json::json!({
            "model": model,
            "messages": serde_json::to_value(&request.messages)
                .map_err(|e| StreamError::Config(format!("unserializable messages: {}", e)))?,
            "stream": true,
        }))
    }
}

fn map_transport(err: reqwest::Error, timeout: Duration) -> StreamError {
    if err.is_timeout() {
        StreamError::Timeout(timeout)
    } else {
        err.into()
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<DeltaStream> {
        let payload = self.build_payload(&request)?;
        let timeout = self.config.timeout();

        tracing::debug!(
            endpoint = %self.config.endpoint(),
            format = ?self.config.format,
            messages = request.messages.len(),
            "opening generation stream"
        );

        let response = self
            .http_client
            .post(self.config.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_transport(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            // SSE upstreams answer an unknown model with a bare 404 body; it
            // reaches the caller as the decoder's terminal event
            if status == StatusCode::NOT_FOUND
                && self.config.format == WireFormat::Sse
                && body.trim() == NOT_FOUND_BODY
            {
                tracing::warn!(model = %payload["model"], "upstream does not know the model");
                let chunks = stream::iter([Ok::<_, StreamError>(body)]);
                return Ok(decode_stream(chunks, WireFormat::Sse, None));
            }

            let status = status.as_u16();
            tracing::warn!(status, "upstream rejected generation request");
            return Err(StreamError::Status { status, body });
        }

        // reqwest enforces the same timeout on the body; the framer's deadline
        // only makes the error variant deterministic.
        let chunks = response
            .bytes_stream()
            .map_err(move |e| map_transport(e, timeout));

        Ok(decode_stream(chunks, self.config.format, Some(timeout)))
    }
}
