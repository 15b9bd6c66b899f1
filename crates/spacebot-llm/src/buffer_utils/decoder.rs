use serde::Deserialize;
use serde_json::Value;

use crate::config::WireFormat;
use crate::error::{Result, StreamError};
use crate::streaming::DeltaEvent;

/// Prefix of every event line in the SSE wire format
pub const DATA_PREFIX: &str = "data: ";
/// End-of-stream marker sent by SSE upstreams
pub const DONE_SENTINEL: &str = "[DONE]";
/// Body an SSE upstream sends in place of a stream when the model is unknown
pub const NOT_FOUND_BODY: &str = "Not Found";
/// Content of the terminal event produced for [`NOT_FOUND_BODY`]
pub const MODEL_NOT_FOUND_MESSAGE: &str = "Model not found";

/// Turns one non-blank upstream line into at most one event.
///
/// `Ok(None)` means the line carries nothing for the caller. Errors are fatal
/// for the stream.
pub trait LineDecoder: Send {
    fn decode_line(&self, line: &str) -> Result<Option<DeltaEvent>>;
}

/// Decoder for `data: {json}` event streams (OpenAI-style chat chunks).
#[derive(Debug, Clone, Copy, Default)]
pub struct SseDecoder;

#[derive(Debug, Deserialize)]
struct SseFrame {
    model: Option<String>,
    choices: Option<Vec<SseChoice>>,
    detail: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SseChoice {
    delta: Option<SseDelta>,
}

#[derive(Debug, Deserialize)]
struct SseDelta {
    content: Option<String>,
}

impl SseFrame {
    /// Announces which model serves the request; carries no text
    fn is_model_notice(&self) -> bool {
        self.model.is_some() && self.choices.as_ref().map_or(true, Vec::is_empty)
    }

    fn content(self) -> Option<String> {
        self.choices?
            .into_iter()
            .next()?
            .delta?
            .content
            .filter(|content| !content.is_empty())
    }
}

impl LineDecoder for SseDecoder {
    fn decode_line(&self, line: &str) -> Result<Option<DeltaEvent>> {
        if line == DONE_SENTINEL {
            return Ok(Some(DeltaEvent::finished()));
        }
        if line == NOT_FOUND_BODY {
            return Ok(Some(DeltaEvent::finished_with(MODEL_NOT_FOUND_MESSAGE)));
        }

        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(None);
        };
        let data = data.trim();

        if data == DONE_SENTINEL {
            return Ok(Some(DeltaEvent::finished()));
        }

        let frame: SseFrame =
            serde_json::from_str(data).map_err(|e| StreamError::malformed(line, e))?;

        if frame.is_model_notice() {
            tracing::debug!(model = ?frame.model, "upstream selected model");
            return Ok(None);
        }

        if let Some(detail) = frame.detail {
            let message = match detail {
                Value::String(text) => text,
                other => other.to_string(),
            };
            return Ok(Some(DeltaEvent::finished_with(message)));
        }

        Ok(Some(match frame.content() {
            Some(content) => DeltaEvent::fragment(content),
            None => DeltaEvent::finished(),
        }))
    }
}

/// Decoder for newline-delimited JSON where every line already is a
/// [`DeltaEvent`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonDecoder;

impl LineDecoder for NdjsonDecoder {
    fn decode_line(&self, line: &str) -> Result<Option<DeltaEvent>> {
        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| StreamError::malformed(line, e))
    }
}

/// Decoder chosen once per upstream connection.
#[derive(Debug, Clone, Copy)]
pub enum Decoder {
    Sse(SseDecoder),
    Ndjson(NdjsonDecoder),
}

impl From<WireFormat> for Decoder {
    fn from(format: WireFormat) -> Self {
        match format {
            WireFormat::Sse => Decoder::Sse(SseDecoder),
            WireFormat::Ndjson => Decoder::Ndjson(NdjsonDecoder),
        }
    }
}

impl LineDecoder for Decoder {
    fn decode_line(&self, line: &str) -> Result<Option<DeltaEvent>> {
        match self {
            Decoder::Sse(decoder) => decoder.decode_line(line),
            Decoder::Ndjson(decoder) => decoder.decode_line(line),
        }
    }
}
