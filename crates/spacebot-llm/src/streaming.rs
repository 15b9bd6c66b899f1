use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::buffer_utils::{frame_lines, Decoder, LineDecoder, LineStream};
use crate::config::WireFormat;
use crate::error::{Result, StreamError};

/// One incremental piece of generated text.
///
/// A terminal event ends its stream: nothing follows it. Upstream-reported
/// problems (unknown model, error notices) arrive as the content of a
/// terminal event so they can be shown to the user like any other reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEvent {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "done")]
    pub terminal: bool,
}

impl DeltaEvent {
    pub fn fragment(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            terminal: false,
        }
    }

    pub fn finished() -> Self {
        Self {
            content: None,
            terminal: true,
        }
    }

    pub fn finished_with(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            terminal: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }
}

/// Finite, pull-based sequence of delta events.
///
/// Ends right after a terminal event, or earlier if the upstream closes
/// without one (treat that like a terminal event with no content). An `Err`
/// item is always the last one.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<DeltaEvent>> + Send>>;

/// Decode an SSE (`data: {json}`) upstream.
pub fn decode_sse<S, B, E>(chunks: S, timeout: Option<Duration>) -> DeltaStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<StreamError> + Send,
{
    decode_stream(chunks, WireFormat::Sse, timeout)
}

/// Decode a newline-delimited JSON upstream.
pub fn decode_ndjson<S, B, E>(chunks: S, timeout: Option<Duration>) -> DeltaStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<StreamError> + Send,
{
    decode_stream(chunks, WireFormat::Ndjson, timeout)
}

pub fn decode_stream<S, B, E>(
    chunks: S,
    format: WireFormat,
    timeout: Option<Duration>,
) -> DeltaStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<StreamError> + Send,
{
    decode_lines(frame_lines(chunks, timeout), Decoder::from(format))
}

/// Apply `decoder` to framed lines.
///
/// Blank lines are skipped. The stream stops after the first terminal event
/// or the first error, dropping the upstream.
pub fn decode_lines<D>(lines: LineStream, decoder: D) -> DeltaStream
where
    D: LineDecoder + 'static,
{
    Box::pin(async_stream::stream! {
        let mut lines = lines;

        while let Some(line_result) = lines.next().await {
            let line = match line_result {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "upstream stream failed");
                    yield Err(e);
                    return;
                }
            };

            if line.is_empty() {
                continue;
            }

            match decoder.decode_line(&line) {
                Ok(Some(event)) => {
                    let terminal = event.terminal;
                    yield Ok(event);
                    if terminal {
                        tracing::debug!("delta stream reached terminal event");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable upstream line");
                    yield Err(e);
                    return;
                }
            }
        }

        tracing::debug!("upstream closed without terminal event");
    })
}

/// Drain `stream` into the full reply text.
///
/// Stops at the terminal event; hard errors are returned as-is.
pub async fn collect_reply(mut stream: DeltaStream) -> Result<String> {
    let mut reply = String::new();

    while let Some(event) = stream.next().await {
        let event = event?;
        if let Some(content) = &event.content {
            reply.push_str(content);
        }
        if event.terminal {
            break;
        }
    }

    Ok(reply)
}
