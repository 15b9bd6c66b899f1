//! Streaming text generation for the chat bot.
//!
//! Upstreams speak either SSE (`data: {json}` chunks) or newline-delimited
//! JSON. Both are framed into lines, decoded with a [`Decoder`] chosen when the
//! request is opened, and exposed as one [`DeltaStream`] of [`DeltaEvent`]s.

pub mod buffer_utils;
pub mod client;
pub mod config;
pub mod error;
pub mod streaming;
pub mod traits;

pub use buffer_utils::{Decoder, LineBuffer, LineDecoder, NdjsonDecoder, SseDecoder};
pub use client::HttpGenerationClient;
pub use config::{UpstreamConfig, WireFormat};
pub use error::{Result, StreamError};
pub use streaming::{
    collect_reply, decode_lines, decode_ndjson, decode_sse, decode_stream, DeltaEvent, DeltaStream,
};
pub use traits::{ChatMessage, ChatRequest, GenerationClient, Role};
