use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::Instant;

use super::buffering::LineBuffer;
use crate::error::{Result, StreamError};

pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Split an upstream byte stream into lines.
///
/// Lines are produced lazily as chunks arrive; the unterminated tail is
/// flushed when the upstream ends. With a `timeout`, the whole upstream must
/// finish within it, otherwise the stream ends with [`StreamError::Timeout`].
/// Any error ends the stream.
pub fn frame_lines<S, B, E>(chunks: S, timeout: Option<Duration>) -> LineStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<StreamError> + Send,
{
    let deadline = timeout.map(|limit| (Instant::now() + limit, limit));

    Box::pin(async_stream::stream! {
        let mut chunks = Box::pin(chunks);
        let mut buffer = LineBuffer::with_capacity(4096);

        loop {
            let next = match deadline {
                Some((at, limit)) => match tokio::time::timeout_at(at, chunks.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(StreamError::Timeout(limit));
                        return;
                    }
                },
                None => chunks.next().await,
            };

            match next {
                Some(Ok(bytes)) => {
                    buffer.extend(bytes.as_ref());

                    while let Some(line) = buffer.next_line() {
                        let failed = line.is_err();
                        yield line;
                        if failed {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    yield Err(e.into());
                    return;
                }
                None => break,
            }
        }

        if let Some(line) = buffer.finish() {
            yield line;
        }
    })
}
