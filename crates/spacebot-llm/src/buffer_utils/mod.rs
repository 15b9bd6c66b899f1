mod buffering;
mod decoder;
mod framing;

pub use buffering::LineBuffer;
pub use decoder::{
    Decoder, LineDecoder, NdjsonDecoder, SseDecoder, DATA_PREFIX, DONE_SENTINEL,
    MODEL_NOT_FOUND_MESSAGE, NOT_FOUND_BODY,
};
pub use framing::{frame_lines, LineStream};
