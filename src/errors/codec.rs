use thiserror::Error;

/// Failures of the frame codecs and the buffer emitter/fetcher.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// A cursor-based read or write would pass the end of the buffer.
    #[error("Cursor reached the end of the buffer")]
    BufferEnd,

    /// The decoder was asked for something its current state cannot provide
    /// (ending twice, extracting a frame before the end).
    #[error("Frame decoder is in an invalid state for this operation")]
    DecoderInvalidState,

    /// A character outside `0-9`/`A-F` occupied a hex position.
    #[error("Invalid character in an encoded frame")]
    InvalidChar,

    /// The encoder was asked for another byte after emitting the whole
    /// frame.
    #[error("Frame encoder has already emitted the whole frame")]
    FrameEnd,
}
