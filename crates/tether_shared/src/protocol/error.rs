//! # Codec Error Types

use super::catalog::MessageId;
use thiserror::Error;

/// Errors produced while encoding or decoding a message.
///
/// None of these ever reach the application layer on the receive path: the
/// dispatcher logs them and drops the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Write would overflow the packet buffer.
    #[error("buffer full: need {needed} bytes, capacity {capacity}")]
    BufferFull {
        /// Bytes the write needed.
        needed: usize,
        /// Buffer capacity.
        capacity: usize,
    },

    /// Read ran past the end of the input.
    #[error("truncated message: need {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the read needed.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// Leading byte is not in the catalog.
    #[error("unknown message id: {0}")]
    UnknownMessage(u8),

    /// String longer than its declared bound.
    #[error("string too long: {len} bytes, max {max}")]
    StringTooLong {
        /// Actual length.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// String bytes are not UTF-8.
    #[error("string is not valid utf-8")]
    InvalidUtf8,

    /// Input had bytes left after the payload.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// Message decoded but failed its structural check.
    #[error("{0:?} failed validation")]
    Invalid(MessageId),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
