//! Encoder and decoder error types.

use hessian2_buffers::BufferError;
use thiserror::Error;

/// Error returned by [`Encoder::encode`](crate::Encoder::encode).
///
/// The encoder's buffer never holds a partial value after an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A host value has no [`Value`](crate::Value) counterpart.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    /// Nesting deeper than the configured limit.
    #[error("nesting depth exceeds the limit of {max_depth}")]
    DepthExceeded { max_depth: usize },
}

/// Error returned by [`Decoder::decode`](crate::Decoder::decode).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte at `offset` is not a tag this decoder accepts in that position.
    #[error("malformed input: unexpected byte 0x{byte:02x} at offset {offset}")]
    MalformedInput { offset: usize, byte: u8 },
    /// The input ends before the value does; `needed` more bytes are required
    /// by the read that failed at `offset`.
    #[error("unexpected end of input at offset {offset}: {needed} more byte(s) needed")]
    UnexpectedEof { offset: usize, needed: usize },
    /// A back-reference (or type reference) points past the end of its table.
    #[error("invalid reference {index}: table holds {len} entries")]
    InvalidReference { index: usize, len: usize },
    /// Nesting deeper than the configured limit.
    #[error("nesting depth exceeds the limit of {max_depth}")]
    DepthExceeded { max_depth: usize },
    /// String payload starting at `offset` is not valid UTF-8.
    #[error("invalid UTF-8 in string starting at offset {offset}")]
    InvalidUtf8 { offset: usize },
}

impl From<BufferError> for DecodeError {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::EndOfBuffer { offset, needed } => {
                DecodeError::UnexpectedEof { offset, needed }
            }
        }
    }
}

impl DecodeError {
    /// Whether more input could let the same call succeed.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, DecodeError::UnexpectedEof { .. })
    }
}
