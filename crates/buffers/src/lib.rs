//! Byte-level primitives shared by the Hessian 2 encoder and decoder.
//!
//! - [`Writer`]: growable output buffer with big-endian writers.
//! - [`Reader`]: cursor over a borrowed slice with bounds-checked reads.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

/// Error returned by the bounds-checked [`Reader`] methods.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A read starting at `offset` needed `needed` more bytes than remain.
    #[error("unexpected end of buffer at offset {offset}: {needed} more byte(s) needed")]
    EndOfBuffer { offset: usize, needed: usize },
}
