//! Encoder and decoder limits.

/// Default nesting limit for both directions.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default string/binary chunk size, in UTF-16 units for strings and bytes
/// for binaries.
pub const DEFAULT_CHUNK_SIZE: usize = 0x8000;

/// Largest chunk the wire format can describe (u16 length).
pub const MAX_CHUNK_SIZE: usize = 0xffff;

/// Options for [`Encoder`](crate::Encoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Maximum number of simultaneously open lists/maps.
    pub max_depth: usize,
    /// Strings and binaries longer than this are written as several chunks.
    /// Clamped to `1..=0xffff`.
    pub chunk_size: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl EncoderOptions {
    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_CHUNK_SIZE)
    }
}

/// Options for [`Decoder`](crate::Decoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Maximum number of simultaneously open lists/maps.
    pub max_depth: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
