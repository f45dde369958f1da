//! Binary buffer writer with auto-growing capacity.

/// A binary buffer writer that grows automatically as needed.
///
/// Everything written so far is kept until [`Writer::reset`]; a caller that
/// has to undo a partially written value remembers `x` and hands it back to
/// [`Writer::truncate`].
///
/// # Example
///
/// ```
/// use hessian2_buffers::Writer;
///
/// let mut writer = Writer::new();
/// writer.u8(0x49);
/// writer.i32(-2);
/// assert_eq!(writer.as_slice(), [0x49, 0xff, 0xff, 0xff, 0xfe]);
/// ```
pub struct Writer {
    /// The underlying byte buffer.
    pub uint8: Vec<u8>,
    /// Current cursor position; everything before it is output.
    pub x: usize,
    /// Allocation size used for the first growth step.
    alloc_size: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates a new writer with default allocation size (64KB).
    pub fn new() -> Self {
        Self::with_alloc_size(64 * 1024)
    }

    /// Creates a new writer with custom allocation size.
    pub fn with_alloc_size(alloc_size: usize) -> Self {
        let alloc_size = alloc_size.max(16);
        Self {
            uint8: vec![0u8; alloc_size],
            x: 0,
            alloc_size,
        }
    }

    /// Ensures the buffer has at least `capacity` bytes available.
    ///
    /// Growth doubles the required size, so a long series of small writes
    /// costs amortized O(1) per byte.
    #[inline]
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let remaining = self.uint8.len() - self.x;
        if remaining < capacity {
            let required = self.x + capacity;
            let new_size = if required <= self.alloc_size {
                self.alloc_size
            } else {
                required * 2
            };
            self.uint8.resize(new_size, 0);
        }
    }

    /// Drops everything written so far.
    pub fn reset(&mut self) {
        self.x = 0;
    }

    /// Rolls the cursor back to `x`, discarding what was written after it.
    pub fn truncate(&mut self, x: usize) {
        if x < self.x {
            self.x = x;
        }
    }

    /// Returns a view of everything written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.uint8[..self.x]
    }

    /// Returns a copy of the written data and resets the writer.
    pub fn flush(&mut self) -> Vec<u8> {
        let result = self.uint8[..self.x].to_vec();
        self.x = 0;
        result
    }

    /// Writes an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.ensure_capacity(1);
        self.uint8[self.x] = val;
        self.x += 1;
    }

    /// Writes an unsigned 16-bit integer (big-endian).
    #[inline]
    pub fn u16(&mut self, val: u16) {
        self.ensure_capacity(2);
        let bytes = val.to_be_bytes();
        self.uint8[self.x] = bytes[0];
        self.uint8[self.x + 1] = bytes[1];
        self.x += 2;
    }

    /// Writes a signed 32-bit integer (big-endian).
    #[inline]
    pub fn i32(&mut self, val: i32) {
        self.ensure_capacity(4);
        let bytes = val.to_be_bytes();
        self.uint8[self.x..self.x + 4].copy_from_slice(&bytes);
        self.x += 4;
    }

    /// Writes a u8 followed by a u16 (big-endian).
    #[inline]
    pub fn u8u16(&mut self, u8_val: u8, u16_val: u16) {
        self.ensure_capacity(3);
        self.uint8[self.x] = u8_val;
        let bytes = u16_val.to_be_bytes();
        self.uint8[self.x + 1] = bytes[0];
        self.uint8[self.x + 2] = bytes[1];
        self.x += 3;
    }

    /// Writes a u8 followed by an i32 (big-endian).
    #[inline]
    pub fn u8i32(&mut self, u8_val: u8, i32_val: i32) {
        self.ensure_capacity(5);
        self.uint8[self.x] = u8_val;
        let bytes = i32_val.to_be_bytes();
        self.uint8[self.x + 1..self.x + 5].copy_from_slice(&bytes);
        self.x += 5;
    }

    /// Writes a u8 followed by an i64 (big-endian).
    #[inline]
    pub fn u8i64(&mut self, u8_val: u8, i64_val: i64) {
        self.ensure_capacity(9);
        self.uint8[self.x] = u8_val;
        let bytes = i64_val.to_be_bytes();
        self.uint8[self.x + 1..self.x + 9].copy_from_slice(&bytes);
        self.x += 9;
    }

    /// Writes a u8 followed by a f64 (big-endian).
    #[inline]
    pub fn u8f64(&mut self, u8_val: u8, f64_val: f64) {
        self.ensure_capacity(9);
        self.uint8[self.x] = u8_val;
        let bytes = f64_val.to_be_bytes();
        self.uint8[self.x + 1..self.x + 9].copy_from_slice(&bytes);
        self.x += 9;
    }

    /// Writes a byte slice.
    #[inline]
    pub fn buf(&mut self, buf: &[u8]) {
        let length = buf.len();
        self.ensure_capacity(length);
        self.uint8[self.x..self.x + length].copy_from_slice(buf);
        self.x += length;
    }
}
