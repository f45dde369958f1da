//! Binary buffer reader with cursor tracking.

use crate::BufferError;

/// A binary buffer reader over a borrowed byte slice.
///
/// Every read is bounds-checked: reading past the end returns
/// [`BufferError::EndOfBuffer`] and leaves the cursor where it was.
///
/// # Example
///
/// ```
/// use hessian2_buffers::Reader;
///
/// let data = [0x01, 0x02, 0x03];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.try_u8(), Ok(0x01));
/// assert_eq!(reader.try_u16(), Ok(0x0203));
/// assert!(reader.try_u8().is_err());
/// ```
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Returns the number of remaining bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.uint8.len() - self.x
    }

    /// Checks that `n` more bytes are available from the current cursor.
    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        let remaining = self.size();
        if n > remaining {
            Err(BufferError::EndOfBuffer {
                offset: self.x,
                needed: n - remaining,
            })
        } else {
            Ok(())
        }
    }

    /// Peeks at the current byte without advancing.
    #[inline]
    pub fn try_peek(&self) -> Result<u8, BufferError> {
        self.check(1)?;
        Ok(self.uint8[self.x])
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn try_u8(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    /// Reads an unsigned 16-bit big-endian integer.
    #[inline]
    pub fn try_u16(&mut self) -> Result<u16, BufferError> {
        self.check(2)?;
        let x = self.x;
        let val = ((self.uint8[x] as u16) << 8) | (self.uint8[x + 1] as u16);
        self.x += 2;
        Ok(val)
    }

    /// Reads a signed 16-bit big-endian integer.
    #[inline]
    pub fn try_i16(&mut self) -> Result<i16, BufferError> {
        self.try_u16().map(|v| v as i16)
    }

    /// Reads a signed 32-bit big-endian integer.
    #[inline]
    pub fn try_i32(&mut self) -> Result<i32, BufferError> {
        self.check(4)?;
        let x = self.x;
        let val = i32::from_be_bytes([
            self.uint8[x],
            self.uint8[x + 1],
            self.uint8[x + 2],
            self.uint8[x + 3],
        ]);
        self.x += 4;
        Ok(val)
    }

    /// Reads a signed 64-bit big-endian integer.
    #[inline]
    pub fn try_i64(&mut self) -> Result<i64, BufferError> {
        let bytes = self.try_array::<8>()?;
        Ok(i64::from_be_bytes(bytes))
    }

    /// Reads a 64-bit big-endian float, bit pattern intact.
    #[inline]
    pub fn try_f64(&mut self) -> Result<f64, BufferError> {
        let bytes = self.try_array::<8>()?;
        Ok(f64::from_be_bytes(bytes))
    }

    #[inline]
    fn try_array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        self.check(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.uint8[self.x..self.x + N]);
        self.x += N;
        Ok(bytes)
    }

    /// Reads `size` raw bytes and advances the cursor.
    #[inline]
    pub fn try_buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let x = self.x;
        let end = x + size;
        let bin = &self.uint8[x..end];
        self.x = end;
        Ok(bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Writer;

    #[test]
    fn test_try_u8_success() {
        let data = [0x42u8];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_u8(), Ok(0x42));
        assert_eq!(reader.x, 1);
        assert_eq!(reader.size(), 0);
    }

    #[test]
    fn test_try_u8_end_of_buffer() {
        let data: [u8; 0] = [];
        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.try_u8(),
            Err(BufferError::EndOfBuffer {
                offset: 0,
                needed: 1
            })
        );
        assert_eq!(reader.x, 0);
    }

    #[test]
    fn test_try_u16_partial() {
        let data = [0x01u8];
        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.try_u16(),
            Err(BufferError::EndOfBuffer {
                offset: 0,
                needed: 1
            })
        );
        assert_eq!(reader.x, 0);
    }

    #[test]
    fn test_try_i16_negative() {
        let data = (-1000i16).to_be_bytes();
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_i16(), Ok(-1000));
    }

    #[test]
    fn test_try_i32_roundtrip() {
        let mut writer = Writer::new();
        writer.i32(i32::MIN);
        let data = writer.flush();
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_i32(), Ok(i32::MIN));
    }

    #[test]
    fn test_try_i64_end_of_buffer() {
        let data = [0u8; 7];
        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.try_i64(),
            Err(BufferError::EndOfBuffer {
                offset: 0,
                needed: 1
            })
        );
        assert_eq!(reader.x, 0);
    }

    #[test]
    fn test_try_f64_nan_payload() {
        let nan = f64::from_bits(0x7ff8_0000_dead_beef);
        let data = nan.to_be_bytes();
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_f64().unwrap().to_bits(), nan.to_bits());
    }

    #[test]
    fn test_try_buf() {
        let data = [1u8, 2, 3, 4, 5];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_buf(3), Ok([1u8, 2, 3].as_ref()));
        assert_eq!(
            reader.try_buf(5),
            Err(BufferError::EndOfBuffer {
                offset: 3,
                needed: 3
            })
        );
        assert_eq!(reader.x, 3);
    }

    #[test]
    fn test_try_peek_does_not_advance() {
        let data = [0x55u8];
        let reader = Reader::new(&data);
        assert_eq!(reader.try_peek(), Ok(0x55));
        assert_eq!(reader.x, 0);
    }
}
