//! Tag bytes and the compact numeric encodings of Hessian 2.
//!
//! A value starts with one tag byte. For short strings, binaries, lists and
//! most numbers the tag also carries the length or the high bits of the
//! number, so the common small cases need no separate length field.

use hessian2_buffers::{Reader, Writer};

use crate::error::DecodeError;

/// Tag byte values.
pub mod byte {
    pub const STRING_DIRECT: u8 = 0x00;
    pub const STRING_DIRECT_MAX: usize = 0x1f;
    pub const BINARY_DIRECT: u8 = 0x20;
    pub const BINARY_DIRECT_MAX: usize = 0x0f;
    pub const STRING_SHORT: u8 = 0x30;
    pub const STRING_SHORT_MAX: usize = 0x3ff;
    pub const BINARY_SHORT: u8 = 0x34;
    pub const BINARY_SHORT_MAX: usize = 0x3ff;
    pub const LONG_SHORT_ZERO: u8 = 0x3c;

    pub const BINARY_CHUNK: u8 = b'A';
    pub const BINARY: u8 = b'B';
    pub const DOUBLE: u8 = b'D';
    pub const FALSE: u8 = b'F';
    pub const MAP_UNTYPED: u8 = b'H';
    pub const INT: u8 = b'I';
    pub const LONG: u8 = b'L';
    pub const MAP: u8 = b'M';
    pub const NULL: u8 = b'N';
    pub const REF: u8 = b'Q';
    pub const STRING_CHUNK: u8 = b'R';
    pub const STRING: u8 = b'S';
    pub const TRUE: u8 = b'T';
    pub const LIST_VARIABLE: u8 = b'U';
    pub const LIST_FIXED: u8 = b'V';
    pub const LIST_VARIABLE_UNTYPED: u8 = b'W';
    pub const LIST_FIXED_UNTYPED: u8 = b'X';
    pub const LONG_INT: u8 = b'Y';
    pub const END: u8 = b'Z';

    pub const DOUBLE_ZERO: u8 = 0x5b;
    pub const DOUBLE_ONE: u8 = 0x5c;
    pub const DOUBLE_BYTE: u8 = 0x5d;
    pub const DOUBLE_SHORT: u8 = 0x5e;
    pub const DOUBLE_MILL: u8 = 0x5f;

    pub const LIST_DIRECT: u8 = 0x70;
    pub const LIST_DIRECT_UNTYPED: u8 = 0x78;
    pub const LIST_DIRECT_MAX: usize = 0x07;

    pub const INT_ZERO: u8 = 0x90;
    pub const INT_BYTE_ZERO: u8 = 0xc8;
    pub const INT_SHORT_ZERO: u8 = 0xd4;
    pub const LONG_ZERO: u8 = 0xe0;
    pub const LONG_BYTE_ZERO: u8 = 0xf8;
}

const INT_DIRECT: std::ops::RangeInclusive<i32> = -0x10..=0x2f;
const INT_BYTE: std::ops::RangeInclusive<i32> = -0x800..=0x7ff;
const INT_SHORT: std::ops::RangeInclusive<i32> = -0x40000..=0x3ffff;
const LONG_DIRECT: std::ops::RangeInclusive<i64> = -0x08..=0x0f;
const LONG_BYTE: std::ops::RangeInclusive<i64> = -0x800..=0x7ff;
const LONG_SHORT: std::ops::RangeInclusive<i64> = -0x40000..=0x3ffff;

/// What a tag introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Null,
    True,
    False,
    /// 32-bit int; the payload is read with [`read_int_body`].
    Int,
    /// 64-bit long; the payload is read with [`read_long_body`].
    Long,
    /// Double; the payload is read with [`read_double_body`].
    Double,
    /// Final (or only) string chunk of `len` UTF-16 units.
    String,
    /// Non-final string chunk of `len` UTF-16 units.
    StringChunk,
    /// Final (or only) binary chunk of `len` bytes.
    Binary,
    /// Non-final binary chunk of `len` bytes.
    BinaryChunk,
    /// Untyped list: `len` elements, or items up to [`TagKind::End`] when `None`.
    List,
    /// Typed list. A type follows the tag; a fixed list without an inline
    /// length then carries its length as an int.
    TypedList { fixed: bool },
    /// Untyped map: pairs up to [`TagKind::End`].
    Map,
    /// Typed map: a type, then pairs up to [`TagKind::End`].
    TypedMap,
    /// Terminator of variable-length lists and maps.
    End,
    /// Back-reference; `len` holds the table index.
    Ref,
}

/// A decoded tag header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub kind: TagKind,
    /// The leading byte, needed to decode compact numbers.
    pub byte: u8,
    /// Length (or reference index) carried by the header, when it has one.
    pub len: Option<usize>,
    /// Bytes consumed by the header.
    pub size: usize,
}

/// Reads one tag header at the cursor.
///
/// Length fields that belong to the header (`0x30`-style short lengths, the
/// u16 of chunk tags, the int after `'X'` and `'Q'`) are consumed here; the
/// bodies of numbers are not.
pub fn read_tag(reader: &mut Reader<'_>) -> Result<Tag, DecodeError> {
    let start = reader.x;
    let b = reader.try_u8()?;
    let (kind, len) = match b {
        0x00..=0x1f => (TagKind::String, Some((b - byte::STRING_DIRECT) as usize)),
        0x20..=0x2f => (TagKind::Binary, Some((b - byte::BINARY_DIRECT) as usize)),
        0x30..=0x33 => {
            let low = reader.try_u8()? as usize;
            (
                TagKind::String,
                Some((((b - byte::STRING_SHORT) as usize) << 8) | low),
            )
        }
        0x34..=0x37 => {
            let low = reader.try_u8()? as usize;
            (
                TagKind::Binary,
                Some((((b - byte::BINARY_SHORT) as usize) << 8) | low),
            )
        }
        0x38..=0x3f => (TagKind::Long, None),
        byte::BINARY_CHUNK => (TagKind::BinaryChunk, Some(reader.try_u16()? as usize)),
        byte::BINARY => (TagKind::Binary, Some(reader.try_u16()? as usize)),
        byte::DOUBLE => (TagKind::Double, None),
        byte::FALSE => (TagKind::False, None),
        byte::MAP_UNTYPED => (TagKind::Map, None),
        byte::INT => (TagKind::Int, None),
        byte::LONG => (TagKind::Long, None),
        byte::MAP => (TagKind::TypedMap, None),
        byte::NULL => (TagKind::Null, None),
        byte::REF => (TagKind::Ref, Some(read_count(reader)?)),
        byte::STRING_CHUNK => (TagKind::StringChunk, Some(reader.try_u16()? as usize)),
        byte::STRING => (TagKind::String, Some(reader.try_u16()? as usize)),
        byte::TRUE => (TagKind::True, None),
        byte::LIST_VARIABLE => (TagKind::TypedList { fixed: false }, None),
        byte::LIST_FIXED => (TagKind::TypedList { fixed: true }, None),
        byte::LIST_VARIABLE_UNTYPED => (TagKind::List, None),
        byte::LIST_FIXED_UNTYPED => (TagKind::List, Some(read_count(reader)?)),
        byte::LONG_INT => (TagKind::Long, None),
        byte::END => (TagKind::End, None),
        0x5b..=0x5f => (TagKind::Double, None),
        0x70..=0x77 => (
            TagKind::TypedList { fixed: true },
            Some((b - byte::LIST_DIRECT) as usize),
        ),
        0x78..=0x7f => (TagKind::List, Some((b - byte::LIST_DIRECT_UNTYPED) as usize)),
        0x80..=0xd7 => (TagKind::Int, None),
        0xd8..=0xff => (TagKind::Long, None),
        _ => return Err(DecodeError::MalformedInput { offset: start, byte: b }),
    };
    Ok(Tag {
        kind,
        byte: b,
        len,
        size: reader.x - start,
    })
}

/// Writes a tag header.
///
/// `len` selects the compact form when it fits: inline lengths for short
/// strings, binaries and lists, `'X'` + int for longer fixed lists and
/// `'W'` when `len` is `None`. For [`TagKind::Ref`] it is the table index.
/// Numeric kinds write their full-width marker only; the compact numeric
/// forms are produced by [`write_int`], [`write_long`] and [`write_double`].
///
/// Typed kinds write the marker byte alone, since the type name comes
/// first on the wire. A fixed typed list of up to seven elements carries its
/// length in that byte (`0x70..=0x77`); a longer one writes `'V'`, and the
/// caller follows it with the type and then the length as an int.
pub fn write_tag(writer: &mut Writer, kind: TagKind, len: Option<usize>) {
    let n = len.unwrap_or(0);
    match kind {
        TagKind::Null => writer.u8(byte::NULL),
        TagKind::True => writer.u8(byte::TRUE),
        TagKind::False => writer.u8(byte::FALSE),
        TagKind::Int => writer.u8(byte::INT),
        TagKind::Long => writer.u8(byte::LONG),
        TagKind::Double => writer.u8(byte::DOUBLE),
        TagKind::End => writer.u8(byte::END),
        TagKind::Map => writer.u8(byte::MAP_UNTYPED),
        TagKind::TypedMap => writer.u8(byte::MAP),
        TagKind::String => {
            if n <= byte::STRING_DIRECT_MAX {
                writer.u8(byte::STRING_DIRECT + n as u8);
            } else if n <= byte::STRING_SHORT_MAX {
                writer.u16(((byte::STRING_SHORT as u16) << 8) + n as u16);
            } else {
                writer.u8u16(byte::STRING, n as u16);
            }
        }
        TagKind::StringChunk => writer.u8u16(byte::STRING_CHUNK, n as u16),
        TagKind::Binary => {
            if n <= byte::BINARY_DIRECT_MAX {
                writer.u8(byte::BINARY_DIRECT + n as u8);
            } else if n <= byte::BINARY_SHORT_MAX {
                writer.u16(((byte::BINARY_SHORT as u16) << 8) + n as u16);
            } else {
                writer.u8u16(byte::BINARY, n as u16);
            }
        }
        TagKind::BinaryChunk => writer.u8u16(byte::BINARY_CHUNK, n as u16),
        TagKind::List => match len {
            Some(n) if n <= byte::LIST_DIRECT_MAX => {
                writer.u8(byte::LIST_DIRECT_UNTYPED + n as u8);
            }
            Some(n) => {
                writer.u8(byte::LIST_FIXED_UNTYPED);
                write_int(writer, n as i32);
            }
            None => writer.u8(byte::LIST_VARIABLE_UNTYPED),
        },
        TagKind::TypedList { fixed: false } => writer.u8(byte::LIST_VARIABLE),
        TagKind::TypedList { fixed: true } => match len {
            Some(n) if n <= byte::LIST_DIRECT_MAX => writer.u8(byte::LIST_DIRECT + n as u8),
            _ => writer.u8(byte::LIST_FIXED),
        },
        TagKind::Ref => {
            writer.u8(byte::REF);
            write_int(writer, n as i32);
        }
    }
}

// ── Numbers ───────────────────────────────────────────────────────────────

/// Writes a 32-bit int in the shortest form.
pub fn write_int(writer: &mut Writer, v: i32) {
    if INT_DIRECT.contains(&v) {
        writer.u8((v + byte::INT_ZERO as i32) as u8);
    } else if INT_BYTE.contains(&v) {
        let hi = (byte::INT_BYTE_ZERO as i32 + (v >> 8)) as u16;
        writer.u16((hi << 8) | (v & 0xff) as u16);
    } else if INT_SHORT.contains(&v) {
        writer.u8u16((byte::INT_SHORT_ZERO as i32 + (v >> 16)) as u8, v as u16);
    } else {
        writer.u8i32(byte::INT, v);
    }
}

/// Writes a 64-bit long in the shortest form.
pub fn write_long(writer: &mut Writer, v: i64) {
    if LONG_DIRECT.contains(&v) {
        writer.u8((v + byte::LONG_ZERO as i64) as u8);
    } else if LONG_BYTE.contains(&v) {
        let hi = (byte::LONG_BYTE_ZERO as i64 + (v >> 8)) as u16;
        writer.u16((hi << 8) | (v & 0xff) as u16);
    } else if LONG_SHORT.contains(&v) {
        writer.u8u16((byte::LONG_SHORT_ZERO as i64 + (v >> 16)) as u8, v as u16);
    } else if let Ok(v) = i32::try_from(v) {
        writer.u8i32(byte::LONG_INT, v);
    } else {
        writer.u8i64(byte::LONG, v);
    }
}

/// Writes a double, using a compact form only when it decodes to the same
/// bit pattern.
pub fn write_double(writer: &mut Writer, v: f64) {
    if v == 0.0 {
        if v.to_bits() == 0 {
            writer.u8(byte::DOUBLE_ZERO);
        } else {
            writer.u8f64(byte::DOUBLE, v);
        }
        return;
    }
    if v == 1.0 {
        writer.u8(byte::DOUBLE_ONE);
        return;
    }
    let b = v as i8;
    if b as f64 == v {
        writer.u16(((byte::DOUBLE_BYTE as u16) << 8) | b as u8 as u16);
        return;
    }
    let s = v as i16;
    if s as f64 == v {
        writer.u8(byte::DOUBLE_SHORT);
        writer.u16(s as u16);
        return;
    }
    let mills = (v * 1000.0) as i32;
    if 0.001 * mills as f64 == v {
        writer.u8i32(byte::DOUBLE_MILL, mills);
        return;
    }
    writer.u8f64(byte::DOUBLE, v);
}

/// Decodes the body of an int whose tag byte `b` was already consumed.
pub fn read_int_body(b: u8, reader: &mut Reader<'_>) -> Result<i32, DecodeError> {
    Ok(match b {
        0x80..=0xbf => b as i32 - byte::INT_ZERO as i32,
        0xc0..=0xcf => ((b as i32 - byte::INT_BYTE_ZERO as i32) << 8) + reader.try_u8()? as i32,
        0xd0..=0xd7 => {
            ((b as i32 - byte::INT_SHORT_ZERO as i32) << 16) + reader.try_u16()? as i32
        }
        byte::INT => reader.try_i32()?,
        _ => {
            return Err(DecodeError::MalformedInput {
                offset: reader.x - 1,
                byte: b,
            })
        }
    })
}

/// Decodes the body of a long whose tag byte `b` was already consumed.
pub fn read_long_body(b: u8, reader: &mut Reader<'_>) -> Result<i64, DecodeError> {
    Ok(match b {
        0xd8..=0xef => b as i64 - byte::LONG_ZERO as i64,
        0xf0..=0xff => {
            ((b as i64 - byte::LONG_BYTE_ZERO as i64) << 8) + reader.try_u8()? as i64
        }
        0x38..=0x3f => {
            ((b as i64 - byte::LONG_SHORT_ZERO as i64) << 16) + reader.try_u16()? as i64
        }
        byte::LONG_INT => reader.try_i32()? as i64,
        byte::LONG => reader.try_i64()?,
        _ => {
            return Err(DecodeError::MalformedInput {
                offset: reader.x - 1,
                byte: b,
            })
        }
    })
}

/// Decodes the body of a double whose tag byte `b` was already consumed.
pub fn read_double_body(b: u8, reader: &mut Reader<'_>) -> Result<f64, DecodeError> {
    Ok(match b {
        byte::DOUBLE_ZERO => 0.0,
        byte::DOUBLE_ONE => 1.0,
        byte::DOUBLE_BYTE => reader.try_u8()? as i8 as f64,
        byte::DOUBLE_SHORT => reader.try_i16()? as f64,
        byte::DOUBLE_MILL => 0.001 * reader.try_i32()? as f64,
        byte::DOUBLE => reader.try_f64()?,
        _ => {
            return Err(DecodeError::MalformedInput {
                offset: reader.x - 1,
                byte: b,
            })
        }
    })
}

/// Reads a complete int value (tag and body).
pub fn read_int(reader: &mut Reader<'_>) -> Result<i32, DecodeError> {
    let b = reader.try_u8()?;
    read_int_body(b, reader)
}

/// Reads an int used as a length or index; negative values are malformed.
pub(crate) fn read_count(reader: &mut Reader<'_>) -> Result<usize, DecodeError> {
    let start = reader.x;
    let v = read_int(reader)?;
    usize::try_from(v).map_err(|_| DecodeError::MalformedInput {
        offset: start,
        byte: reader.uint8[start],
    })
}
