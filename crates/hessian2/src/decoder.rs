//! Reads Hessian 2 bytes back into [`Value`] graphs.

use hessian2_buffers::Reader;

use crate::error::DecodeError;
use crate::options::DecoderOptions;
use crate::tag::{
    byte, read_count, read_double_body, read_int_body, read_long_body, read_tag, Tag, TagKind,
};
use crate::value::{ListRef, MapRef, Value};

/// Hessian 2 decoder over a borrowed byte slice.
///
/// Each [`decode`](Decoder::decode) call reads exactly one top-level value
/// and leaves the cursor after it, so a buffer holding several values is
/// read by calling `decode` until [`remaining`](Decoder::remaining) is zero.
/// A failed call leaves the cursor where the value started.
pub struct Decoder<'a> {
    reader: Reader<'a>,
    options: DecoderOptions,
}

/// A list or map still receiving children.
enum Frame {
    /// `remaining` is `None` for lists closed by an end marker.
    List {
        list: ListRef,
        remaining: Option<usize>,
    },
    Map {
        map: MapRef,
        key: Option<Value>,
    },
}

impl Frame {
    fn accept(&mut self, value: Value) {
        match self {
            Frame::List { list, remaining } => {
                list.push(value);
                if let Some(n) = remaining {
                    *n -= 1;
                }
            }
            Frame::Map { map, key } => match key.take() {
                Some(k) => map.push(k, value),
                None => *key = Some(value),
            },
        }
    }

    fn into_value(self) -> Value {
        match self {
            Frame::List { list, .. } => Value::List(list),
            Frame::Map { map, .. } => Value::Map(map),
        }
    }
}

/// Upper bound on the elements reserved for one fixed-length list before
/// any of them has been read.
const MAX_PREALLOC: usize = 1024;

/// Per-call decoding tables.
#[derive(Default)]
struct Tables {
    /// Composites in the order their headers were read.
    refs: Vec<Value>,
    /// Number of type names seen. Names are skipped, only the count is needed
    /// to validate type references.
    types: usize,
    /// List elements that may still be reserved up front during this call.
    /// Starts at the input length, since every element takes at least one
    /// byte, and is shared by all lists so nesting cannot multiply it.
    prealloc: usize,
}

impl Tables {
    fn new(input: usize) -> Self {
        Self {
            prealloc: input,
            ..Self::default()
        }
    }

    /// Empties every composite read so far. A failed call returns none of
    /// them, so any back-reference cycle among them would otherwise never
    /// be freed.
    fn discard(&mut self) {
        for value in self.refs.drain(..) {
            match value {
                Value::List(list) => list.clear(),
                Value::Map(map) => map.clear(),
                _ => {}
            }
        }
    }
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, DecoderOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: DecoderOptions) -> Self {
        Self {
            reader: Reader::new(data),
            options,
        }
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Current cursor offset.
    pub fn position(&self) -> usize {
        self.reader.x
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.reader.size()
    }

    /// Reads the next top-level value.
    pub fn decode(&mut self) -> Result<Value, DecodeError> {
        let start = self.reader.x;
        let mut tables = Tables::new(self.reader.size());
        match self.read_graph(&mut tables) {
            Ok(value) => {
                tracing::trace!(
                    bytes = self.reader.x - start,
                    refs = tables.refs.len(),
                    "hessian2 value decoded"
                );
                Ok(value)
            }
            Err(e) => {
                tables.discard();
                self.reader.x = start;
                tracing::debug!(offset = start, error = %e, "hessian2 decode failed");
                Err(e)
            }
        }
    }

    fn read_graph(&mut self, tables: &mut Tables) -> Result<Value, DecodeError> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            if let Some(frame) = stack.last() {
                let done = match frame {
                    Frame::List {
                        remaining: Some(n), ..
                    } => *n == 0,
                    Frame::List {
                        remaining: None, ..
                    }
                    | Frame::Map { key: None, .. } => self.try_end()?,
                    Frame::Map { key: Some(_), .. } => false,
                };
                if done {
                    if let Some(frame) = stack.pop() {
                        if stack.is_empty() {
                            return Ok(frame.into_value());
                        }
                    }
                    continue;
                }
            }

            let offset = self.reader.x;
            let tag = read_tag(&mut self.reader)?;
            let (value, frame) = match tag.kind {
                TagKind::List | TagKind::TypedList { .. } | TagKind::Map | TagKind::TypedMap => {
                    let frame = self.open(tag, tables, stack.len())?;
                    (frame_handle(&frame), Some(frame))
                }
                _ => (self.read_scalar(tag, offset, tables)?, None),
            };
            match stack.last_mut() {
                Some(parent) => parent.accept(value),
                None if frame.is_none() => return Ok(value),
                None => {}
            }
            if let Some(frame) = frame {
                stack.push(frame);
            }
        }
    }

    /// Consumes an end marker if one is next.
    fn try_end(&mut self) -> Result<bool, DecodeError> {
        if self.reader.try_peek()? == byte::END {
            self.reader.x += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Reads the rest of a list or map header, registers the new composite
    /// and returns the frame that will collect its children.
    fn open(&mut self, tag: Tag, tables: &mut Tables, depth: usize) -> Result<Frame, DecodeError> {
        if depth >= self.options.max_depth {
            return Err(DecodeError::DepthExceeded {
                max_depth: self.options.max_depth,
            });
        }
        let frame = match tag.kind {
            TagKind::TypedList { fixed } => {
                self.skip_type(tables)?;
                let remaining = match (fixed, tag.len) {
                    (true, Some(n)) => Some(n),
                    (true, None) => Some(read_count(&mut self.reader)?),
                    (false, _) => None,
                };
                list_frame(remaining, tables)
            }
            TagKind::TypedMap => {
                self.skip_type(tables)?;
                Frame::Map {
                    map: MapRef::new(),
                    key: None,
                }
            }
            TagKind::List => list_frame(tag.len, tables),
            _ => Frame::Map {
                map: MapRef::new(),
                key: None,
            },
        };
        tables.refs.push(frame_handle(&frame));
        Ok(frame)
    }

    /// Reads a type name or type reference.
    fn skip_type(&mut self, tables: &mut Tables) -> Result<(), DecodeError> {
        let offset = self.reader.x;
        let tag = read_tag(&mut self.reader)?;
        match tag.kind {
            TagKind::String | TagKind::StringChunk => {
                self.read_string(tag, offset)?;
                tables.types += 1;
                Ok(())
            }
            TagKind::Int => {
                let index = read_int_body(tag.byte, &mut self.reader)?;
                match usize::try_from(index) {
                    Ok(index) if index < tables.types => Ok(()),
                    Ok(index) => Err(DecodeError::InvalidReference {
                        index,
                        len: tables.types,
                    }),
                    Err(_) => Err(DecodeError::MalformedInput {
                        offset,
                        byte: tag.byte,
                    }),
                }
            }
            _ => Err(DecodeError::MalformedInput {
                offset,
                byte: tag.byte,
            }),
        }
    }

    fn read_scalar(
        &mut self,
        tag: Tag,
        offset: usize,
        tables: &Tables,
    ) -> Result<Value, DecodeError> {
        Ok(match tag.kind {
            TagKind::Null => Value::Null,
            TagKind::True => Value::Bool(true),
            TagKind::False => Value::Bool(false),
            TagKind::Int => Value::Int32(read_int_body(tag.byte, &mut self.reader)?),
            TagKind::Long => Value::Int64(read_long_body(tag.byte, &mut self.reader)?),
            TagKind::Double => Value::Double(read_double_body(tag.byte, &mut self.reader)?),
            TagKind::String | TagKind::StringChunk => Value::Str(self.read_string(tag, offset)?),
            TagKind::Binary | TagKind::BinaryChunk => Value::Bytes(self.read_binary(tag, offset)?),
            TagKind::Ref => {
                let index = tag.len.unwrap_or(0);
                match tables.refs.get(index) {
                    Some(target) => target.clone(),
                    None => {
                        return Err(DecodeError::InvalidReference {
                            index,
                            len: tables.refs.len(),
                        })
                    }
                }
            }
            _ => {
                return Err(DecodeError::MalformedInput {
                    offset,
                    byte: tag.byte,
                })
            }
        })
    }

    /// Reads a string whose first chunk header is `tag`.
    ///
    /// Chunk payloads are collected as raw bytes and validated once, so a
    /// surrogate pair split across two chunks still decodes.
    fn read_string(&mut self, tag: Tag, offset: usize) -> Result<String, DecodeError> {
        let mut bytes: Vec<u8> = Vec::new();
        let mut tag = tag;
        loop {
            let units = tag.len.unwrap_or(0);
            let data = self.reader.uint8;
            let start = self.reader.x;
            let end = scan_utf16_units(data, start, units, offset)?;
            bytes.extend_from_slice(&data[start..end]);
            self.reader.x = end;
            if tag.kind == TagKind::String {
                break;
            }
            let chunk_offset = self.reader.x;
            tag = read_tag(&mut self.reader)?;
            if !matches!(tag.kind, TagKind::String | TagKind::StringChunk) {
                return Err(DecodeError::MalformedInput {
                    offset: chunk_offset,
                    byte: tag.byte,
                });
            }
        }
        match String::from_utf8(bytes) {
            Ok(s) => Ok(s),
            Err(e) => decode_cesu8(e.as_bytes()).ok_or(DecodeError::InvalidUtf8 { offset }),
        }
    }

    fn read_binary(&mut self, tag: Tag, offset: usize) -> Result<Vec<u8>, DecodeError> {
        let first = self.reader.try_buf(tag.len.unwrap_or(0))?;
        if tag.kind == TagKind::Binary {
            return Ok(first.to_vec());
        }
        let mut bytes = first.to_vec();
        loop {
            let chunk_offset = self.reader.x;
            let tag = read_tag(&mut self.reader)?;
            if !matches!(tag.kind, TagKind::Binary | TagKind::BinaryChunk) {
                return Err(DecodeError::MalformedInput {
                    offset: chunk_offset,
                    byte: tag.byte,
                });
            }
            bytes.extend_from_slice(self.reader.try_buf(tag.len.unwrap_or(0))?);
            if tag.kind == TagKind::Binary {
                tracing::trace!(offset, len = bytes.len(), "chunked binary reassembled");
                return Ok(bytes);
            }
        }
    }
}

fn list_frame(remaining: Option<usize>, tables: &mut Tables) -> Frame {
    let capacity = remaining
        .unwrap_or(0)
        .min(tables.prealloc)
        .min(MAX_PREALLOC);
    tables.prealloc -= capacity;
    Frame::List {
        list: ListRef::with_capacity(capacity),
        remaining,
    }
}

fn frame_handle(frame: &Frame) -> Value {
    match frame {
        Frame::List { list, .. } => Value::List(list.clone()),
        Frame::Map { map, .. } => Value::Map(map.clone()),
    }
}

/// Returns the offset just past `units` UTF-16 code units of UTF-8 text
/// starting at `start`.
///
/// Supplementary characters count as two units. Surrogates encoded on their
/// own (CESU-8) are three-byte sequences and count as one each. `string_at`
/// is the offset reported for invalid text.
fn scan_utf16_units(
    data: &[u8],
    start: usize,
    units: usize,
    string_at: usize,
) -> Result<usize, DecodeError> {
    let end = start + units;
    if end <= data.len() && data[start..end].is_ascii() {
        return Ok(end);
    }
    let mut x = start;
    let mut left = units;
    while left > 0 {
        let Some(&b) = data.get(x) else {
            return Err(DecodeError::UnexpectedEof {
                offset: x,
                needed: left,
            });
        };
        let (width, count) = match b {
            0x00..=0x7f => (1, 1),
            0xc0..=0xdf => (2, 1),
            0xe0..=0xef => (3, 1),
            0xf0..=0xf7 => (4, 2),
            _ => return Err(DecodeError::InvalidUtf8 { offset: string_at }),
        };
        if count > left {
            return Err(DecodeError::InvalidUtf8 { offset: string_at });
        }
        if x + width > data.len() {
            return Err(DecodeError::UnexpectedEof {
                offset: x,
                needed: x + width - data.len() + (left - count),
            });
        }
        x += width;
        left -= count;
    }
    Ok(x)
}

/// Decodes UTF-8 that may carry supplementary characters as CESU-8
/// surrogate pairs. Returns `None` for anything else that is not UTF-8,
/// including unpaired surrogates.
fn decode_cesu8(bytes: &[u8]) -> Option<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.push_str(s);
                return Some(out);
            }
            Err(e) => {
                let (valid, tail) = rest.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).ok()?);
                match tail {
                    [0xed, hi1 @ 0xa0..=0xaf, hi2, 0xed, lo1 @ 0xb0..=0xbf, lo2, ..] => {
                        let hi = ((*hi1 as u32 & 0x0f) << 6) | (*hi2 as u32 & 0x3f);
                        let lo = ((*lo1 as u32 & 0x0f) << 6) | (*lo2 as u32 & 0x3f);
                        out.push(char::from_u32(0x10000 + (hi << 10) + lo)?);
                        rest = &tail[6..];
                    }
                    _ => return None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(data: &[u8]) -> Result<Value, DecodeError> {
        Decoder::new(data).decode()
    }

    #[test]
    fn scalars() {
        assert_eq!(decode(b"N"), Ok(Value::Null));
        assert_eq!(decode(b"T"), Ok(Value::Bool(true)));
        assert_eq!(decode(&[0x90]), Ok(Value::Int32(0)));
        assert_eq!(decode(&[0xe1]), Ok(Value::Int64(1)));
        assert_eq!(decode(&[0x5c]), Ok(Value::Double(1.0)));
        assert_eq!(decode(&[0x02, b'h', b'i']), Ok(Value::from("hi")));
        assert_eq!(decode(&[0x21, 0xff]), Ok(Value::Bytes(vec![0xff])));
    }

    #[test]
    fn nested_containers() {
        // {"a": [1, 2]}
        let data = [b'H', 0x01, b'a', 0x7a, 0x91, 0x92, b'Z'];
        let value = decode(&data).unwrap();
        let list = value.as_map().unwrap().get("a").unwrap();
        assert_eq!(list, Value::list([Value::Int32(1), Value::Int32(2)]));
    }

    #[test]
    fn back_reference_shares_identity() {
        let data = [0x7a, 0x79, 0x97, b'Q', 0x91];
        let value = decode(&data).unwrap();
        let items = value.as_list().unwrap().items();
        let (Value::List(a), Value::List(b)) = (&items[0], &items[1]) else {
            panic!("expected two lists");
        };
        assert!(a.ptr_eq(b));
    }

    #[test]
    fn self_reference_is_rebuilt() {
        let data = [b'H', 0x01, b'k', b'Q', 0x90, b'Z'];
        let value = decode(&data).unwrap();
        let map = value.as_map().unwrap().clone();
        let Some(Value::Map(inner)) = map.get("k") else {
            panic!("expected map");
        };
        assert!(inner.ptr_eq(&map));
        map.clear();
    }

    #[test]
    fn invalid_reference() {
        assert_eq!(
            decode(&[0x79, b'Q', 0x91]),
            Err(DecodeError::InvalidReference { index: 1, len: 1 })
        );
        assert_eq!(
            decode(&[b'Q', 0x90]),
            Err(DecodeError::InvalidReference { index: 0, len: 0 })
        );
    }

    #[test]
    fn variable_and_typed_forms() {
        // 'W' 1 2 'Z'
        assert_eq!(
            decode(&[b'W', 0x91, 0x92, b'Z']),
            Ok(Value::list([Value::Int32(1), Value::Int32(2)]))
        );
        // 'V' "t" len=1 'N', then 0x71 with type ref 0
        let data = [b'X', 0x92, b'V', 0x01, b't', 0x91, b'N', 0x71, 0x90, b'T'];
        let value = decode(&data).unwrap();
        assert_eq!(
            value,
            Value::list([Value::list([Value::Null]), Value::list([Value::Bool(true)])])
        );
        // 'U' "t" 'N' 'Z'
        assert_eq!(
            decode(&[b'U', 0x01, b't', b'N', b'Z']),
            Ok(Value::list([Value::Null]))
        );
        // 'M' "t" 1 -> 2 'Z'
        assert_eq!(
            decode(&[b'M', 0x01, b't', 0x91, 0x92, b'Z']),
            Ok(Value::map([(Value::Int32(1), Value::Int32(2))]))
        );
    }

    #[test]
    fn bad_type_reference() {
        assert_eq!(
            decode(&[0x71, 0x90, b'N']),
            Err(DecodeError::InvalidReference { index: 0, len: 0 })
        );
        assert_eq!(
            decode(&[b'M', b'N', b'Z']),
            Err(DecodeError::MalformedInput {
                offset: 1,
                byte: b'N'
            })
        );
    }

    #[test]
    fn end_marker_out_of_place() {
        assert_eq!(
            decode(&[b'Z']),
            Err(DecodeError::MalformedInput {
                offset: 0,
                byte: b'Z'
            })
        );
        // map with a key but no value
        assert_eq!(
            decode(&[b'H', 0x91, b'Z']),
            Err(DecodeError::MalformedInput {
                offset: 2,
                byte: b'Z'
            })
        );
        // fixed list cut short by an end marker
        assert_eq!(
            decode(&[0x7a, 0x91, b'Z']),
            Err(DecodeError::MalformedInput {
                offset: 2,
                byte: b'Z'
            })
        );
    }

    #[test]
    fn chunked_string_is_joined() {
        let data = b"R\x00\x03abcR\x00\x02de\x01f";
        assert_eq!(decode(data), Ok(Value::from("abcdef")));
    }

    #[test]
    fn chunk_followed_by_non_string() {
        assert_eq!(
            decode(b"R\x00\x01aN"),
            Err(DecodeError::MalformedInput {
                offset: 4,
                byte: b'N'
            })
        );
    }

    #[test]
    fn string_length_counts_utf16_units() {
        let s = "\u{1F600}é";
        let mut data = vec![0x03];
        data.extend_from_slice(s.as_bytes());
        data.push(b'N');
        let mut decoder = Decoder::new(&data);
        assert_eq!(decoder.decode(), Ok(Value::from(s)));
        assert_eq!(decoder.decode(), Ok(Value::Null));
    }

    #[test]
    fn cesu8_surrogate_pair_is_accepted() {
        // U+1F600 as two three-byte surrogates
        let data = [0x02, 0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80];
        assert_eq!(decode(&data), Ok(Value::from("\u{1F600}")));
    }

    #[test]
    fn surrogate_pair_split_across_chunks() {
        let data = [
            b'R', 0x00, 0x01, 0xed, 0xa0, 0xbd, 0x01, 0xed, 0xb8, 0x80,
        ];
        assert_eq!(decode(&data), Ok(Value::from("\u{1F600}")));
    }

    #[test]
    fn invalid_utf8() {
        assert_eq!(
            decode(&[0x01, 0xff]),
            Err(DecodeError::InvalidUtf8 { offset: 0 })
        );
        // lone high surrogate, after a value so the offset is not zero
        let data = [b'N', 0x01, 0xed, 0xa0, 0xbd];
        let mut decoder = Decoder::new(&data);
        decoder.decode().unwrap();
        assert_eq!(decoder.decode(), Err(DecodeError::InvalidUtf8 { offset: 1 }));
    }

    #[test]
    fn truncated_string() {
        assert_eq!(
            decode(&[0x03, b'a']),
            Err(DecodeError::UnexpectedEof {
                offset: 2,
                needed: 2
            })
        );
        assert_eq!(
            decode(&[0x01, 0xe2, 0x82]),
            Err(DecodeError::UnexpectedEof {
                offset: 1,
                needed: 1
            })
        );
    }

    #[test]
    fn chunked_binary_is_joined() {
        let data = [b'A', 0x00, 0x02, 1, 2, b'A', 0x00, 0x00, 0x21, 3];
        assert_eq!(decode(&data), Ok(Value::Bytes(vec![1, 2, 3])));
    }

    #[test]
    fn error_restores_cursor() {
        let data = [0x91, 0x7a, 0x91];
        let mut decoder = Decoder::new(&data);
        assert_eq!(decoder.decode(), Ok(Value::Int32(1)));
        assert!(decoder.decode().unwrap_err().is_incomplete());
        assert_eq!(decoder.position(), 1);
        assert_eq!(decoder.remaining(), 2);
    }

    #[test]
    fn depth_limit() {
        let options = DecoderOptions { max_depth: 2 };
        let ok = [0x79, 0x78];
        assert!(Decoder::with_options(&ok, options).decode().is_ok());
        let deep = [0x79, 0x79, 0x78];
        assert_eq!(
            Decoder::with_options(&deep, options).decode(),
            Err(DecodeError::DepthExceeded { max_depth: 2 })
        );
    }

    #[test]
    fn huge_declared_length_does_not_preallocate() {
        // 'X' with a length of i32::MAX and no elements
        let data = [b'X', b'I', 0x7f, 0xff, 0xff, 0xff];
        assert!(decode(&data).unwrap_err().is_incomplete());
    }

    #[test]
    fn nested_lists_share_one_reservation() {
        let header = [b'X', b'I', 0x7f, 0xff, 0xff, 0xff];
        let mut data = header.repeat(50);
        data.extend(std::iter::repeat(0x40).take(10_000));
        let mut decoder = Decoder::new(&data);
        let mut tables = Tables::new(decoder.remaining());
        assert_eq!(
            decoder.read_graph(&mut tables),
            Err(DecodeError::MalformedInput {
                offset: 300,
                byte: 0x40
            })
        );
        let reserved: usize = tables
            .refs
            .iter()
            .filter_map(Value::as_list)
            .map(ListRef::capacity)
            .sum();
        assert!(reserved <= data.len(), "{reserved} elements reserved");
        assert_eq!(
            tables.refs[0].as_list().map(ListRef::capacity),
            Some(MAX_PREALLOC)
        );
        tables.discard();
    }

    #[test]
    fn failed_decode_empties_partial_cycles() {
        // self-referencing map with no end marker
        let data = [b'H', 0x01, b'k', b'Q', 0x90];
        let mut decoder = Decoder::new(&data);
        let mut tables = Tables::new(data.len());
        assert!(decoder.read_graph(&mut tables).unwrap_err().is_incomplete());
        let Some(Value::Map(map)) = tables.refs.first().cloned() else {
            panic!("expected the map to be registered");
        };
        assert_eq!(map.handle_count(), 3);

        tables.discard();
        assert!(map.is_empty());
        assert!(tables.refs.is_empty());
        assert_eq!(map.handle_count(), 1);
    }

    #[test]
    fn failed_decode_empties_cycles_through_lists() {
        // [ {k: Q0}, ... truncated
        let data = [0x7a, b'H', 0x01, b'k', b'Q', 0x90, b'Z'];
        let mut decoder = Decoder::new(&data);
        let mut tables = Tables::new(data.len());
        assert!(decoder.read_graph(&mut tables).unwrap_err().is_incomplete());
        let Some(Value::List(list)) = tables.refs.first().cloned() else {
            panic!("expected the list to be registered");
        };
        tables.discard();
        assert!(list.is_empty());
        assert_eq!(list.handle_count(), 1);
    }

    #[test]
    fn reference_table_is_per_call() {
        let data = [0x78, b'Q', 0x90];
        let mut decoder = Decoder::new(&data);
        decoder.decode().unwrap();
        assert_eq!(
            decoder.decode(),
            Err(DecodeError::InvalidReference { index: 0, len: 0 })
        );
    }
}
