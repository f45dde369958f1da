//! Writes [`Value`] graphs as Hessian 2 bytes.

use std::collections::HashMap;

use hessian2_buffers::Writer;

use crate::error::EncodeError;
use crate::options::EncoderOptions;
use crate::tag::{write_double, write_int, write_long, write_tag, TagKind};
use crate::value::{ListRef, MapRef, Value};

/// Hessian 2 encoder.
///
/// Each [`encode`](Encoder::encode) call appends one top-level value to the
/// internal buffer; the buffer can hold any number of them back to back.
///
/// # Example
///
/// ```
/// use hessian2::{Decoder, Encoder, Value};
///
/// let mut encoder = Encoder::new();
/// encoder.encode(&Value::list([Value::Int32(1), Value::from("x")])).unwrap();
/// encoder.encode(&Value::Null).unwrap();
///
/// let mut decoder = Decoder::new(encoder.buffer());
/// assert_eq!(decoder.decode().unwrap().as_list().unwrap().len(), 2);
/// assert_eq!(decoder.decode().unwrap(), Value::Null);
/// ```
pub struct Encoder {
    writer: Writer,
    options: EncoderOptions,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// A list or map whose children are being written.
enum Frame {
    List { list: ListRef, next: usize },
    /// `next` counts key and value slots: even is a key, odd a value.
    Map { map: MapRef, next: usize },
}

enum Step {
    Written,
    Open(Value),
    Close { end_marker: bool },
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_options(EncoderOptions::default())
    }

    pub fn with_options(options: EncoderOptions) -> Self {
        Self {
            writer: Writer::with_alloc_size(4 * 1024),
            options,
        }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Appends `value` to the buffer.
    ///
    /// On error nothing of `value` remains in the buffer.
    pub fn encode(&mut self, value: &Value) -> Result<(), EncodeError> {
        let start = self.writer.x;
        match self.write_graph(value) {
            Ok(refs) => {
                tracing::trace!(
                    bytes = self.writer.x - start,
                    refs,
                    "hessian2 value encoded"
                );
                Ok(())
            }
            Err(e) => {
                self.writer.truncate(start);
                tracing::debug!(offset = start, error = %e, "hessian2 encode failed");
                Err(e)
            }
        }
    }

    /// Maps `json` to a [`Value`] and appends it.
    pub fn encode_json(&mut self, json: &serde_json::Value) -> Result<(), EncodeError> {
        let value = Value::try_from(json)?;
        self.encode(&value)
    }

    /// Everything encoded so far.
    pub fn buffer(&self) -> &[u8] {
        self.writer.as_slice()
    }

    /// Discards the buffered output.
    pub fn reset(&mut self) {
        self.writer.reset();
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.writer.flush()
    }

    /// Writes one top-level value and returns the size of its reference
    /// table.
    fn write_graph(&mut self, root: &Value) -> Result<usize, EncodeError> {
        // Composite address -> reference index, in first-visit order.
        let mut refs: HashMap<usize, usize> = HashMap::new();
        let mut stack: Vec<Frame> = Vec::new();

        if let Step::Open(value) = self.emit(root) {
            self.open(value, &mut refs, &mut stack)?;
        }

        while let Some(frame) = stack.last_mut() {
            let step = match frame {
                Frame::List { list, next } => {
                    let items = list.items();
                    match items.get(*next) {
                        Some(item) => {
                            *next += 1;
                            self.emit(item)
                        }
                        None => Step::Close { end_marker: false },
                    }
                }
                Frame::Map { map, next } => {
                    let entries = map.entries();
                    match entries.get(*next / 2) {
                        Some((key, value)) => {
                            let item = if *next % 2 == 0 { key } else { value };
                            *next += 1;
                            self.emit(item)
                        }
                        None => Step::Close { end_marker: true },
                    }
                }
            };
            match step {
                Step::Written => {}
                Step::Open(value) => self.open(value, &mut refs, &mut stack)?,
                Step::Close { end_marker } => {
                    if end_marker {
                        write_tag(&mut self.writer, TagKind::End, None);
                    }
                    stack.pop();
                }
            }
        }
        Ok(refs.len())
    }

    /// Writes a scalar, or hands a composite back to the traversal.
    fn emit(&mut self, value: &Value) -> Step {
        let writer = &mut self.writer;
        match value {
            Value::Null => write_tag(writer, TagKind::Null, None),
            Value::Bool(true) => write_tag(writer, TagKind::True, None),
            Value::Bool(false) => write_tag(writer, TagKind::False, None),
            Value::Int32(v) => write_int(writer, *v),
            Value::Int64(v) => write_long(writer, *v),
            Value::Double(v) => write_double(writer, *v),
            Value::Str(s) => self.write_str(s),
            Value::Bytes(b) => self.write_bytes(b),
            Value::List(_) | Value::Map(_) => return Step::Open(value.clone()),
        }
        Step::Written
    }

    /// Writes a back-reference for a composite seen before, or registers it
    /// and writes its header.
    ///
    /// Registration happens before any child is written so that a child can
    /// refer back to this composite.
    fn open(
        &mut self,
        value: Value,
        refs: &mut HashMap<usize, usize>,
        stack: &mut Vec<Frame>,
    ) -> Result<(), EncodeError> {
        let addr = match &value {
            Value::List(list) => list.addr(),
            Value::Map(map) => map.addr(),
            _ => return Ok(()),
        };
        if let Some(&index) = refs.get(&addr) {
            write_tag(&mut self.writer, TagKind::Ref, Some(index));
            return Ok(());
        }
        if stack.len() >= self.options.max_depth {
            return Err(EncodeError::DepthExceeded {
                max_depth: self.options.max_depth,
            });
        }
        let index = refs.len();
        refs.insert(addr, index);
        match value {
            Value::List(list) => {
                write_tag(&mut self.writer, TagKind::List, Some(list.len()));
                stack.push(Frame::List { list, next: 0 });
            }
            Value::Map(map) => {
                write_tag(&mut self.writer, TagKind::Map, None);
                stack.push(Frame::Map { map, next: 0 });
            }
            _ => {}
        }
        Ok(())
    }

    /// Writes a string, split into chunks of at most `chunk_size` UTF-16
    /// units. A character is never split across chunks.
    fn write_str(&mut self, s: &str) {
        let chunk = self.options.effective_chunk_size();
        let writer = &mut self.writer;

        if s.is_ascii() {
            let mut rest = s.as_bytes();
            while rest.len() > chunk {
                write_tag(writer, TagKind::StringChunk, Some(chunk));
                writer.buf(&rest[..chunk]);
                rest = &rest[chunk..];
            }
            write_tag(writer, TagKind::String, Some(rest.len()));
            writer.buf(rest);
            return;
        }

        let mut start = 0;
        let mut units = 0;
        for (i, c) in s.char_indices() {
            let width = c.len_utf16();
            if units > 0 && units + width > chunk {
                write_tag(writer, TagKind::StringChunk, Some(units));
                writer.buf(&s.as_bytes()[start..i]);
                start = i;
                units = 0;
            }
            units += width;
        }
        write_tag(writer, TagKind::String, Some(units));
        writer.buf(&s.as_bytes()[start..]);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let chunk = self.options.effective_chunk_size();
        let writer = &mut self.writer;
        let mut rest = bytes;
        while rest.len() > chunk {
            write_tag(writer, TagKind::BinaryChunk, Some(chunk));
            writer.buf(&rest[..chunk]);
            rest = &rest[chunk..];
        }
        write_tag(writer, TagKind::Binary, Some(rest.len()));
        writer.buf(rest);
    }
}
