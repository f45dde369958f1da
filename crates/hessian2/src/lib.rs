//! Hessian 2 binary serialization for dynamically-typed value graphs.
//!
//! [`Value`] is the data model: scalars, strings, binaries, lists and maps.
//! Lists and maps are shared handles, so a graph may reuse a node or even
//! contain itself. [`Encoder`] writes such a graph, emitting a back-reference
//! the second time it meets a node; [`Decoder`] rebuilds it with the same
//! sharing.
//!
//! Both sides walk the graph with an explicit stack, so nesting depth is
//! bounded only by the configured limit, never by the call stack.
//!
//! # Example
//!
//! ```
//! use hessian2::{decode, encode, Value};
//!
//! let value = Value::map([
//!     (Value::from("name"), Value::from("hessian")),
//!     (Value::from("ids"), Value::list([Value::Int32(1), Value::Int64(2)])),
//! ]);
//! let bytes = encode(&value).unwrap();
//! assert_eq!(decode(&bytes).unwrap(), value);
//! ```

mod decoder;
mod encoder;
mod error;
mod value;

pub mod cli;
pub mod json;
pub mod options;
pub mod tag;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{DecodeError, EncodeError};
pub use options::{DecoderOptions, EncoderOptions};
pub use value::{ListRef, MapRef, Value};

/// Encodes one value with default options.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Decodes the first value in `data` with default options. Trailing bytes
/// are ignored; use [`Decoder`] to read a sequence of values.
pub fn decode(data: &[u8]) -> Result<Value, DecodeError> {
    Decoder::new(data).decode()
}

/// Decodes every value in `data`.
pub fn decode_all(data: &[u8]) -> Result<Vec<Value>, DecodeError> {
    let mut decoder = Decoder::new(data);
    let mut values = Vec::new();
    while decoder.remaining() > 0 {
        values.push(decoder.decode()?);
    }
    Ok(values)
}
