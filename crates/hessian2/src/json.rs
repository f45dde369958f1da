//! Conversions between [`Value`] and `serde_json::Value`.
//!
//! JSON has no binary type, no non-string keys and no shared nodes, so the
//! mapping to JSON is lossy:
//! - `Bytes` become `"data:application/octet-stream;base64,<base64>"` strings
//! - non-string map keys become their JSON text
//! - a composite that contains itself (directly or further down) is cut at the
//!   back-edge, which becomes `null`

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value as JsonValue;

use crate::error::EncodeError;
use crate::value::{ListRef, MapRef, Value};

/// Prefix of the data URI that carries binary data in JSON.
pub const BIN_URI_START: &str = "data:application/octet-stream;base64,";

impl TryFrom<&JsonValue> for Value {
    type Error = EncodeError;

    fn try_from(json: &JsonValue) -> Result<Self, Self::Error> {
        Ok(match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(i) => Value::Int32(i),
                        Err(_) => Value::Int64(i),
                    }
                } else if let Some(u) = n.as_u64() {
                    return Err(EncodeError::UnsupportedType(format!(
                        "unsigned integer {u} is out of the int64 range"
                    )));
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Value::Str(s.clone()),
            JsonValue::Array(items) => Value::List(ListRef::from_vec(
                items
                    .iter()
                    .map(Value::try_from)
                    .collect::<Result<Vec<_>, EncodeError>>()?,
            )),
            JsonValue::Object(entries) => Value::Map(MapRef::from_vec(
                entries
                    .iter()
                    .map(|(k, v)| Ok((Value::Str(k.clone()), Value::try_from(v)?)))
                    .collect::<Result<Vec<_>, EncodeError>>()?,
            )),
        })
    }
}

impl TryFrom<JsonValue> for Value {
    type Error = EncodeError;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        Value::try_from(&json)
    }
}

impl From<&Value> for JsonValue {
    fn from(value: &Value) -> Self {
        to_json(value, &mut Vec::new())
    }
}

/// `ancestors` holds the addresses of the composites on the current path.
fn to_json(value: &Value, ancestors: &mut Vec<usize>) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int32(i) => JsonValue::from(*i),
        Value::Int64(i) => JsonValue::from(*i),
        Value::Double(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => JsonValue::String(format!("{BIN_URI_START}{}", STANDARD.encode(b))),
        Value::List(list) => {
            let addr = list.addr();
            if ancestors.contains(&addr) {
                return JsonValue::Null;
            }
            ancestors.push(addr);
            let items = list
                .items()
                .iter()
                .map(|item| to_json(item, ancestors))
                .collect();
            ancestors.pop();
            JsonValue::Array(items)
        }
        Value::Map(map) => {
            let addr = map.addr();
            if ancestors.contains(&addr) {
                return JsonValue::Null;
            }
            ancestors.push(addr);
            let mut object = serde_json::Map::new();
            for (k, v) in map.entries().iter() {
                let key = match k {
                    Value::Str(s) => s.clone(),
                    other => to_json(other, ancestors).to_string(),
                };
                object.insert(key, to_json(v, ancestors));
            }
            ancestors.pop();
            JsonValue::Object(object)
        }
    }
}
