//! Re-serialization of the stringified fields.

use std::collections::BTreeSet;
use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};

use crate::error::FilterError;

/// Compact JSON with a space after `,` and `:`, the layout the host
/// catalog writes these fields in.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

pub fn to_spaced_json(value: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut serializer)?;
    // serde_json only ever writes valid UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Turns the maps and lists found under `keys` back into JSON text.
/// Scalars are left as they are, so a plain-text value is never quoted
/// twice.
pub fn encode(
    mut map: Map<String, Value>,
    keys: &BTreeSet<String>,
) -> Result<Map<String, Value>, FilterError> {
    for (key, value) in map.iter_mut() {
        if !keys.contains(key) || !matches!(value, Value::Object(_) | Value::Array(_)) {
            continue;
        }
        let text = to_spaced_json(value).map_err(|e| FilterError::Encode {
            key: key.clone(),
            message: e.to_string(),
        })?;
        *value = Value::String(text);
    }
    Ok(map)
}
