//! Ready-made codecs for common column layouts.

use crate::codec::{value_kind, AttributeCodec, CodecError, CodecResult};
use serde_json::Value;

const LIST_SEPARATOR: char = ',';

/// Stores a list of integers as comma-joined text (`[4, 5]` <-> `"4,5"`).
///
/// An empty list is stored as `NULL`, and `NULL` or empty text decode to an
/// empty list.
pub fn comma_separated_integers() -> AttributeCodec {
    AttributeCodec::new(encode_integer_list, decode_integer_list)
}

fn encode_integer_list(structured: &Value) -> CodecResult<Value> {
    let items = match structured {
        Value::Null => return Ok(Value::Null),
        Value::Array(items) => items,
        other => {
            return Err(CodecError::InvalidValue(format!(
                "expected an integer list, found {}",
                value_kind(other)
            )))
        }
    };
    if items.is_empty() {
        return Ok(Value::Null);
    }

    let mut parts = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let number = item.as_i64().ok_or_else(|| {
            CodecError::InvalidValue(format!(
                "list item {index} is {}, expected an integer",
                value_kind(item)
            ))
        })?;
        parts.push(number.to_string());
    }

    Ok(Value::String(parts.join(",")))
}

fn decode_integer_list(raw: &Value) -> CodecResult<Value> {
    let text = match raw {
        Value::Null => return Ok(Value::Array(Vec::new())),
        Value::String(text) => text,
        // A single id may come back from an INTEGER-affinity column.
        Value::Number(number) if number.is_i64() => {
            return Ok(Value::Array(vec![Value::Number(number.clone())]))
        }
        other => {
            return Err(CodecError::UnexpectedRaw {
                expected: "string",
                found: value_kind(other),
            })
        }
    };
    if text.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }

    text.split(LIST_SEPARATOR)
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|err| {
                    CodecError::InvalidValue(format!("`{part}` is not an integer: {err}"))
                })
        })
        .collect::<CodecResult<Vec<_>>>()
        .map(Value::Array)
}
