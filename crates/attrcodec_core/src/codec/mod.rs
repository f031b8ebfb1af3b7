//! Attribute codecs: conversion between raw column values and structured values.
//!
//! # Responsibility
//! - Define the `serialize`/`unserialize` function pair applied per attribute.
//! - Provide the JSON codec used when a registration supplies no functions.
//!
//! # Invariants
//! - `decode(encode(x)) == x` is expected from every codec pair; it is a
//!   contract on the functions, not something this module checks.
//! - Codec failures are returned, never swallowed.
//!
//! # See also
//! - `codec::registrar` for the lifecycle wiring.

use serde_json::Value;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub mod builtin;
pub mod registrar;

/// Function turning a structured value into its stored form.
pub type SerializeFn = Arc<dyn Fn(&Value) -> Result<Value, CodecError> + Send + Sync>;
/// Function turning a stored value back into its structured form.
pub type UnserializeFn = Arc<dyn Fn(&Value) -> Result<Value, CodecError> + Send + Sync>;

pub type CodecResult<T> = Result<T, CodecError>;

/// Failure raised by an encode or decode function.
#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
    /// Raw value had a shape the decoder cannot read.
    UnexpectedRaw {
        expected: &'static str,
        found: &'static str,
    },
    InvalidValue(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "json codec failed: {err}"),
            Self::UnexpectedRaw { expected, found } => {
                write!(f, "expected raw {expected} value, found {found}")
            }
            Self::InvalidValue(message) => write!(f, "invalid value: {message}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::UnexpectedRaw { .. } | Self::InvalidValue(_) => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Returns a short name for the JSON kind of `value`, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Encode/decode pair shared by every attribute of one registration.
#[derive(Clone)]
pub struct AttributeCodec {
    serialize: SerializeFn,
    unserialize: UnserializeFn,
}

impl AttributeCodec {
    pub fn new<S, U>(serialize: S, unserialize: U) -> Self
    where
        S: Fn(&Value) -> Result<Value, CodecError> + Send + Sync + 'static,
        U: Fn(&Value) -> Result<Value, CodecError> + Send + Sync + 'static,
    {
        Self {
            serialize: Arc::new(serialize),
            unserialize: Arc::new(unserialize),
        }
    }

    /// Codec storing values as compact JSON text.
    pub fn json() -> Self {
        Self {
            serialize: default_serialize(),
            unserialize: default_unserialize(),
        }
    }

    pub fn encode(&self, structured: &Value) -> CodecResult<Value> {
        (self.serialize)(structured)
    }

    pub fn decode(&self, raw: &Value) -> CodecResult<Value> {
        (self.unserialize)(raw)
    }
}

impl Debug for AttributeCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeCodec").finish_non_exhaustive()
    }
}

impl Default for AttributeCodec {
    fn default() -> Self {
        Self::json()
    }
}

/// Registration options for `custom_serialize`.
///
/// Either function may be left out; the missing one falls back to the JSON
/// codec when the options are resolved.
#[derive(Clone, Default)]
pub struct CodecOptions {
    serialize: Option<SerializeFn>,
    unserialize: Option<UnserializeFn>,
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serialize<F>(mut self, serialize: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, CodecError> + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(serialize));
        self
    }

    pub fn unserialize<F>(mut self, unserialize: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, CodecError> + Send + Sync + 'static,
    {
        self.unserialize = Some(Arc::new(unserialize));
        self
    }

    pub fn has_serialize(&self) -> bool {
        self.serialize.is_some()
    }

    pub fn has_unserialize(&self) -> bool {
        self.unserialize.is_some()
    }

    /// Resolves the options into a codec, filling gaps with the JSON defaults.
    pub fn into_codec(self) -> AttributeCodec {
        AttributeCodec {
            serialize: self.serialize.unwrap_or_else(default_serialize),
            unserialize: self.unserialize.unwrap_or_else(default_unserialize),
        }
    }
}

impl From<AttributeCodec> for CodecOptions {
    fn from(value: AttributeCodec) -> Self {
        Self {
            serialize: Some(value.serialize),
            unserialize: Some(value.unserialize),
        }
    }
}

impl Debug for CodecOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecOptions")
            .field("serialize", &self.has_serialize())
            .field("unserialize", &self.has_unserialize())
            .finish()
    }
}

fn default_serialize() -> SerializeFn {
    Arc::new(|value: &Value| -> CodecResult<Value> {
        Ok(Value::String(serde_json::to_string(value)?))
    })
}

fn default_unserialize() -> UnserializeFn {
    Arc::new(|raw: &Value| -> CodecResult<Value> {
        match raw {
            Value::String(text) => Ok(serde_json::from_str(text)?),
            other => Err(CodecError::UnexpectedRaw {
                expected: "string",
                found: value_kind(other),
            }),
        }
    })
}
