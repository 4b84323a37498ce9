//! Conversion between scalar values and frame payload bytes.
//!
//! Values travel in the platform's native byte order. Both ends of a link
//! are expected to agree on it; nothing on the wire negotiates endianness.

use std::fmt;

use bytes::Bytes;

use crate::codec::MAX_DATA_COUNT;
use crate::error::{FrameError, Result};

/// The types a linked variable can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Raw block of 1..=8 bytes; its width is the frame's data count.
    Bytes,
}

impl ValueType {
    /// Every supported type.
    pub const ALL: [ValueType; 11] = [
        ValueType::I8,
        ValueType::I16,
        ValueType::I32,
        ValueType::I64,
        ValueType::U8,
        ValueType::U16,
        ValueType::U32,
        ValueType::U64,
        ValueType::F32,
        ValueType::F64,
        ValueType::Bytes,
    ];

    /// Fixed byte width, or `None` for raw byte blocks.
    pub fn width(self) -> Option<usize> {
        match self {
            ValueType::I8 | ValueType::U8 => Some(1),
            ValueType::I16 | ValueType::U16 => Some(2),
            ValueType::I32 | ValueType::U32 | ValueType::F32 => Some(4),
            ValueType::I64 | ValueType::U64 | ValueType::F64 => Some(8),
            ValueType::Bytes => None,
        }
    }

    /// Short lowercase name (`u16`, `f32`, `bytes`, ...).
    pub fn name(self) -> &'static str {
        match self {
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::U8 => "u8",
            ValueType::U16 => "u16",
            ValueType::U32 => "u32",
            ValueType::U64 => "u64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ValueType::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| format!("unsupported value type '{s}'"))
    }
}

/// A single scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(Bytes),
}

impl Value {
    /// The type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::I8(_) => ValueType::I8,
            Value::I16(_) => ValueType::I16,
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::U8(_) => ValueType::U8,
            Value::U16(_) => ValueType::U16,
            Value::U32(_) => ValueType::U32,
            Value::U64(_) => ValueType::U64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::Bytes(_) => ValueType::Bytes,
        }
    }

    /// Native-endian byte representation.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Value::I8(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::I16(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::I32(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::I64(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::U8(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::U16(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::U32(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::U64(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::F32(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::F64(v) => Bytes::copy_from_slice(&v.to_ne_bytes()),
            Value::Bytes(v) => v.clone(),
        }
    }

    /// Decode `data` as a value of `value_type`.
    ///
    /// Fixed-width types require exactly their width; byte blocks accept
    /// 1..=8 bytes.
    pub fn from_bytes(value_type: ValueType, data: &[u8]) -> Result<Self> {
        let Some(width) = value_type.width() else {
            if data.is_empty() || data.len() > MAX_DATA_COUNT {
                return Err(FrameError::InvalidDataCount(data.len()));
            }
            return Ok(Value::Bytes(Bytes::copy_from_slice(data)));
        };
        if data.len() != width {
            return Err(FrameError::ValueWidth {
                value_type,
                expected: width,
                actual: data.len(),
            });
        }

        Ok(match value_type {
            ValueType::I8 => Value::I8(i8::from_ne_bytes(fixed(data))),
            ValueType::I16 => Value::I16(i16::from_ne_bytes(fixed(data))),
            ValueType::I32 => Value::I32(i32::from_ne_bytes(fixed(data))),
            ValueType::I64 => Value::I64(i64::from_ne_bytes(fixed(data))),
            ValueType::U8 => Value::U8(u8::from_ne_bytes(fixed(data))),
            ValueType::U16 => Value::U16(u16::from_ne_bytes(fixed(data))),
            ValueType::U32 => Value::U32(u32::from_ne_bytes(fixed(data))),
            ValueType::U64 => Value::U64(u64::from_ne_bytes(fixed(data))),
            ValueType::F32 => Value::F32(f32::from_ne_bytes(fixed(data))),
            ValueType::F64 => Value::F64(f64::from_ne_bytes(fixed(data))),
            ValueType::Bytes => Value::Bytes(Bytes::copy_from_slice(data)),
        })
    }

    /// Parse a textual value of `value_type`. Byte blocks are given as hex.
    pub fn parse(value_type: ValueType, text: &str) -> std::result::Result<Self, String> {
        let text = text.trim();
        let bad = |err: &dyn fmt::Display| format!("invalid {value_type} value '{text}': {err}");
        Ok(match value_type {
            ValueType::I8 => Value::I8(text.parse().map_err(|e| bad(&e))?),
            ValueType::I16 => Value::I16(text.parse().map_err(|e| bad(&e))?),
            ValueType::I32 => Value::I32(text.parse().map_err(|e| bad(&e))?),
            ValueType::I64 => Value::I64(text.parse().map_err(|e| bad(&e))?),
            ValueType::U8 => Value::U8(text.parse().map_err(|e| bad(&e))?),
            ValueType::U16 => Value::U16(text.parse().map_err(|e| bad(&e))?),
            ValueType::U32 => Value::U32(text.parse().map_err(|e| bad(&e))?),
            ValueType::U64 => Value::U64(text.parse().map_err(|e| bad(&e))?),
            ValueType::F32 => Value::F32(text.parse().map_err(|e| bad(&e))?),
            ValueType::F64 => Value::F64(text.parse().map_err(|e| bad(&e))?),
            ValueType::Bytes => {
                let bytes = parse_hex(text).map_err(|e| bad(&e))?;
                if bytes.is_empty() || bytes.len() > MAX_DATA_COUNT {
                    return Err(bad(&"expected 1 to 8 bytes"));
                }
                Value::Bytes(Bytes::from(bytes))
            }
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Bytes(v) => f.write_str(&to_hex(v)),
        }
    }
}

/// Rust types that map onto a [`ValueType`].
pub trait Scalar: Sized + Send + 'static {
    /// The wire type of this Rust type.
    const VALUE_TYPE: ValueType;

    /// Wrap into a [`Value`].
    fn into_value(self) -> Value;

    /// Unwrap from a [`Value`] of the matching type.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const VALUE_TYPE: ValueType = ValueType::$variant;

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_scalar! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Bytes => Bytes,
}

/// Lowercase hex without separators.
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Parse hex, tolerating an `0x` prefix and spaces, `:` or `-` separators.
pub fn parse_hex(text: &str) -> std::result::Result<Vec<u8>, String> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-' | '_'))
        .collect();
    hex::decode(digits).map_err(|err| err.to_string())
}

fn fixed<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(data);
    out
}
