use std::fmt;

use bytes::Bytes;

/// A MessagePack integer.
///
/// Non-negative values are always stored in the unsigned form, whatever
/// family they were encoded with, so two integers compare equal exactly when
/// they denote the same number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Integer {
    repr: IntRepr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IntRepr {
    PosInt(u64),
    /// Always negative.
    NegInt(i64),
}

impl Integer {
    pub fn from_i64(value: i64) -> Self {
        let repr = if value < 0 {
            IntRepr::NegInt(value)
        } else {
            IntRepr::PosInt(value as u64)
        };
        Self { repr }
    }

    pub fn from_u64(value: u64) -> Self {
        Self {
            repr: IntRepr::PosInt(value),
        }
    }

    /// The value as `i64`, if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self.repr {
            IntRepr::PosInt(v) => i64::try_from(v).ok(),
            IntRepr::NegInt(v) => Some(v),
        }
    }

    /// The value as `u64`, if it is non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self.repr {
            IntRepr::PosInt(v) => Some(v),
            IntRepr::NegInt(_) => None,
        }
    }

    /// The value widened to `i128`; every MessagePack integer fits.
    pub fn as_i128(&self) -> i128 {
        match self.repr {
            IntRepr::PosInt(v) => i128::from(v),
            IntRepr::NegInt(v) => i128::from(v),
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self.repr, IntRepr::NegInt(_))
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            IntRepr::PosInt(v) => write!(f, "{v}"),
            IntRepr::NegInt(v) => write!(f, "{v}"),
        }
    }
}

/// The wire tag of a [`WireValue`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Nil,
    Boolean,
    Integer,
    Float,
    String,
    Binary,
    Array,
    Map,
    Ext,
}

impl WireKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WireKind::Nil => "nil",
            WireKind::Boolean => "bool",
            WireKind::Integer => "int",
            WireKind::Float => "float",
            WireKind::String => "str",
            WireKind::Binary => "bin",
            WireKind::Array => "array",
            WireKind::Map => "map",
            WireKind::Ext => "ext",
        }
    }
}

impl fmt::Display for WireKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded MessagePack value.
///
/// Map entries keep their wire order. `str` payloads that are not valid
/// UTF-8 are surfaced as [`WireValue::Binary`] (the legacy raw family did not
/// distinguish text from bytes).
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Nil,
    Boolean(bool),
    Integer(Integer),
    F32(f32),
    F64(f64),
    String(String),
    Binary(Bytes),
    Array(Vec<WireValue>),
    Map(Vec<(WireValue, WireValue)>),
    Ext(i8, Bytes),
}

impl WireValue {
    pub fn kind(&self) -> WireKind {
        match self {
            WireValue::Nil => WireKind::Nil,
            WireValue::Boolean(_) => WireKind::Boolean,
            WireValue::Integer(_) => WireKind::Integer,
            WireValue::F32(_) | WireValue::F64(_) => WireKind::Float,
            WireValue::String(_) => WireKind::String,
            WireValue::Binary(_) => WireKind::Binary,
            WireValue::Array(_) => WireKind::Array,
            WireValue::Map(_) => WireKind::Map,
            WireValue::Ext(..) => WireKind::Ext,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, WireValue::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::Integer(i) => i.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            WireValue::Integer(i) => i.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::F32(f) => Some(f64::from(*f)),
            WireValue::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Text content; binary payloads holding valid UTF-8 are accepted too.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            WireValue::Binary(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(WireValue, WireValue)]> {
        match self {
            WireValue::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        WireValue::Boolean(value)
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        WireValue::Integer(Integer::from_i64(value))
    }
}

impl From<i32> for WireValue {
    fn from(value: i32) -> Self {
        WireValue::Integer(Integer::from_i64(i64::from(value)))
    }
}

impl From<u64> for WireValue {
    fn from(value: u64) -> Self {
        WireValue::Integer(Integer::from_u64(value))
    }
}

impl From<u32> for WireValue {
    fn from(value: u32) -> Self {
        WireValue::Integer(Integer::from_u64(u64::from(value)))
    }
}

impl From<f32> for WireValue {
    fn from(value: f32) -> Self {
        WireValue::F32(value)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        WireValue::F64(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::String(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::String(value)
    }
}

impl From<Bytes> for WireValue {
    fn from(value: Bytes) -> Self {
        WireValue::Binary(value)
    }
}

impl From<Vec<WireValue>> for WireValue {
    fn from(value: Vec<WireValue>) -> Self {
        WireValue::Array(value)
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Nil => f.write_str("nil"),
            WireValue::Boolean(b) => write!(f, "{b}"),
            WireValue::Integer(i) => write!(f, "{i}"),
            WireValue::F32(v) => write!(f, "{v}"),
            WireValue::F64(v) => write!(f, "{v}"),
            WireValue::String(s) => write!(f, "{s:?}"),
            WireValue::Binary(b) => write!(f, "<bin {} bytes>", b.len()),
            WireValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            WireValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            WireValue::Ext(ty, data) => write!(f, "<ext {ty} {} bytes>", data.len()),
        }
    }
}
