use std::fmt;

use bytes::Bytes;
use mpcall_wire::{Integer, WireValue};

use crate::record::Record;

/// A native value: what callers hand to a descriptor and get back from it.
///
/// Integers keep their sign family (`Int` for signed descriptors, `UInt` for
/// unsigned ones) but compare by numeric value, so `Int(5) == UInt(5)`.
///
/// Equality follows what a value looks like once decoded: an integer equals
/// a float of the same exact value, and a record equals a `Seq` holding the
/// same values in field order.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Binary(Bytes),
    Seq(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(Record),
}

impl Value {
    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "raw",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Integer value widened to `i128`.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(i128::from(*v)),
            Value::UInt(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|v| u64::try_from(v).ok())
    }

    /// Float value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Untyped conversion to the wire. Records become positional arrays.
    pub fn to_wire(&self) -> WireValue {
        match self {
            Value::Nil => WireValue::Nil,
            Value::Bool(b) => WireValue::Boolean(*b),
            Value::Int(v) => WireValue::Integer(Integer::from_i64(*v)),
            Value::UInt(v) => WireValue::Integer(Integer::from_u64(*v)),
            Value::Float(v) => WireValue::F64(*v),
            Value::String(s) => WireValue::String(s.clone()),
            Value::Binary(b) => WireValue::Binary(b.clone()),
            Value::Seq(items) => WireValue::Array(items.iter().map(Value::to_wire).collect()),
            Value::Map(entries) => WireValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_wire(), v.to_wire()))
                    .collect(),
            ),
            Value::Record(r) => WireValue::Array(r.values().iter().map(Value::to_wire).collect()),
        }
    }

    /// Untyped conversion from the wire. Extension values surface as binary.
    pub fn from_wire(wire: WireValue) -> Value {
        match wire {
            WireValue::Nil => Value::Nil,
            WireValue::Boolean(b) => Value::Bool(b),
            WireValue::Integer(i) => match i.as_u64() {
                Some(v) => Value::UInt(v),
                None => Value::Int(i.as_i64().unwrap_or(i64::MIN)),
            },
            WireValue::F32(v) => Value::Float(f64::from(v)),
            WireValue::F64(v) => Value::Float(v),
            WireValue::String(s) => Value::String(s),
            WireValue::Binary(b) | WireValue::Ext(_, b) => Value::Binary(b),
            WireValue::Array(items) => Value::Seq(items.into_iter().map(Value::from_wire).collect()),
            WireValue::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Value::from_wire(k), Value::from_wire(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(_) | Value::UInt(_), Value::Int(_) | Value::UInt(_)) => {
                self.as_i128() == other.as_i128()
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Float(f), n @ (Value::Int(_) | Value::UInt(_)))
            | (n @ (Value::Int(_) | Value::UInt(_)), Value::Float(f)) => {
                // Exact only: 2^63 as f64 must not equal i64::MAX.
                f.fract() == 0.0 && n.as_i128() == Some(*f as i128)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Record(r), Value::Seq(items)) | (Value::Seq(items), Value::Record(r)) => {
                r.values() == items.as_slice()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("None"),
            Value::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Binary(b) => write!(f, "<raw {} bytes>", b.len()),
            Value::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Record(r) => write!(f, "{r}"),
        }
    }
}

macro_rules! value_from_signed {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Int(i64::from(value))
            }
        }
    )*};
}

macro_rules! value_from_unsigned {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::UInt(u64::from(value))
            }
        }
    )*};
}

value_from_signed!(i8, i16, i32, i64);
value_from_unsigned!(u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Binary(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Seq(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}
