use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use mpcall_wire::{Integer, WireValue};

use crate::error::{DecodeError, EncodeError, PathSegment};
use crate::record::RecordType;
use crate::value::Value;

/// Declared byte width of an integer descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Width for a byte count of 1, 2, 4 or 8.
    pub fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(IntWidth::W8),
            2 => Some(IntWidth::W16),
            4 => Some(IntWidth::W32),
            8 => Some(IntWidth::W64),
            _ => None,
        }
    }

    pub fn bytes(self) -> u8 {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 2,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        u32::from(self.bytes()) * 8
    }

    /// Inclusive value range for the given signedness.
    pub fn range(self, signed: bool) -> (i128, i128) {
        let bits = self.bits();
        if signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }
}

/// Leaf wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int { signed: bool, width: IntWidth },
    Float,
    /// UTF-8 text.
    String,
    /// Opaque bytes.
    Raw,
}

/// The wire shape of one value.
///
/// Descriptors are immutable and compose by containment. Each descriptor
/// converts native [`Value`]s to [`WireValue`]s and back; decoding a value of
/// the wrong shape fails rather than truncating or padding.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    /// Fixed-length ordered sequence, one child descriptor per position.
    Tuple(Vec<TypeDescriptor>),
    /// Named record over a positional tuple.
    UserDefined(Arc<RecordType>),
    /// Nil or a value of the inner type.
    Nullable(Box<TypeDescriptor>),
    /// Variable-length homogeneous sequence.
    List(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    /// Any value, passed through unchecked.
    Object,
    /// No value. Encodes only nil; decoding discards what the server sent.
    Unit,
}

impl TypeDescriptor {
    pub fn bool() -> Self {
        TypeDescriptor::Primitive(Primitive::Bool)
    }

    pub fn int(width: IntWidth) -> Self {
        TypeDescriptor::Primitive(Primitive::Int {
            signed: true,
            width,
        })
    }

    pub fn uint(width: IntWidth) -> Self {
        TypeDescriptor::Primitive(Primitive::Int {
            signed: false,
            width,
        })
    }

    /// Integer descriptor from signedness and byte count (1, 2, 4 or 8).
    pub fn int_bytes(signed: bool, bytes: u8) -> Option<Self> {
        IntWidth::from_bytes(bytes).map(|width| TypeDescriptor::Primitive(Primitive::Int { signed, width }))
    }

    pub fn int8() -> Self {
        Self::int(IntWidth::W8)
    }

    pub fn int16() -> Self {
        Self::int(IntWidth::W16)
    }

    pub fn int32() -> Self {
        Self::int(IntWidth::W32)
    }

    pub fn int64() -> Self {
        Self::int(IntWidth::W64)
    }

    pub fn uint8() -> Self {
        Self::uint(IntWidth::W8)
    }

    pub fn uint16() -> Self {
        Self::uint(IntWidth::W16)
    }

    pub fn uint32() -> Self {
        Self::uint(IntWidth::W32)
    }

    pub fn uint64() -> Self {
        Self::uint(IntWidth::W64)
    }

    pub fn float() -> Self {
        TypeDescriptor::Primitive(Primitive::Float)
    }

    pub fn string() -> Self {
        TypeDescriptor::Primitive(Primitive::String)
    }

    pub fn raw() -> Self {
        TypeDescriptor::Primitive(Primitive::Raw)
    }

    pub fn tuple(children: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        TypeDescriptor::Tuple(children.into_iter().collect())
    }

    pub fn user_defined(record: impl Into<Arc<RecordType>>) -> Self {
        TypeDescriptor::UserDefined(record.into())
    }

    pub fn nullable(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Nullable(Box::new(inner))
    }

    pub fn list(element: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(element))
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(key), Box::new(value))
    }

    pub fn object() -> Self {
        TypeDescriptor::Object
    }

    pub fn unit() -> Self {
        TypeDescriptor::Unit
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, TypeDescriptor::Unit)
    }

    /// Convert a native value to its wire form.
    pub fn encode(&self, value: &Value) -> Result<WireValue, EncodeError> {
        match self {
            TypeDescriptor::Primitive(p) => self.encode_primitive(*p, value),
            TypeDescriptor::Tuple(children) => match value {
                Value::Seq(items) => encode_items(children, items).map(WireValue::Array),
                other => Err(self.mismatch(other)),
            },
            TypeDescriptor::UserDefined(record) => record.to_wire(value),
            TypeDescriptor::Nullable(inner) => match value {
                Value::Nil => Ok(WireValue::Nil),
                other => inner.encode(other),
            },
            TypeDescriptor::List(element) => match value {
                Value::Seq(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| element.encode(item).map_err(|e| e.at(PathSegment::Index(i))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(WireValue::Array),
                other => Err(self.mismatch(other)),
            },
            TypeDescriptor::Map(key, val) => match value {
                Value::Map(entries) => entries
                    .iter()
                    .enumerate()
                    .map(|(i, (k, v))| {
                        Ok((
                            key.encode(k).map_err(|e| e.at(PathSegment::Key(i)))?,
                            val.encode(v).map_err(|e| e.at(PathSegment::Value(i)))?,
                        ))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(WireValue::Map),
                other => Err(self.mismatch(other)),
            },
            TypeDescriptor::Object => Ok(value.to_wire()),
            TypeDescriptor::Unit => match value {
                Value::Nil => Ok(WireValue::Nil),
                other => Err(self.mismatch(other)),
            },
        }
    }

    /// Convert a wire value back to its native form.
    pub fn decode(&self, wire: WireValue) -> Result<Value, DecodeError> {
        match self {
            TypeDescriptor::Primitive(p) => self.decode_primitive(*p, wire),
            TypeDescriptor::Tuple(children) => match wire {
                WireValue::Array(items) => decode_items(children, items).map(Value::Seq),
                other => Err(self.kind_mismatch(&other)),
            },
            TypeDescriptor::UserDefined(record) => record.from_wire(wire).map(Value::Record),
            TypeDescriptor::Nullable(inner) => match wire {
                WireValue::Nil => Ok(Value::Nil),
                other => inner.decode(other),
            },
            TypeDescriptor::List(element) => match wire {
                WireValue::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| element.decode(item).map_err(|e| e.at(PathSegment::Index(i))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Seq),
                other => Err(self.kind_mismatch(&other)),
            },
            TypeDescriptor::Map(key, val) => match wire {
                WireValue::Map(entries) => entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, (k, v))| {
                        Ok((
                            key.decode(k).map_err(|e| e.at(PathSegment::Key(i)))?,
                            val.decode(v).map_err(|e| e.at(PathSegment::Value(i)))?,
                        ))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Map),
                other => Err(self.kind_mismatch(&other)),
            },
            TypeDescriptor::Object => Ok(Value::from_wire(wire)),
            TypeDescriptor::Unit => Ok(Value::Nil),
        }
    }

    fn encode_primitive(&self, primitive: Primitive, value: &Value) -> Result<WireValue, EncodeError> {
        match (primitive, value) {
            (Primitive::Bool, Value::Bool(b)) => Ok(WireValue::Boolean(*b)),
            (Primitive::Int { signed, width }, Value::Int(_) | Value::UInt(_)) => {
                let n = value.as_i128().unwrap_or_default();
                let (min, max) = width.range(signed);
                if n < min || n > max {
                    return Err(EncodeError::OutOfRange {
                        value: n,
                        descriptor: self.to_string(),
                        min,
                        max,
                    });
                }
                Ok(WireValue::Integer(int_from_i128(n)))
            }
            (Primitive::Float, Value::Float(_) | Value::Int(_) | Value::UInt(_)) => {
                Ok(WireValue::F64(value.as_f64().unwrap_or_default()))
            }
            (Primitive::String, Value::String(s)) => Ok(WireValue::String(s.clone())),
            (Primitive::Raw, Value::Binary(b)) => Ok(WireValue::Binary(b.clone())),
            (_, other) => Err(self.mismatch(other)),
        }
    }

    fn decode_primitive(&self, primitive: Primitive, wire: WireValue) -> Result<Value, DecodeError> {
        match (primitive, wire) {
            (Primitive::Bool, WireValue::Boolean(b)) => Ok(Value::Bool(b)),
            (Primitive::Int { signed, width }, WireValue::Integer(i)) => {
                let n = i.as_i128();
                let (min, max) = width.range(signed);
                if n < min || n > max {
                    return Err(DecodeError::OutOfRange {
                        value: n,
                        descriptor: self.to_string(),
                    });
                }
                // In range for a 64-bit family, so the narrowing cannot fail.
                Ok(if signed {
                    Value::Int(n as i64)
                } else {
                    Value::UInt(n as u64)
                })
            }
            (Primitive::Float, WireValue::F32(v)) => Ok(Value::Float(f64::from(v))),
            (Primitive::Float, WireValue::F64(v)) => Ok(Value::Float(v)),
            (Primitive::String, WireValue::String(s)) => Ok(Value::String(s)),
            (Primitive::String, WireValue::Binary(b)) => String::from_utf8(b.to_vec())
                .map(Value::String)
                .map_err(|_| DecodeError::InvalidUtf8),
            (Primitive::Raw, WireValue::Binary(b)) => Ok(Value::Binary(b)),
            (Primitive::Raw, WireValue::String(s)) => Ok(Value::Binary(Bytes::from(s))),
            (_, other) => Err(self.kind_mismatch(&other)),
        }
    }

    fn mismatch(&self, found: &Value) -> EncodeError {
        EncodeError::TypeMismatch {
            expected: self.to_string(),
            found: found.kind_name(),
        }
    }

    fn kind_mismatch(&self, found: &WireValue) -> DecodeError {
        DecodeError::KindMismatch {
            expected: self.to_string(),
            found: found.kind(),
        }
    }
}

fn int_from_i128(n: i128) -> Integer {
    if n < 0 {
        Integer::from_i64(n as i64)
    } else {
        Integer::from_u64(n as u64)
    }
}

/// Encode a positional sequence against per-position descriptors.
pub(crate) fn encode_items(children: &[TypeDescriptor], items: &[Value]) -> Result<Vec<WireValue>, EncodeError> {
    if children.len() != items.len() {
        return Err(EncodeError::ArityMismatch {
            expected: children.len(),
            found: items.len(),
        });
    }
    children
        .iter()
        .zip(items)
        .enumerate()
        .map(|(i, (child, item))| child.encode(item).map_err(|e| e.at(PathSegment::Index(i))))
        .collect()
}

/// Decode a wire array against per-position descriptors.
pub(crate) fn decode_items(children: &[TypeDescriptor], items: Vec<WireValue>) -> Result<Vec<Value>, DecodeError> {
    if children.len() != items.len() {
        return Err(DecodeError::ArityMismatch {
            expected: children.len(),
            found: items.len(),
        });
    }
    children
        .iter()
        .zip(items)
        .enumerate()
        .map(|(i, (child, item))| child.decode(item).map_err(|e| e.at(PathSegment::Index(i))))
        .collect()
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool => f.write_str("bool"),
            Primitive::Int { signed: true, width } => write!(f, "int{}", width.bits()),
            Primitive::Int { signed: false, width } => write!(f, "uint{}", width.bits()),
            Primitive::Float => f.write_str("float"),
            Primitive::String => f.write_str("string"),
            Primitive::Raw => f.write_str("raw"),
        }
    }
}

/// Renders the descriptor text format accepted by [`crate::parse_descriptor`].
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(p) => write!(f, "{p}"),
            TypeDescriptor::Tuple(children) => {
                f.write_str("tuple<")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(">")
            }
            TypeDescriptor::UserDefined(record) => f.write_str(record.name()),
            TypeDescriptor::Nullable(inner) => write!(f, "nullable<{inner}>"),
            TypeDescriptor::List(element) => write!(f, "list<{element}>"),
            TypeDescriptor::Map(key, value) => write!(f, "map<{key}, {value}>"),
            TypeDescriptor::Object => f.write_str("object"),
            TypeDescriptor::Unit => f.write_str("unit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(desc: &TypeDescriptor, value: Value) {
        let wire = desc.encode(&value).unwrap();
        assert_eq!(desc.decode(wire).unwrap(), value, "descriptor {desc}");
    }

    #[test]
    fn primitives_roundtrip() {
        roundtrip(&TypeDescriptor::bool(), Value::Bool(true));
        roundtrip(&TypeDescriptor::int32(), Value::Int(-42));
        roundtrip(&TypeDescriptor::uint64(), Value::UInt(u64::MAX));
        roundtrip(&TypeDescriptor::int64(), Value::Int(i64::MIN));
        roundtrip(&TypeDescriptor::float(), Value::Float(0.5));
        roundtrip(&TypeDescriptor::string(), Value::from("héllo"));
        roundtrip(&TypeDescriptor::raw(), Value::Binary(Bytes::from_static(&[0, 1, 255])));
    }

    #[test]
    fn nested_composites_roundtrip() {
        let desc = TypeDescriptor::tuple([
            TypeDescriptor::string(),
            TypeDescriptor::list(TypeDescriptor::nullable(TypeDescriptor::int16())),
            TypeDescriptor::map(TypeDescriptor::string(), TypeDescriptor::tuple([TypeDescriptor::bool()])),
        ]);
        roundtrip(
            &desc,
            Value::Seq(vec![
                Value::from("id"),
                Value::Seq(vec![Value::Int(1), Value::Nil, Value::Int(-3)]),
                Value::Map(vec![(Value::from("x"), Value::Seq(vec![Value::Bool(false)]))]),
            ]),
        );
    }

    #[test]
    fn unsigned_rejects_negative() {
        let err = TypeDescriptor::uint32().encode(&Value::Int(-1)).unwrap_err();
        assert_eq!(
            err,
            EncodeError::OutOfRange {
                value: -1,
                descriptor: "uint32".to_string(),
                min: 0,
                max: i128::from(u32::MAX),
            }
        );
    }

    #[test]
    fn width_is_enforced_both_ways() {
        assert!(TypeDescriptor::int8().encode(&Value::Int(127)).is_ok());
        assert!(TypeDescriptor::int8().encode(&Value::Int(128)).is_err());
        assert!(TypeDescriptor::int8().encode(&Value::Int(-129)).is_err());
        assert!(TypeDescriptor::uint16().encode(&Value::UInt(65_536)).is_err());

        let err = TypeDescriptor::int32()
            .decode(WireValue::from(u64::from(u32::MAX)))
            .unwrap_err();
        assert!(matches!(err, DecodeError::OutOfRange { .. }));
    }

    #[test]
    fn tuple_arity_mismatch_fails_on_decode() {
        let desc = TypeDescriptor::tuple([TypeDescriptor::string(), TypeDescriptor::int32()]);
        let short = WireValue::Array(vec![WireValue::from("k")]);
        assert_eq!(
            desc.decode(short).unwrap_err(),
            DecodeError::ArityMismatch { expected: 2, found: 1 }
        );
        let long = WireValue::Array(vec![WireValue::from("k"), WireValue::from(1i64), WireValue::Nil]);
        assert!(matches!(desc.decode(long), Err(DecodeError::ArityMismatch { .. })));
    }

    #[test]
    fn tuple_arity_mismatch_fails_on_encode() {
        let desc = TypeDescriptor::tuple([TypeDescriptor::string(), TypeDescriptor::int32()]);
        let err = desc.encode(&Value::Seq(vec![Value::from("k")])).unwrap_err();
        assert_eq!(err, EncodeError::ArityMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn wrong_wire_tag_is_reported_with_kind() {
        let err = TypeDescriptor::int32().decode(WireValue::from("7")).unwrap_err();
        assert_eq!(err.to_string(), "expected int32, found str");
    }

    #[test]
    fn nested_error_carries_path() {
        let desc = TypeDescriptor::list(TypeDescriptor::tuple([TypeDescriptor::string(), TypeDescriptor::uint8()]));
        let value = Value::Seq(vec![
            Value::Seq(vec![Value::from("a"), Value::UInt(1)]),
            Value::Seq(vec![Value::from("b"), Value::UInt(300)]),
        ]);
        let err = desc.encode(&value).unwrap_err();
        assert_eq!(err.path(), "[1][1]");
        assert!(matches!(err.root_cause(), EncodeError::OutOfRange { value: 300, .. }));
    }

    #[test]
    fn legacy_raw_family_is_accepted() {
        let decoded = TypeDescriptor::string()
            .decode(WireValue::Binary(Bytes::from_static(b"key")))
            .unwrap();
        assert_eq!(decoded, Value::from("key"));

        let invalid = TypeDescriptor::string().decode(WireValue::Binary(Bytes::from_static(&[0xff])));
        assert_eq!(invalid.unwrap_err(), DecodeError::InvalidUtf8);

        let raw = TypeDescriptor::raw().decode(WireValue::from("ab")).unwrap();
        assert_eq!(raw, Value::Binary(Bytes::from_static(b"ab")));
    }

    #[test]
    fn float_accepts_integers_on_encode_only() {
        assert_eq!(TypeDescriptor::float().encode(&Value::Int(2)).unwrap(), WireValue::F64(2.0));
        assert_eq!(TypeDescriptor::float().decode(WireValue::F32(1.5)).unwrap(), Value::Float(1.5));
        assert!(TypeDescriptor::float().decode(WireValue::from(2i64)).is_err());
    }

    #[test]
    fn integer_sent_as_float_roundtrips() {
        roundtrip(&TypeDescriptor::float(), Value::Int(2));
        roundtrip(&TypeDescriptor::float(), Value::UInt(1 << 40));
    }

    #[test]
    fn positional_record_roundtrips() {
        let entry = Arc::new(RecordType::new(
            "entry",
            [("key", TypeDescriptor::string()), ("value", TypeDescriptor::int32())],
        ));
        let desc = TypeDescriptor::tuple([TypeDescriptor::UserDefined(Arc::clone(&entry))]);
        let value = Value::Seq(vec![Value::Seq(vec![Value::from("k"), Value::Int(42)])]);

        let decoded = desc.decode(desc.encode(&value).unwrap()).unwrap();
        let Value::Seq(items) = &decoded else {
            panic!("tuple should decode to a sequence, got {decoded:?}");
        };
        assert!(matches!(&items[0], Value::Record(r) if r.name() == "entry"));
        assert_eq!(decoded, value);
    }

    #[test]
    fn record_through_object_roundtrips() {
        let entry = Arc::new(RecordType::new(
            "entry",
            [("key", TypeDescriptor::string()), ("value", TypeDescriptor::int32())],
        ));
        let record = entry.record(vec![Value::from("k"), Value::Int(42)]).unwrap();
        roundtrip(&TypeDescriptor::object(), Value::Record(record));
    }

    #[test]
    fn unit_discards_and_only_encodes_nil() {
        assert_eq!(TypeDescriptor::unit().decode(WireValue::from(true)).unwrap(), Value::Nil);
        assert_eq!(TypeDescriptor::unit().encode(&Value::Nil).unwrap(), WireValue::Nil);
        assert!(TypeDescriptor::unit().encode(&Value::Int(0)).is_err());
    }

    #[test]
    fn object_passes_through() {
        let value = Value::Map(vec![(Value::from("k"), Value::Seq(vec![Value::Nil]))]);
        roundtrip(&TypeDescriptor::object(), value);
    }

    #[test]
    fn descriptors_are_reusable() {
        let desc = TypeDescriptor::int16();
        for n in -5..5 {
            roundtrip(&desc, Value::Int(n));
        }
    }

    #[test]
    fn display_text_form() {
        let desc = TypeDescriptor::map(
            TypeDescriptor::string(),
            TypeDescriptor::list(TypeDescriptor::nullable(TypeDescriptor::tuple([
                TypeDescriptor::uint8(),
                TypeDescriptor::raw(),
            ]))),
        );
        assert_eq!(desc.to_string(), "map<string, list<nullable<tuple<uint8, raw>>>>");
        assert_eq!(TypeDescriptor::int_bytes(true, 4), Some(TypeDescriptor::int32()));
        assert_eq!(TypeDescriptor::int_bytes(false, 3), None);
    }
}
