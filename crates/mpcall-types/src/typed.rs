use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use bytes::Bytes;
use mpcall_wire::WireValue;

use crate::descriptor::{IntWidth, TypeDescriptor};
use crate::error::{DecodeError, EncodeError, PathSegment};
use crate::value::Value;

/// A Rust type with a fixed wire descriptor.
///
/// `from_value` accepts exactly what `descriptor().decode` produces, so
/// `T::decode(t.encode()?)? == t` for every `t`.
pub trait Typed: Sized {
    fn descriptor() -> TypeDescriptor;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self, DecodeError>;

    /// Encode through [`Typed::descriptor`].
    fn encode(self) -> Result<WireValue, EncodeError> {
        Self::descriptor().encode(&self.into_value())
    }

    /// Decode through [`Typed::descriptor`].
    fn decode(wire: WireValue) -> Result<Self, DecodeError> {
        Self::from_value(Self::descriptor().decode(wire)?)
    }
}

fn unexpected<T: Typed>(value: &Value) -> DecodeError {
    DecodeError::UnexpectedValue {
        expected: T::descriptor().to_string(),
        found: value.kind_name(),
    }
}

macro_rules! typed_int {
    ($($ty:ty => $ctor:ident($width:ident)),* $(,)?) => {$(
        impl Typed for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::$ctor(IntWidth::$width)
            }

            fn into_value(self) -> Value {
                Value::from(self)
            }

            fn from_value(value: Value) -> Result<Self, DecodeError> {
                let n = value.as_i128().ok_or_else(|| unexpected::<Self>(&value))?;
                <$ty>::try_from(n).map_err(|_| DecodeError::OutOfRange {
                    value: n,
                    descriptor: Self::descriptor().to_string(),
                })
            }
        }
    )*};
}

typed_int! {
    i8 => int(W8),
    i16 => int(W16),
    i32 => int(W32),
    i64 => int(W64),
    u8 => uint(W8),
    u16 => uint(W16),
    u32 => uint(W32),
    u64 => uint(W64),
}

impl Typed for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::bool()
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        value.as_bool().ok_or_else(|| unexpected::<Self>(&value))
    }
}

impl Typed for f64 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::float()
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        value.as_f64().ok_or_else(|| unexpected::<Self>(&value))
    }
}

impl Typed for f32 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::float()
    }

    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| unexpected::<Self>(&value))
    }
}

impl Typed for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::string()
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl Typed for Bytes {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::raw()
    }

    fn into_value(self) -> Value {
        Value::Binary(self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Binary(b) => Ok(b),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl Typed for () {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::unit()
    }

    fn into_value(self) -> Value {
        Value::Nil
    }

    fn from_value(_value: Value) -> Result<Self, DecodeError> {
        Ok(())
    }
}

/// Any value, unchecked.
impl Typed for Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::object()
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        Ok(value)
    }
}

impl<T: Typed> Typed for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::nullable(T::descriptor())
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Nil, T::into_value)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::list(T::descriptor())
    }

    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(T::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Seq(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| T::from_value(item).map_err(|e| e.at(PathSegment::Index(i))))
                .collect(),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

fn map_entries<K: Typed, V: Typed>(value: Value) -> Result<impl Iterator<Item = Result<(K, V), DecodeError>>, Value> {
    match value {
        Value::Map(entries) => Ok(entries.into_iter().enumerate().map(|(i, (k, v))| {
            Ok((
                K::from_value(k).map_err(|e| e.at(PathSegment::Key(i)))?,
                V::from_value(v).map_err(|e| e.at(PathSegment::Value(i)))?,
            ))
        })),
        other => Err(other),
    }
}

impl<K: Typed + Ord, V: Typed> Typed for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(K::descriptor(), V::descriptor())
    }

    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        map_entries(value)
            .map_err(|other| unexpected::<Self>(&other))?
            .collect()
    }
}

impl<K: Typed + Eq + Hash, V: Typed> Typed for HashMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(K::descriptor(), V::descriptor())
    }

    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        map_entries(value)
            .map_err(|other| unexpected::<Self>(&other))?
            .collect()
    }
}

macro_rules! typed_tuple {
    ($len:literal; $($name:ident $idx:tt),+) => {
        impl<$($name: Typed),+> Typed for ($($name,)+) {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::tuple([$($name::descriptor()),+])
            }

            fn into_value(self) -> Value {
                Value::Seq(vec![$(self.$idx.into_value()),+])
            }

            fn from_value(value: Value) -> Result<Self, DecodeError> {
                let items = match value {
                    Value::Seq(items) => items,
                    other => return Err(unexpected::<Self>(&other)),
                };
                if items.len() != $len {
                    return Err(DecodeError::ArityMismatch {
                        expected: $len,
                        found: items.len(),
                    });
                }
                let mut items = items.into_iter();
                Ok(($(
                    $name::from_value(items.next().unwrap_or_default())
                        .map_err(|e| e.at(PathSegment::Index($idx)))?,
                )+))
            }
        }
    };
}

typed_tuple!(1; A 0);
typed_tuple!(2; A 0, B 1);
typed_tuple!(3; A 0, B 1, C 2);
typed_tuple!(4; A 0, B 1, C 2, D 3);

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Typed + Clone + PartialEq + std::fmt::Debug>(value: T) {
        let wire = value.clone().encode().unwrap();
        assert_eq!(T::decode(wire).unwrap(), value);
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(true);
        roundtrip(-7i8);
        roundtrip(u16::MAX);
        roundtrip(i64::MIN);
        roundtrip(u64::MAX);
        roundtrip(2.25f64);
        roundtrip(String::from("text"));
        roundtrip(Bytes::from_static(b"\x00\x01"));
    }

    #[test]
    fn container_roundtrips() {
        roundtrip(vec![Some(1u32), None, Some(3)]);
        roundtrip(BTreeMap::from([("a".to_string(), vec![1i32, 2]), ("b".to_string(), vec![])]));
        roundtrip(HashMap::from([(1u8, true)]));
        roundtrip(("k".to_string(), 42i32));
        roundtrip((1u8, 2u16, 3u32, "four".to_string()));
    }

    #[test]
    fn descriptors_follow_the_types() {
        assert_eq!(<Vec<Option<i32>>>::descriptor().to_string(), "list<nullable<int32>>");
        assert_eq!(<(String, u8)>::descriptor().to_string(), "tuple<string, uint8>");
        assert_eq!(<BTreeMap<String, f64>>::descriptor().to_string(), "map<string, float>");
        assert!(<()>::descriptor().is_unit());
    }

    #[test]
    fn unit_ignores_payload() {
        assert_eq!(<()>::decode(WireValue::from(true)), Ok(()));
    }

    #[test]
    fn narrowing_is_checked() {
        let err = u8::from_value(Value::Int(-1)).unwrap_err();
        assert!(matches!(err, DecodeError::OutOfRange { value: -1, .. }));
        let err = i32::from_value(Value::from("x")).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedValue { found: "string", .. }));
    }

    #[test]
    fn tuple_arity_is_checked() {
        let err = <(String, i32)>::from_value(Value::Seq(vec![Value::from("k")])).unwrap_err();
        assert_eq!(err, DecodeError::ArityMismatch { expected: 2, found: 1 });
    }
}
