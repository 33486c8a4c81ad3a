//! Named records over positional wire tuples.
//!
//! A [`RecordType`] is built once per record kind and shared by every
//! [`Record`] of that kind. Field order is the wire contract: renaming a field
//! is safe, reordering one is not.

use std::fmt;
use std::sync::Arc;

use mpcall_wire::WireValue;

use crate::descriptor::{decode_items, encode_items, TypeDescriptor};
use crate::error::{DecodeError, EncodeError};
use crate::value::Value;

/// Class-level description of a record: name, field names and the tuple
/// descriptor over the field types.
#[derive(Debug, PartialEq)]
pub struct RecordType {
    name: String,
    fields: Vec<String>,
    types: Vec<TypeDescriptor>,
}

impl RecordType {
    /// Declare a record from `(field name, descriptor)` pairs in wire order.
    pub fn new<N, I, F>(name: N, fields: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (F, TypeDescriptor)>,
        F: Into<String>,
    {
        let (fields, types) = fields.into_iter().map(|(f, t)| (f.into(), t)).unzip();
        Self {
            name: name.into(),
            fields,
            types,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Tuple position of a field.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// The positional tuple descriptor the record travels as.
    pub fn tuple_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::Tuple(self.types.clone())
    }

    /// Build a record, checking every value against its field descriptor.
    pub fn record(self: &Arc<Self>, values: Vec<Value>) -> Result<Record, EncodeError> {
        encode_items(&self.types, &values).map_err(|e| e.relabel_top(&self.fields))?;
        Ok(Record {
            ty: Arc::clone(self),
            values,
        })
    }

    /// Encode a record of this type, or a plain sequence in field order.
    pub fn to_wire(&self, value: &Value) -> Result<WireValue, EncodeError> {
        let values = match value {
            Value::Record(record) => {
                if !record.is_a(self) {
                    return Err(EncodeError::RecordMismatch {
                        expected: self.name.clone(),
                        found: record.name().to_string(),
                    });
                }
                &record.values
            }
            Value::Seq(items) => items,
            other => {
                return Err(EncodeError::TypeMismatch {
                    expected: self.name.clone(),
                    found: other.kind_name(),
                })
            }
        };
        encode_items(&self.types, values)
            .map(WireValue::Array)
            .map_err(|e| e.relabel_top(&self.fields))
    }

    /// Decode the positional wire tuple and re-attach field names.
    pub fn from_wire(self: &Arc<Self>, wire: WireValue) -> Result<Record, DecodeError> {
        let items = match wire {
            WireValue::Array(items) => items,
            other => {
                return Err(DecodeError::KindMismatch {
                    expected: self.name.clone(),
                    found: other.kind(),
                })
            }
        };
        let values = decode_items(&self.types, items).map_err(|e| e.relabel_top(&self.fields))?;
        Ok(Record {
            ty: Arc::clone(self),
            values,
        })
    }

    /// Render the declaration, e.g. `entry{key: string, value: int32}`.
    pub fn declaration(&self) -> String {
        let fields = self
            .fields
            .iter()
            .zip(&self.types)
            .map(|(f, t)| format!("{f}: {t}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}{{{fields}}}", self.name)
    }
}

/// One record value.
#[derive(Clone)]
pub struct Record {
    ty: Arc<RecordType>,
    values: Vec<Value>,
}

impl Record {
    /// Assemble without validation; used by `record!` conversions that are
    /// correct by construction.
    #[doc(hidden)]
    pub fn from_parts(ty: Arc<RecordType>, values: Vec<Value>) -> Self {
        Self { ty, values }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn name(&self) -> &str {
        self.ty.name()
    }

    /// Field values in declared order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.ty.position(field).and_then(|i| self.values.get(i))
    }

    /// `(name, value)` pairs in declared order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ty.fields().iter().map(String::as_str).zip(&self.values)
    }

    fn is_a(&self, ty: &RecordType) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.ty), ty) || *self.ty == *ty
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        other.is_a(&self.ty) && self.values == other.values
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name())?;
        for (i, (name, value)) in self.fields().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.name());
        for (name, value) in self.fields() {
            s.field(name, value);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PathSegment;

    fn entry_type() -> Arc<RecordType> {
        Arc::new(RecordType::new(
            "entry",
            [("key", TypeDescriptor::string()), ("value", TypeDescriptor::int32())],
        ))
    }

    #[test]
    fn record_roundtrip_preserves_identity() {
        let ty = entry_type();
        let entry = ty.record(vec![Value::from("k"), Value::Int(42)]).unwrap();
        let wire = ty.to_wire(&Value::Record(entry.clone())).unwrap();
        assert_eq!(
            wire,
            WireValue::Array(vec![WireValue::from("k"), WireValue::from(42i64)])
        );
        assert_eq!(ty.from_wire(wire).unwrap(), entry);
    }

    #[test]
    fn display_renders_fields_in_order() {
        let ty = entry_type();
        let entry = ty.record(vec![Value::from("k"), Value::Int(42)]).unwrap();
        assert_eq!(entry.to_string(), "entry{key: k, value: 42}");
        assert_eq!(format!("{entry:?}"), r#"entry { key: String("k"), value: Int(42) }"#);
    }

    #[test]
    fn field_access() {
        let ty = entry_type();
        let entry = ty.record(vec![Value::from("k"), Value::Int(42)]).unwrap();
        assert_eq!(entry.get("value"), Some(&Value::Int(42)));
        assert_eq!(entry.get("missing"), None);
        assert_eq!(ty.position("key"), Some(0));
        assert_eq!(ty.declaration(), "entry{key: string, value: int32}");
    }

    #[test]
    fn sequence_is_accepted_as_positional_record() {
        let ty = entry_type();
        let wire = ty.to_wire(&Value::Seq(vec![Value::from("a"), Value::Int(1)])).unwrap();
        assert_eq!(wire.as_array().map(<[_]>::len), Some(2));
    }

    #[test]
    fn errors_name_the_field() {
        let ty = entry_type();
        let err = ty.record(vec![Value::from("k"), Value::Int(i64::MAX)]).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Nested { segment: PathSegment::Field(ref f), .. } if f == "value"
        ));

        let err = ty
            .from_wire(WireValue::Array(vec![WireValue::from(1i64), WireValue::from(1i64)]))
            .unwrap_err();
        assert_eq!(err.path(), ".key");
    }

    #[test]
    fn wire_arity_must_match() {
        let ty = entry_type();
        let err = ty.from_wire(WireValue::Array(vec![WireValue::from("k")])).unwrap_err();
        assert_eq!(err, DecodeError::ArityMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn other_record_types_are_rejected() {
        let ty = entry_type();
        let other = Arc::new(RecordType::new("pair", [("a", TypeDescriptor::string()), ("b", TypeDescriptor::int32())]));
        let pair = other.record(vec![Value::from("k"), Value::Int(1)]).unwrap();
        assert!(matches!(
            ty.to_wire(&Value::Record(pair)),
            Err(EncodeError::RecordMismatch { .. })
        ));
    }

    #[test]
    fn structurally_equal_types_are_interchangeable() {
        let a = entry_type();
        let b = entry_type();
        let entry = a.record(vec![Value::from("k"), Value::Int(1)]).unwrap();
        assert!(b.to_wire(&Value::Record(entry.clone())).is_ok());
        assert_eq!(b.record(vec![Value::from("k"), Value::Int(1)]).unwrap(), entry);
    }
}
