//! Conversions between JSON text on the command line and native values.

use std::sync::Arc;

use mpcall_types::{Primitive, RecordType, TypeDescriptor, Value};
use serde_json::{Map, Number, Value as Json};

/// Render a native value as JSON. Records become objects in field order of
/// their declaration, maps get stringified keys and raw bytes become arrays.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Nil => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(v) => Json::from(*v),
        Value::UInt(v) => Json::from(*v),
        Value::Float(v) => Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::Binary(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Seq(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), to_json(v)))
                .collect::<Map<_, _>>(),
        ),
        Value::Record(record) => Json::Object(
            record
                .fields()
                .map(|(name, v)| (name.to_string(), to_json(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

/// Build the native value for one argument, guided by its descriptor.
///
/// Shapes JSON cannot express directly are adapted: strings and byte arrays
/// become raw values, objects become records in field order and object keys
/// become integers for integer-keyed maps. Anything else converts
/// structurally and is checked later by the descriptor itself.
pub fn from_json(json: Json, ty: &TypeDescriptor) -> Result<Value, String> {
    match (ty, json) {
        (TypeDescriptor::Nullable(_), Json::Null) => Ok(Value::Nil),
        (TypeDescriptor::Nullable(inner), json) => from_json(json, inner),
        (TypeDescriptor::Primitive(Primitive::Raw), Json::String(s)) => {
            Ok(Value::Binary(s.into_bytes().into()))
        }
        (TypeDescriptor::Primitive(Primitive::Raw), Json::Array(items)) => items
            .into_iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| format!("raw byte out of range: {item}"))
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(|bytes| Value::Binary(bytes.into())),
        (TypeDescriptor::List(element), Json::Array(items)) => items
            .into_iter()
            .map(|item| from_json(item, element))
            .collect::<Result<_, _>>()
            .map(Value::Seq),
        (TypeDescriptor::Tuple(children), Json::Array(items)) if children.len() == items.len() => {
            items
                .into_iter()
                .zip(children)
                .map(|(item, child)| from_json(item, child))
                .collect::<Result<_, _>>()
                .map(Value::Seq)
        }
        (TypeDescriptor::UserDefined(record), Json::Array(items))
            if record.len() == items.len() =>
        {
            items
                .into_iter()
                .zip(record.field_types())
                .map(|(item, child)| from_json(item, child))
                .collect::<Result<_, _>>()
                .map(|values| record_value(record, values))
        }
        (TypeDescriptor::UserDefined(record), Json::Object(mut fields)) => {
            let mut values = Vec::with_capacity(record.len());
            for (name, child) in record.fields().iter().zip(record.field_types()) {
                let item = fields
                    .remove(name)
                    .ok_or_else(|| format!("{} is missing field {name}", record.name()))?;
                values.push(from_json(item, child)?);
            }
            if let Some(extra) = fields.keys().next() {
                return Err(format!("{} has no field {extra}", record.name()));
            }
            Ok(record_value(record, values))
        }
        (TypeDescriptor::Map(key, value), Json::Object(entries)) => entries
            .into_iter()
            .map(|(k, v)| Ok((map_key(k, key)?, from_json(v, value)?)))
            .collect::<Result<_, String>>()
            .map(Value::Map),
        (_, json) => Ok(untyped(json)),
    }
}

/// Values that do not fit the record stay positional, so the call reports
/// them against the argument index.
fn record_value(record: &Arc<RecordType>, values: Vec<Value>) -> Value {
    match record.record(values.clone()) {
        Ok(record) => Value::Record(record),
        Err(_) => Value::Seq(values),
    }
}

fn map_key(key: String, ty: &TypeDescriptor) -> Result<Value, String> {
    match ty {
        TypeDescriptor::Primitive(Primitive::Int { signed: true, .. }) => key
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("map key {key:?} is not an integer")),
        TypeDescriptor::Primitive(Primitive::Int { signed: false, .. }) => key
            .parse::<u64>()
            .map(Value::UInt)
            .map_err(|_| format!("map key {key:?} is not an unsigned integer")),
        _ => from_json(Json::String(key), ty),
    }
}

fn untyped(json: Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(v) = n.as_i64() {
                Value::Int(v)
            } else if let Some(v) = n.as_u64() {
                Value::UInt(v)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Seq(items.into_iter().map(untyped).collect()),
        Json::Object(fields) => Value::Map(
            fields
                .into_iter()
                .map(|(k, v)| (Value::String(k), untyped(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use mpcall_types::TypeRegistry;
    use serde_json::json;

    use super::*;

    fn entry_type(registry: &mut TypeRegistry) -> TypeDescriptor {
        registry
            .define("entry{key: string, value: int32}")
            .expect("declaration should parse");
        registry.parse("entry").expect("entry should resolve")
    }

    #[test]
    fn object_becomes_record_in_field_order() {
        let mut registry = TypeRegistry::new();
        let ty = entry_type(&mut registry);
        let value = from_json(json!({"value": 3, "key": "k"}), &ty).expect("object should convert");
        let Value::Record(record) = &value else {
            panic!("object should become a record, got {value:?}");
        };
        assert_eq!(record.to_string(), "entry{key: k, value: 3}");
        let encoded = ty.encode(&value).expect("converted value should encode");
        assert_eq!(ty.decode(encoded).expect("should decode"), value);
    }

    #[test]
    fn out_of_range_record_field_stays_positional() {
        let mut registry = TypeRegistry::new();
        let ty = entry_type(&mut registry);
        let value = from_json(json!(["k", 1_u64 << 40]), &ty).expect("array should convert");
        assert!(matches!(value, Value::Seq(_)), "{value:?}");
        assert!(ty.encode(&value).is_err());
    }

    #[test]
    fn record_object_must_match_fields() {
        let mut registry = TypeRegistry::new();
        let ty = entry_type(&mut registry);
        let missing = from_json(json!({"key": "k"}), &ty).expect_err("missing field should fail");
        assert!(missing.contains("missing field value"), "{missing}");
        let extra = from_json(json!({"key": "k", "value": 1, "x": 0}), &ty)
            .expect_err("extra field should fail");
        assert!(extra.contains("no field x"), "{extra}");
    }

    #[test]
    fn raw_accepts_text_and_byte_arrays() {
        let raw = TypeDescriptor::raw();
        assert_eq!(
            from_json(json!("ab"), &raw).expect("string should convert"),
            Value::Binary(b"ab".to_vec().into())
        );
        assert_eq!(
            from_json(json!([1, 255]), &raw).expect("bytes should convert"),
            Value::Binary(vec![1u8, 255].into())
        );
        assert!(from_json(json!([256]), &raw).is_err());
    }

    #[test]
    fn integer_map_keys_are_parsed() {
        let ty = TypeDescriptor::map(TypeDescriptor::int32(), TypeDescriptor::string());
        let value = from_json(json!({"7": "seven"}), &ty).expect("map should convert");
        assert_eq!(value, Value::Map(vec![(Value::Int(7), Value::from("seven"))]));
        assert!(from_json(json!({"x": "y"}), &ty).is_err());
    }

    #[test]
    fn nullable_and_untyped_values() {
        let ty = TypeDescriptor::nullable(TypeDescriptor::int64());
        assert_eq!(from_json(Json::Null, &ty).expect("null should convert"), Value::Nil);
        assert_eq!(from_json(json!(5), &ty).expect("int should convert"), Value::Int(5));
        assert_eq!(
            from_json(json!(1.5), &TypeDescriptor::float()).expect("float should convert"),
            Value::Float(1.5)
        );
        assert_eq!(
            from_json(json!(u64::MAX), &TypeDescriptor::uint64()).expect("u64 should convert"),
            Value::UInt(u64::MAX)
        );
    }

    #[test]
    fn values_render_as_json() {
        let mut registry = TypeRegistry::new();
        let ty = entry_type(&mut registry);
        let entry = ty
            .decode(mpcall_wire::WireValue::Array(vec![
                mpcall_wire::WireValue::from("k"),
                mpcall_wire::WireValue::from(42i64),
            ]))
            .expect("entry should decode");
        assert_eq!(to_json(&entry), json!({"key": "k", "value": 42}));
        assert_eq!(to_json(&Value::Float(f64::NAN)), Json::Null);
        assert_eq!(
            to_json(&Value::Map(vec![(Value::Int(1), Value::Bool(true))])),
            json!({"1": true})
        );
    }
}
