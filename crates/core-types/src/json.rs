//! Conversion between dynamic `Value`s and JSON documents.
//!
//! Decoding needs the declared type, since JSON cannot tell an enum from a
//! string or a `u8` from an `i64`. A record object may carry a `"$type"` key
//! naming a registered subtype of the declared record.

use crate::descriptors::TypeDescriptor;
use crate::enums::ScalarKind;
use crate::error::CoreError;
use crate::registry::TypeRegistry;
use crate::value::{EnumValue, Value};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value as Json, json};
use std::str::FromStr;
use uuid::Uuid;

pub const TYPE_TAG: &str = "$type";

impl Value {
    /// Encodes the value as JSON. Mappings whose keys are all strings become
    /// objects; any other mapping becomes an array of `{"key", "value"}` objects.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => json!(i),
            Value::UInt(u) => json!(u),
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::Str(s) => Json::String(s.clone()),
            Value::Uuid(u) => Json::String(u.to_string()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339()),
            Value::Enum(e) => Json::String(e.variant.clone()),
            Value::Record(record) => {
                let fields: Map<String, Json> = record
                    .fields()
                    .map(|(name, value)| (name.to_string(), value.to_json()))
                    .collect();
                Json::Object(fields)
            }
            Value::Sequence(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Mapping(entries) => mapping_to_json(entries, |entry, _| entry.to_json()),
        }
    }
}

/// String-keyed mappings become objects, others arrays of entry objects.
/// `encode` receives each key (`true`) and value (`false`).
fn mapping_to_json(entries: &[(Value, Value)], encode: impl Fn(&Value, bool) -> Json) -> Json {
    if entries.iter().all(|(k, _)| matches!(k, Value::Str(_))) {
        let object: Map<String, Json> = entries
            .iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), encode(v, false))))
            .collect();
        Json::Object(object)
    } else {
        Json::Array(
            entries
                .iter()
                .map(|(k, v)| json!({ "key": encode(k, true), "value": encode(v, false) }))
                .collect(),
        )
    }
}

impl TypeRegistry {
    /// Encodes a value of the declared type. A record whose runtime type
    /// differs from the declared one carries a `"$type"` key, so that
    /// `value_from_json` restores the subtype.
    pub fn value_to_json(&self, value: &Value, ty: &TypeDescriptor) -> Json {
        match (value, ty.underlying()) {
            (Value::Record(record), TypeDescriptor::Record(declared)) => {
                let descriptor = self.record(record.type_name()).ok();
                let mut fields = Map::new();
                if record.type_name() != declared.as_str() {
                    fields.insert(TYPE_TAG.to_string(), Json::String(record.type_name().to_string()));
                }
                for (name, field) in record.fields() {
                    let json = match descriptor.and_then(|d| d.member(name)) {
                        Some(member) => self.value_to_json(field, &member.ty),
                        None => field.to_json(),
                    };
                    fields.insert(name.to_string(), json);
                }
                Json::Object(fields)
            }
            (Value::Sequence(items), TypeDescriptor::Sequence { element, .. }) => {
                Json::Array(items.iter().map(|item| self.value_to_json(item, element)).collect())
            }
            (Value::Mapping(entries), TypeDescriptor::Mapping { key, value: value_ty }) => {
                mapping_to_json(entries, |entry, is_key| {
                    self.value_to_json(entry, if is_key { key } else { value_ty })
                })
            }
            _ => value.to_json(),
        }
    }

    /// Decodes a JSON document as a value of the declared type.
    pub fn value_from_json(&self, json: &Json, ty: &TypeDescriptor) -> Result<Value, CoreError> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        let invalid = |reason: &str| CoreError::InvalidValue {
            ty: ty.to_string(),
            reason: format!("{reason}, got {json}"),
        };

        match ty {
            TypeDescriptor::Scalar(kind) => scalar_from_json(json, *kind).ok_or_else(|| invalid("not a valid scalar")),
            TypeDescriptor::Enum(name) => {
                let descriptor = self.enumeration(name)?;
                let found = match json {
                    Json::String(s) => descriptor.by_name(s),
                    Json::Number(n) => n.as_i64().and_then(|d| descriptor.by_discriminant(d)),
                    _ => None,
                };
                found
                    .map(|(variant, d)| Value::Enum(EnumValue::new(variant, d)))
                    .ok_or_else(|| invalid("no such variant"))
            }
            TypeDescriptor::Optional(inner) => self.value_from_json(json, inner),
            TypeDescriptor::Record(name) => {
                let object = json.as_object().ok_or_else(|| invalid("expected an object"))?;
                let runtime = match object.get(TYPE_TAG).and_then(Json::as_str) {
                    Some(tagged) if tagged == name.as_str() || self.is_ancestor(name, tagged) => tagged,
                    Some(_) => return Err(invalid("'$type' is not a subtype of the declared record")),
                    None => name.as_str(),
                };
                let descriptor = self.record(runtime)?;
                let mut record = self.blank_record(runtime)?;
                for member in &descriptor.members {
                    if let Some(field) = object.get(&member.name) {
                        record.set(member.name.clone(), self.value_from_json(field, &member.ty)?);
                    }
                }
                Ok(Value::Record(record))
            }
            TypeDescriptor::Sequence { element, .. } => {
                let items = json.as_array().ok_or_else(|| invalid("expected an array"))?;
                items
                    .iter()
                    .map(|item| self.value_from_json(item, element))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Sequence)
            }
            TypeDescriptor::Mapping { key, value } => match json {
                Json::Object(object) => object
                    .iter()
                    .map(|(k, v)| Ok((self.key_from_json(k, key)?, self.value_from_json(v, value)?)))
                    .collect::<Result<Vec<_>, CoreError>>()
                    .map(Value::Mapping),
                Json::Array(entries) => entries
                    .iter()
                    .map(|entry| {
                        let k = entry.get("key").ok_or_else(|| invalid("entry without 'key'"))?;
                        let v = entry.get("value").unwrap_or(&Json::Null);
                        Ok((self.value_from_json(k, key)?, self.value_from_json(v, value)?))
                    })
                    .collect::<Result<Vec<_>, CoreError>>()
                    .map(Value::Mapping),
                _ => Err(invalid("expected an object or an array of entries")),
            },
        }
    }

    /// Object keys are always strings; non-string key types are read from
    /// the key's own JSON text when it parses, else from the raw string.
    fn key_from_json(&self, key: &str, ty: &TypeDescriptor) -> Result<Value, CoreError> {
        if matches!(ty.underlying(), TypeDescriptor::Scalar(ScalarKind::String)) {
            return Ok(Value::Str(key.to_string()));
        }
        let parsed = serde_json::from_str::<Json>(key).unwrap_or_else(|_| Json::String(key.to_string()));
        self.value_from_json(&parsed, ty)
    }
}

fn scalar_from_json(json: &Json, kind: ScalarKind) -> Option<Value> {
    match kind {
        ScalarKind::Bool => json.as_bool().map(Value::Bool),
        ScalarKind::F32 | ScalarKind::F64 => json.as_f64().map(Value::Float),
        ScalarKind::Decimal => match json {
            Json::Number(n) => Decimal::from_str(&n.to_string()).ok().map(Value::Decimal),
            Json::String(s) => Decimal::from_str(s.trim()).ok().map(Value::Decimal),
            _ => None,
        },
        ScalarKind::String => json.as_str().map(|s| Value::Str(s.to_string())),
        ScalarKind::Uuid => json.as_str().and_then(|s| Uuid::parse_str(s).ok()).map(Value::Uuid),
        ScalarKind::DateTime => json
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),
        integer => {
            let (min, max) = integer.integer_bounds()?;
            let wide = json
                .as_i64()
                .map(i128::from)
                .or_else(|| json.as_u64().map(i128::from))?;
            if wide < min || wide > max {
                return None;
            }
            if integer.is_signed_integer() {
                i64::try_from(wide).ok().map(Value::Int)
            } else {
                u64::try_from(wide).ok().map(Value::UInt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{EnumDescriptor, RecordDescriptor};
    use rust_decimal_macros::dec;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register_enum(EnumDescriptor::new("Status").variant("Active", 0).variant("Closed", 1))
            .unwrap();
        registry
            .register_record(
                RecordDescriptor::builder("Point")
                    .member("x", TypeDescriptor::scalar(ScalarKind::I32))
                    .member("y", TypeDescriptor::scalar(ScalarKind::I32))
                    .build(),
            )
            .unwrap();
        registry
            .register_record(
                RecordDescriptor::builder("Point3")
                    .extends("Point")
                    .member("z", TypeDescriptor::scalar(ScalarKind::I32))
                    .build(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_record_from_json_fills_missing_members_with_defaults() {
        let registry = registry();
        let value = registry
            .value_from_json(&json!({ "x": 4 }), &TypeDescriptor::record("Point"))
            .unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.get("x"), Some(&Value::Int(4)));
        assert_eq!(record.get("y"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_type_tag_selects_subtype() {
        let registry = registry();
        let value = registry
            .value_from_json(&json!({ "$type": "Point3", "x": 1, "z": 3 }), &TypeDescriptor::record("Point"))
            .unwrap();
        assert_eq!(value.as_record().unwrap().type_name(), "Point3");

        let err = registry
            .value_from_json(&json!({ "$type": "Status" }), &TypeDescriptor::record("Point"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));
    }

    #[test]
    fn test_subtype_is_tagged_on_output() {
        let registry = registry();
        let point = TypeDescriptor::record("Point");
        let doc = json!({ "$type": "Point3", "x": 1, "y": 2, "z": 3 });
        let value = registry.value_from_json(&doc, &point).unwrap();
        assert_eq!(registry.value_to_json(&value, &point), doc);
        assert_eq!(registry.value_from_json(&registry.value_to_json(&value, &point), &point).unwrap(), value);

        let list = TypeDescriptor::list(point.clone());
        let listed = Value::Sequence(vec![value.clone()]);
        assert_eq!(registry.value_to_json(&listed, &list), json!([doc]));

        // Exact types need no tag.
        let plain = registry.value_from_json(&json!({ "x": 1, "y": 2 }), &point).unwrap();
        assert_eq!(registry.value_to_json(&plain, &point), json!({ "x": 1, "y": 2 }));
        assert_eq!(
            registry.value_to_json(&value, &TypeDescriptor::record("Point3")),
            json!({ "x": 1, "y": 2, "z": 3 })
        );
    }

    #[test]
    fn test_scalars_are_range_checked() {
        let registry = registry();
        let u8_ty = TypeDescriptor::scalar(ScalarKind::U8);
        assert_eq!(registry.value_from_json(&json!(200), &u8_ty).unwrap(), Value::UInt(200));
        assert!(registry.value_from_json(&json!(300), &u8_ty).is_err());
        assert!(registry.value_from_json(&json!(-1), &u8_ty).is_err());
        assert_eq!(
            registry
                .value_from_json(&json!("12.50"), &TypeDescriptor::scalar(ScalarKind::Decimal))
                .unwrap(),
            Value::Decimal(dec!(12.50))
        );
    }

    #[test]
    fn test_enum_by_name_or_discriminant() {
        let registry = registry();
        let status = TypeDescriptor::enumeration("Status");
        assert_eq!(
            registry.value_from_json(&json!("Closed"), &status).unwrap(),
            Value::Enum(EnumValue::new("Closed", 1))
        );
        assert_eq!(
            registry.value_from_json(&json!(0), &status).unwrap(),
            Value::Enum(EnumValue::new("Active", 0))
        );
        assert!(registry.value_from_json(&json!("Open"), &status).is_err());
    }

    #[test]
    fn test_mapping_with_record_keys_uses_entry_arrays() {
        let registry = registry();
        let ty = TypeDescriptor::mapping(
            TypeDescriptor::record("Point"),
            TypeDescriptor::scalar(ScalarKind::I32),
        );
        let value = registry
            .value_from_json(&json!([{ "key": { "x": 1, "y": 2 }, "value": 7 }]), &ty)
            .unwrap();
        let entries = value.as_mapping().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, Value::Int(7));

        assert_eq!(value.to_json(), json!([{ "key": { "x": 1, "y": 2 }, "value": 7 }]));
    }

    #[test]
    fn test_string_keyed_mapping_round_trips_as_object() {
        let registry = registry();
        let ty = TypeDescriptor::mapping(
            TypeDescriptor::scalar(ScalarKind::String),
            TypeDescriptor::scalar(ScalarKind::I64),
        );
        let doc = json!({ "a": 1, "b": 2 });
        let value = registry.value_from_json(&doc, &ty).unwrap();
        assert_eq!(value.to_json(), doc);
    }

    #[test]
    fn test_integer_keys_are_parsed_from_object_keys() {
        let registry = registry();
        let ty = TypeDescriptor::mapping(
            TypeDescriptor::scalar(ScalarKind::I32),
            TypeDescriptor::scalar(ScalarKind::Bool),
        );
        let value = registry.value_from_json(&json!({ "42": true }), &ty).unwrap();
        assert_eq!(value, Value::Mapping(vec![(Value::Int(42), Value::Bool(true))]));
    }
}
