//! Bridges ordinary Rust types to the dynamic model.
//!
//! Scalars, strings, identifiers, timestamps, decimals and the standard
//! containers implement `Mappable` here. Records, enums and capabilities are
//! declared with the `mappable!`, `mappable_enum!` and `mappable_capability!`
//! macros.

use crate::error::MappingError;
use chrono::{DateTime, Utc};
use core_types::{CoreError, ScalarKind, TypeDescriptor, TypeRegistry, Value};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use uuid::Uuid;

/// A Rust type the mapper can describe, register and convert to and from `Value`.
pub trait Mappable: Sized {
    /// The descriptor of this type.
    fn describe() -> TypeDescriptor;

    /// Registers the named types this type depends on. Scalars have none.
    fn register(_registry: &mut TypeRegistry) -> Result<(), CoreError> {
        Ok(())
    }

    fn to_value(&self) -> Value;

    /// Rebuilds the type from a value. `Null` yields the type's default.
    fn from_value(value: &Value) -> Result<Self, MappingError>;
}

/// A named set of members that records may declare they implement.
pub trait CapabilitySet {
    const NAME: &'static str;

    fn register(registry: &mut TypeRegistry) -> Result<(), CoreError>;
}

macro_rules! impl_integer {
    ($variant:ident, $wide:ty, $($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Mappable for $ty {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::scalar(ScalarKind::$kind)
                }

                fn to_value(&self) -> Value {
                    Value::$variant(<$wide>::from(*self))
                }

                fn from_value(value: &Value) -> Result<Self, MappingError> {
                    let converted = match value {
                        Value::Null => Some(0),
                        Value::Int(i) => <$ty>::try_from(*i).ok(),
                        Value::UInt(u) => <$ty>::try_from(*u).ok(),
                        _ => None,
                    };
                    converted.ok_or_else(|| MappingError::mismatch(stringify!($ty), value))
                }
            }
        )*
    };
}

impl_integer!(Int, i64, i8 => I8, i16 => I16, i32 => I32, i64 => I64);
impl_integer!(UInt, u64, u8 => U8, u16 => U16, u32 => U32, u64 => U64);

impl Mappable for f32 {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::scalar(ScalarKind::F32)
    }

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(0.0),
            Value::Float(f) => Ok(*f as f32),
            other => Err(MappingError::mismatch("f32", other)),
        }
    }
}

impl Mappable for f64 {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::scalar(ScalarKind::F64)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(0.0),
            Value::Float(f) => Ok(*f),
            other => Err(MappingError::mismatch("f64", other)),
        }
    }
}

impl Mappable for bool {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::scalar(ScalarKind::Bool)
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            other => Err(MappingError::mismatch("bool", other)),
        }
    }
}

/// A null string maps to the empty string.
impl Mappable for String {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::scalar(ScalarKind::String)
    }

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Str(s) => Ok(s.clone()),
            other => Err(MappingError::mismatch("String", other)),
        }
    }
}

impl Mappable for Uuid {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::scalar(ScalarKind::Uuid)
    }

    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(Uuid::nil()),
            Value::Uuid(u) => Ok(*u),
            other => Err(MappingError::mismatch("Uuid", other)),
        }
    }
}

impl Mappable for DateTime<Utc> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::scalar(ScalarKind::DateTime)
    }

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(DateTime::<Utc>::default()),
            Value::DateTime(dt) => Ok(*dt),
            other => Err(MappingError::mismatch("DateTime<Utc>", other)),
        }
    }
}

impl Mappable for Decimal {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::scalar(ScalarKind::Decimal)
    }

    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(Decimal::ZERO),
            Value::Decimal(d) => Ok(*d),
            other => Err(MappingError::mismatch("Decimal", other)),
        }
    }
}

impl<T: Mappable> Mappable for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::optional(T::describe())
    }

    fn register(registry: &mut TypeRegistry) -> Result<(), CoreError> {
        T::register(registry)
    }

    fn to_value(&self) -> Value {
        self.as_ref().map(T::to_value).unwrap_or_default()
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Boxing is transparent; it only exists so records can refer to themselves.
impl<T: Mappable> Mappable for Box<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }

    fn register(registry: &mut TypeRegistry) -> Result<(), CoreError> {
        T::register(registry)
    }

    fn to_value(&self) -> Value {
        T::to_value(self)
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        T::from_value(value).map(Box::new)
    }
}

fn elements<T: Mappable>(value: &Value, expected: &str) -> Result<Vec<T>, MappingError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items.iter().map(T::from_value).collect(),
        other => Err(MappingError::mismatch(expected, other)),
    }
}

impl<T: Mappable> Mappable for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::list(T::describe())
    }

    fn register(registry: &mut TypeRegistry) -> Result<(), CoreError> {
        T::register(registry)
    }

    fn to_value(&self) -> Value {
        Value::Sequence(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        elements(value, "Vec")
    }
}

/// Fixed-size arrays. A null array is filled with defaults; otherwise the
/// element count must match exactly.
impl<T: Mappable, const N: usize> Mappable for [T; N] {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::array(T::describe())
    }

    fn register(registry: &mut TypeRegistry) -> Result<(), CoreError> {
        T::register(registry)
    }

    fn to_value(&self) -> Value {
        Value::Sequence(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        let items: Vec<T> = match value {
            Value::Null => (0..N).map(|_| T::from_value(&Value::Null)).collect::<Result<_, _>>()?,
            other => elements(other, "array")?,
        };
        let found = items.len();
        items.try_into().map_err(|_| MappingError::TypeMismatch {
            expected: format!("array of {N}"),
            found: format!("sequence of {found}"),
        })
    }
}

fn entries<K: Mappable, V: Mappable, C: FromIterator<(K, V)>>(value: &Value, expected: &str) -> Result<C, MappingError> {
    match value {
        Value::Null => Ok(std::iter::empty().collect()),
        Value::Mapping(entries) => entries
            .iter()
            .map(|(k, v)| -> Result<(K, V), MappingError> { Ok((K::from_value(k)?, V::from_value(v)?)) })
            .collect(),
        other => Err(MappingError::mismatch(expected, other)),
    }
}

impl<K: Mappable + Eq + Hash, V: Mappable> Mappable for HashMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::mapping(K::describe(), V::describe())
    }

    fn register(registry: &mut TypeRegistry) -> Result<(), CoreError> {
        K::register(registry)?;
        V::register(registry)
    }

    fn to_value(&self) -> Value {
        Value::Mapping(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        entries(value, "HashMap")
    }
}

impl<K: Mappable + Ord, V: Mappable> Mappable for BTreeMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::mapping(K::describe(), V::describe())
    }

    fn register(registry: &mut TypeRegistry) -> Result<(), CoreError> {
        K::register(registry)?;
        V::register(registry)
    }

    fn to_value(&self) -> Value {
        Value::Mapping(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: &Value) -> Result<Self, MappingError> {
        entries(value, "BTreeMap")
    }
}
