//! Conversions between scalar and enum values.
//!
//! Every function here answers `None` when the value cannot be represented in
//! the target type; the caller decides whether that becomes a default or an error.

use chrono::{DateTime, Utc};
use core_types::{EnumDescriptor, EnumValue, ScalarKind, TypeDescriptor, TypeRegistry, Value};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Converts a scalar or enum value to `target` (nullable wrappers are resolved first).
pub(crate) fn convert_scalar(registry: &TypeRegistry, value: &Value, target: &TypeDescriptor) -> Option<Value> {
    match target.underlying() {
        TypeDescriptor::Scalar(kind) => to_kind(value, *kind),
        TypeDescriptor::Enum(name) => {
            let descriptor = registry.enumeration(name).ok()?;
            to_enum(value, descriptor)
        }
        _ => None,
    }
}

fn to_kind(value: &Value, kind: ScalarKind) -> Option<Value> {
    match kind {
        ScalarKind::Bool => to_bool(value).map(Value::Bool),
        ScalarKind::F32 => {
            let f = to_f64(value)?;
            if f.is_finite() && f.abs() > f64::from(f32::MAX) {
                return None;
            }
            Some(Value::Float(f64::from(f as f32)))
        }
        ScalarKind::F64 => to_f64(value).map(Value::Float),
        ScalarKind::Decimal => to_decimal(value).map(Value::Decimal),
        ScalarKind::String => to_text(value).map(Value::Str),
        ScalarKind::Uuid => match value {
            Value::Uuid(u) => Some(Value::Uuid(*u)),
            Value::Str(s) => Uuid::parse_str(s.trim()).ok().map(Value::Uuid),
            _ => None,
        },
        ScalarKind::DateTime => match value {
            Value::DateTime(dt) => Some(Value::DateTime(*dt)),
            Value::Str(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),
            _ => None,
        },
        integer => {
            let (min, max) = integer.integer_bounds()?;
            let wide = to_i128(value)?;
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

/// Widens any integral reading of the value. Fractions round half to even.
fn to_i128(value: &Value) -> Option<i128> {
    match value {
        Value::Int(i) => Some(i128::from(*i)),
        Value::UInt(u) => Some(i128::from(*u)),
        Value::Bool(b) => Some(i128::from(*b)),
        Value::Float(f) => {
            if !f.is_finite() {
                return None;
            }
            let rounded = f.round_ties_even();
            // i128 covers every integer kind; anything beyond is out of range anyway.
            if rounded.abs() >= 1e38 {
                return None;
            }
            Some(rounded as i128)
        }
        Value::Decimal(d) => d.round().to_i128(),
        Value::Str(s) => s.trim().parse::<i128>().ok(),
        Value::Enum(e) => Some(i128::from(e.discriminant)),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::UInt(u) => Some(*u as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Decimal(d) => d.to_f64(),
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        Value::Enum(e) => Some(e.discriminant as f64),
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::UInt(u) => Some(Decimal::from(*u)),
        Value::Float(f) => Decimal::from_f64(*f),
        Value::Bool(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        Value::Decimal(d) => Some(*d),
        Value::Str(s) => Decimal::from_str(s.trim()).ok(),
        Value::Enum(e) => Some(Decimal::from(e.discriminant)),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(i) => Some(*i != 0),
        Value::UInt(u) => Some(*u != 0),
        Value::Float(f) => Some(*f != 0.0),
        Value::Decimal(d) => Some(!d.is_zero()),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Enum(e) => Some(e.discriminant != 0),
        _ => None,
    }
}

fn to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Str(s) => s.clone(),
        Value::Uuid(u) => u.to_string(),
        Value::DateTime(dt) => dt.to_rfc3339(),
        Value::Enum(e) => e.variant.clone(),
        Value::Null | Value::Record(_) | Value::Sequence(_) | Value::Mapping(_) => return None,
    };
    Some(text)
}

/// Enums convert by variant name (from enums and strings) or by discriminant
/// (from integers and numeric strings). Undefined discriminants are rejected.
fn to_enum(value: &Value, descriptor: &EnumDescriptor) -> Option<Value> {
    let found = match value {
        Value::Enum(e) => descriptor
            .by_name(&e.variant)
            .or_else(|| descriptor.by_discriminant(e.discriminant)),
        Value::Str(s) => {
            let s = s.trim();
            descriptor.by_name(s).or_else(|| {
                s.parse::<i64>()
                    .ok()
                    .and_then(|d| descriptor.by_discriminant(d))
            })
        }
        other => to_i128(other)
            .and_then(|d| i64::try_from(d).ok())
            .and_then(|d| descriptor.by_discriminant(d)),
    };
    found.map(|(variant, discriminant)| Value::Enum(EnumValue::new(variant, discriminant)))
}
