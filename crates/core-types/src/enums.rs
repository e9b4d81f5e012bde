use serde::{Deserialize, Serialize};
use std::fmt;

/// The primitive member types the mapper knows how to convert between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
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
    Decimal,
    String,
    Uuid,
    DateTime,
}

impl ScalarKind {
    /// Returns the name used for this kind in type expressions.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Decimal => "decimal",
            ScalarKind::String => "string",
            ScalarKind::Uuid => "uuid",
            ScalarKind::DateTime => "datetime",
        }
    }

    /// Parses a type-expression name into a scalar kind.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" => ScalarKind::Bool,
            "i8" => ScalarKind::I8,
            "i16" => ScalarKind::I16,
            "i32" => ScalarKind::I32,
            "i64" => ScalarKind::I64,
            "u8" => ScalarKind::U8,
            "u16" => ScalarKind::U16,
            "u32" => ScalarKind::U32,
            "u64" => ScalarKind::U64,
            "f32" => ScalarKind::F32,
            "f64" => ScalarKind::F64,
            "decimal" => ScalarKind::Decimal,
            "string" => ScalarKind::String,
            "uuid" => ScalarKind::Uuid,
            "datetime" => ScalarKind::DateTime,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_integer(&self) -> bool {
        self.integer_bounds().is_some()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || *self == ScalarKind::Decimal
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64
        )
    }

    /// Inclusive range of an integer kind, widened to `i128` so that every
    /// kind fits in one representation.
    pub fn integer_bounds(&self) -> Option<(i128, i128)> {
        let bounds = match self {
            ScalarKind::I8 => (i8::MIN as i128, i8::MAX as i128),
            ScalarKind::I16 => (i16::MIN as i128, i16::MAX as i128),
            ScalarKind::I32 => (i32::MIN as i128, i32::MAX as i128),
            ScalarKind::I64 => (i64::MIN as i128, i64::MAX as i128),
            ScalarKind::U8 => (0, u8::MAX as i128),
            ScalarKind::U16 => (0, u16::MAX as i128),
            ScalarKind::U32 => (0, u32::MAX as i128),
            ScalarKind::U64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(bounds)
    }

    /// Strings are the only reference-like scalar: their default is absence.
    pub fn is_value_like(&self) -> bool {
        *self != ScalarKind::String
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The flavours of ordered sequence a destination can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    /// A growable list.
    List,
    /// A fixed-size array, sized to the source sequence when constructed.
    Array,
    /// A list-like interface with no concrete implementation; materialized as `List`.
    ListInterface,
}

impl SequenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::List => "list",
            SequenceKind::Array => "array",
            SequenceKind::ListInterface => "ilist",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "list" => Some(SequenceKind::List),
            "array" => Some(SequenceKind::Array),
            "ilist" => Some(SequenceKind::ListInterface),
            _ => None,
        }
    }
}
