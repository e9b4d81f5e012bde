use crate::enums::{ScalarKind, SequenceKind};
use serde::{Deserialize, Serialize};

/// Describes the shape of a value: the reflective information the mapper
/// uses in place of runtime type introspection.
///
/// Named types (`Enum`, `Record`) are resolved through a `TypeRegistry`.
/// Descriptors are written and read as type expressions such as
/// `map<string, list<Point>>` or `i32?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeDescriptor {
    Scalar(ScalarKind),
    Enum(String),
    Record(String),
    /// A present-or-absent wrapper around a value-like type.
    Optional(Box<TypeDescriptor>),
    Sequence {
        element: Box<TypeDescriptor>,
        kind: SequenceKind,
    },
    Mapping {
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
}

impl TypeDescriptor {
    pub fn scalar(kind: ScalarKind) -> Self {
        TypeDescriptor::Scalar(kind)
    }

    pub fn record(name: impl Into<String>) -> Self {
        TypeDescriptor::Record(name.into())
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        TypeDescriptor::Enum(name.into())
    }

    pub fn list(element: TypeDescriptor) -> Self {
        Self::sequence(element, SequenceKind::List)
    }

    pub fn array(element: TypeDescriptor) -> Self {
        Self::sequence(element, SequenceKind::Array)
    }

    pub fn list_interface(element: TypeDescriptor) -> Self {
        Self::sequence(element, SequenceKind::ListInterface)
    }

    pub fn sequence(element: TypeDescriptor, kind: SequenceKind) -> Self {
        TypeDescriptor::Sequence {
            element: Box::new(element),
            kind,
        }
    }

    pub fn mapping(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Wraps a type in `Optional`.
    ///
    /// Reference-like types are already optional by nature and are returned
    /// unchanged, and an optional is never wrapped twice.
    pub fn optional(inner: TypeDescriptor) -> Self {
        if inner.is_reference_like() {
            inner
        } else {
            TypeDescriptor::Optional(Box::new(inner))
        }
    }

    /// Resolves a nullable wrapper to the type it wraps. Unwrapped types are
    /// returned as-is, so calling this repeatedly yields the same result.
    pub fn underlying(&self) -> &TypeDescriptor {
        let mut current = self;
        while let TypeDescriptor::Optional(inner) = current {
            current = inner;
        }
        current
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeDescriptor::Optional(_))
    }

    /// Types whose default is absence rather than a zero value.
    pub fn is_reference_like(&self) -> bool {
        match self {
            TypeDescriptor::Scalar(kind) => !kind.is_value_like(),
            TypeDescriptor::Enum(_) => false,
            TypeDescriptor::Record(_)
            | TypeDescriptor::Optional(_)
            | TypeDescriptor::Sequence { .. }
            | TypeDescriptor::Mapping { .. } => true,
        }
    }

    /// True for scalars and enums once nullable wrappers are resolved; these
    /// are the types that go through scalar conversion.
    pub fn is_scalar_like(&self) -> bool {
        matches!(
            self.underlying(),
            TypeDescriptor::Scalar(_) | TypeDescriptor::Enum(_)
        )
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, TypeDescriptor::Sequence { .. })
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, TypeDescriptor::Mapping { .. })
    }

    pub fn record_name(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Record(name) => Some(name),
            _ => None,
        }
    }
}

/// One member of a record or capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
    pub readable: bool,
    pub writable: bool,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            readable: true,
            writable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }
}

/// A named set of members, independent of any record hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub members: Vec<MemberDescriptor>,
}

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.members.push(MemberDescriptor::new(name, ty));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    pub name: String,
    pub variants: Vec<(String, i64)>,
}

impl EnumDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
        }
    }

    pub fn variant(mut self, name: impl Into<String>, discriminant: i64) -> Self {
        self.variants.push((name.into(), discriminant));
        self
    }

    pub fn by_name(&self, name: &str) -> Option<(&str, i64)> {
        self.variants
            .iter()
            .find(|(variant, _)| variant == name)
            .map(|(variant, d)| (variant.as_str(), *d))
    }

    pub fn by_discriminant(&self, discriminant: i64) -> Option<(&str, i64)> {
        self.variants
            .iter()
            .find(|(_, d)| *d == discriminant)
            .map(|(variant, d)| (variant.as_str(), *d))
    }

    /// The variant a fresh value of this enum holds: the one with
    /// discriminant 0, else the first declared.
    pub fn zero_variant(&self) -> Option<(&str, i64)> {
        self.by_discriminant(0).or_else(|| {
            self.variants
                .first()
                .map(|(variant, d)| (variant.as_str(), *d))
        })
    }
}

/// Describes a record type.
///
/// Built with `RecordDescriptor::builder`; inherited members and
/// capabilities are merged in when the record is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    pub name: String,
    pub base: Option<String>,
    pub capabilities: Vec<String>,
    pub members: Vec<MemberDescriptor>,
    pub constructible: bool,
}

impl RecordDescriptor {
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            descriptor: RecordDescriptor {
                name: name.into(),
                base: None,
                capabilities: Vec::new(),
                members: Vec::new(),
                constructible: true,
            },
        }
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn readable_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.member(name).filter(|m| m.readable)
    }

    pub fn writable_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.member(name).filter(|m| m.writable)
    }

    pub fn implements(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

pub struct RecordBuilder {
    descriptor: RecordDescriptor,
}

impl RecordBuilder {
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.descriptor.base = Some(base.into());
        self
    }

    pub fn implements(mut self, capability: impl Into<String>) -> Self {
        self.descriptor.capabilities.push(capability.into());
        self
    }

    pub fn member(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.with_member(MemberDescriptor::new(name, ty))
    }

    /// Adds a member; redeclaring a name replaces the earlier declaration.
    pub fn with_member(mut self, member: MemberDescriptor) -> Self {
        self.descriptor.members.retain(|m| m.name != member.name);
        self.descriptor.members.push(member);
        self
    }

    pub fn not_constructible(mut self) -> Self {
        self.descriptor.constructible = false;
        self
    }

    pub fn build(self) -> RecordDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_is_normalized() {
        let i32_ty = TypeDescriptor::scalar(ScalarKind::I32);
        let once = TypeDescriptor::optional(i32_ty.clone());
        let twice = TypeDescriptor::optional(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.underlying(), &i32_ty);
    }

    #[test]
    fn test_optional_leaves_reference_types_alone() {
        let point = TypeDescriptor::record("Point");
        assert_eq!(TypeDescriptor::optional(point.clone()), point);

        let text = TypeDescriptor::scalar(ScalarKind::String);
        assert_eq!(TypeDescriptor::optional(text.clone()), text);
    }

    #[test]
    fn test_underlying_is_idempotent() {
        let raw = TypeDescriptor::Optional(Box::new(TypeDescriptor::Optional(Box::new(
            TypeDescriptor::enumeration("Status"),
        ))));
        let once = raw.underlying().clone();
        assert_eq!(once.underlying(), &once);
        assert_eq!(once, TypeDescriptor::enumeration("Status"));
    }

    #[test]
    fn test_scalar_like() {
        assert!(TypeDescriptor::optional(TypeDescriptor::scalar(ScalarKind::U8)).is_scalar_like());
        assert!(TypeDescriptor::enumeration("Status").is_scalar_like());
        assert!(!TypeDescriptor::list(TypeDescriptor::scalar(ScalarKind::U8)).is_scalar_like());
    }

    #[test]
    fn test_builder_redeclaration_replaces_member() {
        let record = RecordDescriptor::builder("A")
            .member("x", TypeDescriptor::scalar(ScalarKind::I32))
            .with_member(MemberDescriptor::new("x", TypeDescriptor::scalar(ScalarKind::I64)).read_only())
            .build();
        assert_eq!(record.members.len(), 1);
        assert_eq!(record.members[0].ty, TypeDescriptor::scalar(ScalarKind::I64));
        assert!(record.readable_member("x").is_some());
        assert!(record.writable_member("x").is_none());
    }

    #[test]
    fn test_enum_zero_variant() {
        let status = EnumDescriptor::new("Status")
            .variant("Active", 1)
            .variant("Unknown", 0);
        assert_eq!(status.zero_variant(), Some(("Unknown", 0)));

        let level = EnumDescriptor::new("Level").variant("Low", 5).variant("High", 9);
        assert_eq!(level.zero_variant(), Some(("Low", 5)));
    }
}
