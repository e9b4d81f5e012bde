use crate::descriptors::{Capability, EnumDescriptor, MemberDescriptor, RecordDescriptor, TypeDescriptor};
use crate::enums::{ScalarKind, SequenceKind};
use crate::error::CoreError;
use crate::value::{EnumValue, Record, Value};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// The set of named types (records, enums and capabilities) known to a mapper.
///
/// Registration is append-only: once a name is registered its descriptor never
/// changes, which is what lets member-matching tables be memoized by name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    records: HashMap<String, RecordDescriptor>,
    enums: HashMap<String, EnumDescriptor>,
    capabilities: HashMap<String, Capability>,
    reserved: HashSet<String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the name is registered as any kind of type, or reserved.
    pub fn is_known(&self, name: &str) -> bool {
        self.records.contains_key(name)
            || self.enums.contains_key(name)
            || self.capabilities.contains_key(name)
            || self.reserved.contains(name)
    }

    /// Claims a record name ahead of registration so that self-referential
    /// types can register their members without recursing forever.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.reserved.insert(name.into());
    }

    /// Drops a reservation whose registration did not complete. Registered
    /// names are unaffected.
    pub fn release(&mut self, name: &str) {
        self.reserved.remove(name);
    }

    fn ensure_new(&self, name: &str) -> Result<(), CoreError> {
        if self.records.contains_key(name)
            || self.enums.contains_key(name)
            || self.capabilities.contains_key(name)
        {
            return Err(CoreError::DuplicateType(name.to_string()));
        }
        Ok(())
    }

    pub fn register_capability(&mut self, capability: Capability) -> Result<(), CoreError> {
        self.ensure_new(&capability.name)?;
        let members = self.resolve_members(capability.members);
        tracing::debug!(capability = %capability.name, members = members.len(), "Registered capability.");
        self.capabilities.insert(
            capability.name.clone(),
            Capability {
                name: capability.name,
                members,
            },
        );
        Ok(())
    }

    pub fn register_enum(&mut self, descriptor: EnumDescriptor) -> Result<(), CoreError> {
        self.ensure_new(&descriptor.name)?;
        if descriptor.variants.is_empty() {
            return Err(CoreError::EmptyEnum(descriptor.name));
        }
        tracing::debug!(enumeration = %descriptor.name, "Registered enum.");
        self.reserved.remove(&descriptor.name);
        self.enums.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Registers a record, merging in what it inherits from its base.
    ///
    /// The resulting member set is the base's members minus any the record
    /// redeclares, followed by the record's own members. Capabilities are
    /// inherited as well and checked against the merged member set.
    pub fn register_record(&mut self, record: RecordDescriptor) -> Result<&RecordDescriptor, CoreError> {
        self.ensure_new(&record.name)?;
        let mut record = record;
        record.members = self.resolve_members(record.members);

        if let Some(base_name) = &record.base {
            let base = self
                .records
                .get(base_name)
                .ok_or_else(|| CoreError::UnknownType(base_name.clone()))?;

            let mut members: Vec<MemberDescriptor> = base
                .members
                .iter()
                .filter(|inherited| record.member(&inherited.name).is_none())
                .cloned()
                .collect();
            members.append(&mut record.members);
            record.members = members;

            for capability in &base.capabilities {
                if !record.implements(capability) {
                    record.capabilities.push(capability.clone());
                }
            }
        }

        self.check_capabilities(&record)?;

        tracing::debug!(
            record = %record.name,
            base = ?record.base,
            members = record.members.len(),
            "Registered record."
        );
        let name = record.name.clone();
        self.reserved.remove(&name);
        Ok(self.records.entry(name).or_insert(record))
    }

    fn resolve_members(&self, members: Vec<MemberDescriptor>) -> Vec<MemberDescriptor> {
        members
            .into_iter()
            .map(|member| MemberDescriptor {
                ty: self.resolve(&member.ty),
                ..member
            })
            .collect()
    }

    fn check_capabilities(&self, record: &RecordDescriptor) -> Result<(), CoreError> {
        for capability_name in &record.capabilities {
            let capability = self.capability(capability_name)?;
            for required in &capability.members {
                let unsatisfied = |reason: String| CoreError::CapabilityNotSatisfied {
                    record: record.name.clone(),
                    capability: capability.name.clone(),
                    reason,
                };

                let member = record
                    .member(&required.name)
                    .ok_or_else(|| unsatisfied(format!("missing member '{}'", required.name)))?;
                if !member.readable {
                    return Err(unsatisfied(format!("member '{}' is not readable", member.name)));
                }
                if !self.is_assignable(&member.ty, &required.ty) {
                    return Err(unsatisfied(format!(
                        "member '{}' has type {} which is not assignable to {}",
                        member.name, member.ty, required.ty
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn record(&self, name: &str) -> Result<&RecordDescriptor, CoreError> {
        self.records
            .get(name)
            .ok_or_else(|| CoreError::UnknownType(name.to_string()))
    }

    pub fn enumeration(&self, name: &str) -> Result<&EnumDescriptor, CoreError> {
        self.enums
            .get(name)
            .ok_or_else(|| CoreError::UnknownType(name.to_string()))
    }

    pub fn capability(&self, name: &str) -> Result<&Capability, CoreError> {
        self.capabilities
            .get(name)
            .ok_or_else(|| CoreError::UnknownType(name.to_string()))
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordDescriptor> + '_ {
        self.records.values()
    }

    /// Rewrites names that refer to registered enums from `Record` to `Enum`
    /// and re-normalizes optional wrappers. Parsed type expressions should go
    /// through here before use.
    pub fn resolve(&self, ty: &TypeDescriptor) -> TypeDescriptor {
        match ty {
            TypeDescriptor::Record(name) if self.enums.contains_key(name) => {
                TypeDescriptor::Enum(name.clone())
            }
            TypeDescriptor::Optional(inner) => TypeDescriptor::optional(self.resolve(inner)),
            TypeDescriptor::Sequence { element, kind } => {
                TypeDescriptor::sequence(self.resolve(element), *kind)
            }
            TypeDescriptor::Mapping { key, value } => {
                TypeDescriptor::mapping(self.resolve(key), self.resolve(value))
            }
            other => other.clone(),
        }
    }

    /// Walks `descendant`'s base chain looking for `ancestor`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut current = self.records.get(descendant).and_then(|r| r.base.as_deref());
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.records.get(name).and_then(|r| r.base.as_deref());
        }
        false
    }

    /// Whether a value of `source` can be stored as-is in a slot of type
    /// `destination`: the same type, a base record of it, or an optional of
    /// either. Any concrete sequence fits a list interface over an
    /// assignable element type.
    pub fn is_assignable(&self, source: &TypeDescriptor, destination: &TypeDescriptor) -> bool {
        if source == destination {
            return true;
        }
        match (source, destination) {
            (_, TypeDescriptor::Optional(inner)) => self.is_assignable(source.underlying(), inner),
            (TypeDescriptor::Record(s), TypeDescriptor::Record(d)) => self.is_ancestor(d, s),
            (
                TypeDescriptor::Sequence { element: se, .. },
                TypeDescriptor::Sequence {
                    element: de,
                    kind: SequenceKind::ListInterface,
                },
            ) => self.is_assignable(se, de),
            _ => false,
        }
    }

    /// Capabilities declared (directly or by inheritance) by both records.
    pub fn shared_capabilities<'a>(&self, a: &'a RecordDescriptor, b: &RecordDescriptor) -> Vec<&'a str> {
        a.capabilities
            .iter()
            .filter(|c| b.implements(c))
            .map(String::as_str)
            .collect()
    }

    /// The zero-equivalent value of a type.
    ///
    /// Value-like types get their zero (`false`, `0`, `0.0`, nil uuid, the
    /// Unix epoch, the enum's zero variant). Strings, records, optionals,
    /// sequences and mappings get `Null`.
    pub fn default_value(&self, ty: &TypeDescriptor) -> Value {
        match ty {
            TypeDescriptor::Scalar(kind) => match kind {
                ScalarKind::Bool => Value::Bool(false),
                ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64 => Value::Int(0),
                ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64 => Value::UInt(0),
                ScalarKind::F32 | ScalarKind::F64 => Value::Float(0.0),
                ScalarKind::Decimal => Value::Decimal(Decimal::ZERO),
                ScalarKind::String => Value::Null,
                ScalarKind::Uuid => Value::Uuid(Uuid::nil()),
                ScalarKind::DateTime => Value::DateTime(DateTime::<Utc>::default()),
            },
            TypeDescriptor::Enum(name) => {
                match self.enums.get(name).and_then(EnumDescriptor::zero_variant) {
                    Some((variant, discriminant)) => Value::Enum(EnumValue::new(variant, discriminant)),
                    None => {
                        tracing::debug!(enumeration = %name, "Default requested for an unregistered enum.");
                        Value::Enum(EnumValue::new(String::new(), 0))
                    }
                }
            }
            TypeDescriptor::Record(_)
            | TypeDescriptor::Optional(_)
            | TypeDescriptor::Sequence { .. }
            | TypeDescriptor::Mapping { .. } => Value::Null,
        }
    }

    /// A record instance with every member at its default value.
    pub fn blank_record(&self, name: &str) -> Result<Record, CoreError> {
        let descriptor = self.record(name)?;
        let mut record = Record::new(name);
        for member in &descriptor.members {
            record.set(member.name.clone(), self.default_value(&member.ty));
        }
        Ok(record)
    }

    /// Checks that every named type referenced by a registered member exists.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(name) = self.reserved.iter().next() {
            return Err(CoreError::UnknownType(name.clone()));
        }
        let members = self
            .records
            .values()
            .flat_map(|r| r.members.iter())
            .chain(self.capabilities.values().flat_map(|c| c.members.iter()));
        for member in members {
            self.check_referenced(&member.ty)?;
        }
        Ok(())
    }

    /// True when every named type the descriptor mentions is registered.
    pub fn knows(&self, ty: &TypeDescriptor) -> bool {
        self.check_referenced(ty).is_ok()
    }

    fn check_referenced(&self, ty: &TypeDescriptor) -> Result<(), CoreError> {
        match ty {
            TypeDescriptor::Scalar(_) => Ok(()),
            TypeDescriptor::Enum(name) => self.enumeration(name).map(|_| ()),
            TypeDescriptor::Record(name) => self.record(name).map(|_| ()),
            TypeDescriptor::Optional(inner) => self.check_referenced(inner),
            TypeDescriptor::Sequence { element, .. } => self.check_referenced(element),
            TypeDescriptor::Mapping { key, value } => {
                self.check_referenced(key)?;
                self.check_referenced(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32_ty() -> TypeDescriptor {
        TypeDescriptor::scalar(ScalarKind::I32)
    }

    fn registry_with_points() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register_capability(Capability::new("HasPosition").member("x", i32_ty()).member("y", i32_ty()))
            .unwrap();
        registry
            .register_record(
                RecordDescriptor::builder("Point")
                    .implements("HasPosition")
                    .member("x", i32_ty())
                    .member("y", i32_ty())
                    .build(),
            )
            .unwrap();
        registry
            .register_record(
                RecordDescriptor::builder("Point3")
                    .extends("Point")
                    .member("z", i32_ty())
                    .build(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_inherited_members_and_capabilities() {
        let registry = registry_with_points();
        let point3 = registry.record("Point3").unwrap();
        let names: Vec<&str> = point3.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert!(point3.implements("HasPosition"));
        assert!(registry.is_ancestor("Point", "Point3"));
        assert!(!registry.is_ancestor("Point3", "Point"));
    }

    #[test]
    fn test_redeclared_member_hides_inherited_one() {
        let mut registry = registry_with_points();
        registry
            .register_record(
                RecordDescriptor::builder("WidePoint")
                    .extends("Point")
                    .member("x", TypeDescriptor::scalar(ScalarKind::I64))
                    .build(),
            )
            .unwrap_err();

        // `x` as i64 no longer satisfies HasPosition's i32 `x`, so try a compatible redeclaration.
        registry
            .register_record(
                RecordDescriptor::builder("LabelledPoint")
                    .extends("Point")
                    .with_member(MemberDescriptor::new("y", i32_ty()).read_only())
                    .build(),
            )
            .unwrap();
        let labelled = registry.record("LabelledPoint").unwrap();
        assert_eq!(labelled.members.iter().filter(|m| m.name == "y").count(), 1);
        assert!(!labelled.member("y").unwrap().writable);
    }

    #[test]
    fn test_capability_must_be_satisfied() {
        let mut registry = registry_with_points();
        let err = registry
            .register_record(
                RecordDescriptor::builder("Flat")
                    .implements("HasPosition")
                    .member("x", i32_ty())
                    .build(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::CapabilityNotSatisfied { .. }));
    }

    #[test]
    fn test_release_only_drops_reservations() {
        let mut registry = registry_with_points();
        registry.reserve("Pending");
        assert!(registry.is_known("Pending"));
        registry.release("Pending");
        assert!(!registry.is_known("Pending"));
        assert!(registry.validate().is_ok());

        registry.release("Point");
        assert!(registry.record("Point").is_ok());
    }

    #[test]
    fn test_duplicate_and_unknown_base() {
        let mut registry = registry_with_points();
        let dup = registry
            .register_record(RecordDescriptor::builder("Point").build())
            .unwrap_err();
        assert_eq!(dup, CoreError::DuplicateType("Point".into()));

        let unknown = registry
            .register_record(RecordDescriptor::builder("Orphan").extends("Missing").build())
            .unwrap_err();
        assert_eq!(unknown, CoreError::UnknownType("Missing".into()));
    }

    #[test]
    fn test_resolve_turns_names_into_enums() {
        let mut registry = TypeRegistry::new();
        registry
            .register_enum(EnumDescriptor::new("Status").variant("Active", 0))
            .unwrap();
        let parsed: TypeDescriptor = "list<Status?>".parse().unwrap();
        assert_eq!(
            registry.resolve(&parsed),
            TypeDescriptor::list(TypeDescriptor::optional(TypeDescriptor::enumeration("Status")))
        );

        let record_opt: TypeDescriptor = "Point?".parse().unwrap();
        assert_eq!(registry.resolve(&record_opt), TypeDescriptor::record("Point"));
    }

    #[test]
    fn test_assignability() {
        let registry = registry_with_points();
        let point = TypeDescriptor::record("Point");
        let point3 = TypeDescriptor::record("Point3");
        assert!(registry.is_assignable(&point3, &point));
        assert!(!registry.is_assignable(&point, &point3));
        assert!(registry.is_assignable(&i32_ty(), &TypeDescriptor::optional(i32_ty())));
        assert!(registry.is_assignable(
            &TypeDescriptor::array(point3.clone()),
            &TypeDescriptor::list_interface(point.clone())
        ));
        assert!(!registry.is_assignable(&TypeDescriptor::list(point3), &TypeDescriptor::list(point)));
    }

    #[test]
    fn test_default_values() {
        let mut registry = TypeRegistry::new();
        registry
            .register_enum(EnumDescriptor::new("Status").variant("Active", 1).variant("None", 0))
            .unwrap();

        assert_eq!(registry.default_value(&TypeDescriptor::scalar(ScalarKind::Bool)), Value::Bool(false));
        assert_eq!(registry.default_value(&i32_ty()), Value::Int(0));
        assert_eq!(registry.default_value(&TypeDescriptor::scalar(ScalarKind::U16)), Value::UInt(0));
        assert_eq!(registry.default_value(&TypeDescriptor::scalar(ScalarKind::F64)), Value::Float(0.0));
        assert_eq!(
            registry.default_value(&TypeDescriptor::scalar(ScalarKind::Decimal)),
            Value::Decimal(Decimal::ZERO)
        );
        assert_eq!(
            registry.default_value(&TypeDescriptor::scalar(ScalarKind::Uuid)),
            Value::Uuid(Uuid::nil())
        );
        assert_eq!(
            registry.default_value(&TypeDescriptor::enumeration("Status")),
            Value::Enum(EnumValue::new("None", 0))
        );

        for reference_like in [
            TypeDescriptor::scalar(ScalarKind::String),
            TypeDescriptor::record("Point"),
            TypeDescriptor::optional(i32_ty()),
            TypeDescriptor::list(i32_ty()),
            TypeDescriptor::mapping(i32_ty(), i32_ty()),
        ] {
            assert!(registry.default_value(&reference_like).is_null(), "{reference_like}");
        }
    }

    #[test]
    fn test_blank_record_and_validate() {
        let mut registry = registry_with_points();
        let blank = registry.blank_record("Point3").unwrap();
        assert_eq!(blank.get("z"), Some(&Value::Int(0)));
        assert!(registry.validate().is_ok());

        registry
            .register_record(
                RecordDescriptor::builder("Path")
                    .member("points", TypeDescriptor::list(TypeDescriptor::record("Waypoint")))
                    .build(),
            )
            .unwrap();
        assert_eq!(registry.validate(), Err(CoreError::UnknownType("Waypoint".into())));
    }
}
