use crate::error::ConfigError;
use core_types::{
    Capability, EnumDescriptor, MemberDescriptor, RecordDescriptor, TypeDescriptor, TypeRegistry,
};
use serde::Deserialize;

/// A file-based description of the types a mapper should know about.
///
/// ```toml
/// [[enums]]
/// name = "Status"
/// variants = [{ name = "Active" }, { name = "Closed", value = 9 }]
///
/// [[records]]
/// name = "Customer"
/// members = [{ name = "id", type = "uuid" }, { name = "status", type = "Status" }]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaDocument {
    pub capabilities: Vec<CapabilitySpec>,
    pub enums: Vec<EnumSpec>,
    pub records: Vec<RecordSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default = "enabled")]
    pub readable: bool,
    #[serde(default = "enabled")]
    pub writable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumSpec {
    pub name: String,
    pub variants: Vec<VariantSpec>,
}

/// A variant without an explicit `value` takes the previous discriminant plus one,
/// starting from zero.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantSpec {
    pub name: String,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordSpec {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default = "enabled")]
    pub constructible: bool,
    #[serde(default)]
    pub members: Vec<MemberSpec>,
}

fn enabled() -> bool {
    true
}

impl From<MemberSpec> for MemberDescriptor {
    fn from(spec: MemberSpec) -> Self {
        MemberDescriptor {
            name: spec.name,
            ty: spec.ty,
            readable: spec.readable,
            writable: spec.writable,
        }
    }
}

impl SchemaDocument {
    /// Registers every declared type, in dependency order, and validates that
    /// all referenced names exist.
    pub fn into_registry(self) -> Result<TypeRegistry, ConfigError> {
        let mut registry = TypeRegistry::new();

        // Enums first, so member types naming them resolve to `Enum`.
        for spec in self.enums {
            let mut descriptor = EnumDescriptor::new(spec.name);
            let mut next = 0i64;
            for variant in spec.variants {
                let discriminant = variant.value.unwrap_or(next);
                descriptor = descriptor.variant(variant.name, discriminant);
                next = discriminant.saturating_add(1);
            }
            registry.register_enum(descriptor)?;
        }

        for spec in self.capabilities {
            let mut capability = Capability::new(spec.name);
            capability.members = spec.members.into_iter().map(MemberDescriptor::from).collect();
            registry.register_capability(capability)?;
        }

        // A record can only be registered once its base is.
        let mut pending = self.records;
        while !pending.is_empty() {
            let (ready, blocked): (Vec<RecordSpec>, Vec<RecordSpec>) =
                pending.into_iter().partition(|spec| match &spec.extends {
                    Some(base) => registry.record(base).is_ok(),
                    None => true,
                });

            if ready.is_empty() {
                let names: Vec<String> = blocked
                    .iter()
                    .map(|spec| format!("{} extends {}", spec.name, spec.extends.as_deref().unwrap_or("?")))
                    .collect();
                return Err(ConfigError::ValidationError(format!(
                    "records with unknown or cyclic bases: {}",
                    names.join(", ")
                )));
            }

            for spec in ready {
                registry.register_record(record_descriptor(spec))?;
            }
            pending = blocked;
        }

        registry.validate()?;
        Ok(registry)
    }
}

fn record_descriptor(spec: RecordSpec) -> RecordDescriptor {
    let mut builder = RecordDescriptor::builder(spec.name);
    if let Some(base) = spec.extends {
        builder = builder.extends(base);
    }
    for capability in spec.implements {
        builder = builder.implements(capability);
    }
    for member in spec.members {
        builder = builder.with_member(member.into());
    }
    if !spec.constructible {
        builder = builder.not_constructible();
    }
    builder.build()
}

/// Parses a single type expression against a registry, so names of enums
/// come back as `Enum`.
pub fn parse_type(registry: &TypeRegistry, expr: &str) -> Result<TypeDescriptor, ConfigError> {
    let parsed: TypeDescriptor = expr.parse()?;
    Ok(registry.resolve(&parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{EnumValue, ScalarKind, Value};

    fn document(toml: &str) -> SchemaDocument {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    const SCHEMA: &str = r#"
        [[enums]]
        name = "Status"
        variants = [{ name = "Active" }, { name = "Suspended" }, { name = "Closed", value = 9 }]

        [[capabilities]]
        name = "Identified"
        members = [{ name = "id", type = "uuid" }]

        [[records]]
        name = "Customer"
        extends = "Party"
        members = [{ name = "status", type = "Status?" }, { name = "orders", type = "list<Order>" }]

        [[records]]
        name = "Party"
        implements = ["Identified"]
        members = [{ name = "id", type = "uuid" }, { name = "name", type = "string" }]

        [[records]]
        name = "Order"
        constructible = false
        members = [{ name = "total", type = "decimal", writable = false }]
    "#;

    #[test]
    fn test_schema_registers_in_dependency_order() {
        let registry = document(SCHEMA).into_registry().unwrap();

        let customer = registry.record("Customer").unwrap();
        assert!(customer.implements("Identified"));
        assert_eq!(customer.members.len(), 4);
        assert_eq!(
            customer.member("status").unwrap().ty,
            TypeDescriptor::optional(TypeDescriptor::enumeration("Status"))
        );

        let order = registry.record("Order").unwrap();
        assert!(!order.constructible);
        assert!(!order.member("total").unwrap().writable);
    }

    #[test]
    fn test_implicit_enum_discriminants() {
        let registry = document(SCHEMA).into_registry().unwrap();
        let status = registry.enumeration("Status").unwrap();
        assert_eq!(status.by_name("Suspended"), Some(("Suspended", 1)));
        assert_eq!(status.by_name("Closed"), Some(("Closed", 9)));
        assert_eq!(
            registry.default_value(&TypeDescriptor::enumeration("Status")),
            Value::Enum(EnumValue::new("Active", 0))
        );
    }

    #[test]
    fn test_cyclic_bases_are_rejected() {
        let doc = document(
            r#"
            [[records]]
            name = "A"
            extends = "B"

            [[records]]
            name = "B"
            extends = "A"
            "#,
        );
        let err = doc.into_registry().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)), "{err}");
    }

    #[test]
    fn test_unknown_member_type_is_rejected() {
        let doc = document(
            r#"
            [[records]]
            name = "A"
            members = [{ name = "b", type = "Missing" }]
            "#,
        );
        assert!(matches!(doc.into_registry(), Err(ConfigError::Schema(_))));
    }

    #[test]
    fn test_schema_from_json() {
        let json = serde_json::json!({
            "records": [{ "name": "Point", "members": [
                { "name": "x", "type": "i32" },
                { "name": "y", "type": "i32" }
            ]}]
        });
        let doc: SchemaDocument = config::Config::builder()
            .add_source(config::File::from_str(&json.to_string(), config::FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let registry = doc.into_registry().unwrap();
        assert_eq!(
            parse_type(&registry, "map<string, Point>").unwrap(),
            TypeDescriptor::mapping(
                TypeDescriptor::scalar(ScalarKind::String),
                TypeDescriptor::record("Point")
            )
        );
    }
}
