use crate::error::MappingError;
use core_types::{Record, SequenceKind, TypeDescriptor, TypeRegistry, Value};

/// Creates a fresh record with every member at its default value.
///
/// Fails with `NotConstructible` when the record declares no usable
/// no-argument constructor.
pub(crate) fn instantiate_record(registry: &TypeRegistry, name: &str) -> Result<Record, MappingError> {
    let descriptor = registry.record(name)?;
    if !descriptor.constructible {
        return Err(MappingError::NotConstructible(name.to_string()));
    }
    Ok(registry.blank_record(name)?)
}

/// Allocates the backing storage for a destination sequence.
///
/// Arrays are sized up front to `length` default elements; lists and list
/// interfaces (which have no implementation of their own and are
/// materialized as lists) start empty.
pub(crate) fn allocate_sequence(
    registry: &TypeRegistry,
    element: &TypeDescriptor,
    kind: SequenceKind,
    length: usize,
) -> Vec<Value> {
    match kind {
        SequenceKind::Array => vec![registry.default_value(element); length],
        SequenceKind::List => Vec::with_capacity(length),
        SequenceKind::ListInterface => {
            tracing::trace!(element = %element, "Materializing list interface as a list.");
            Vec::with_capacity(length)
        }
    }
}

/// Constructs a new, empty instance of any type.
pub(crate) fn instantiate(registry: &TypeRegistry, ty: &TypeDescriptor) -> Result<Value, MappingError> {
    match ty {
        TypeDescriptor::Record(name) => instantiate_record(registry, name).map(Value::Record),
        TypeDescriptor::Optional(inner) => instantiate(registry, inner),
        TypeDescriptor::Sequence { element, kind } => {
            Ok(Value::Sequence(allocate_sequence(registry, element, *kind, 0)))
        }
        TypeDescriptor::Mapping { .. } => Ok(Value::Mapping(Vec::new())),
        TypeDescriptor::Scalar(_) | TypeDescriptor::Enum(_) => Ok(registry.default_value(ty)),
    }
}
