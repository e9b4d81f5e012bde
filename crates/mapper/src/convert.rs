//! The conversion engine.
//!
//! `parse` builds a fresh destination value, `copy` fills an existing one.
//! Both pick a strategy in priority order (assignable, shared capability,
//! common property, collection element) and recurse through `convert_slot`
//! for every member, element and mapping entry. Each nested `parse` call
//! counts against the configured depth limit.

use crate::construct::{allocate_sequence, instantiate_record};
use crate::error::MappingError;
use crate::scalar::convert_scalar;
use crate::strategy::{ConversionStrategy, MemberPlan, PlanCache};
use configuration::MapperSettings;
use core_types::{Record, TypeDescriptor, TypeRegistry, Value};
use std::sync::Arc;

/// Everything a single mapping call needs, threaded through the recursion.
#[derive(Clone, Copy)]
pub(crate) struct ConversionContext<'a> {
    pub(crate) registry: &'a TypeRegistry,
    plans: &'a PlanCache,
    settings: &'a MapperSettings,
    depth: usize,
}

impl<'a> ConversionContext<'a> {
    pub(crate) fn new(registry: &'a TypeRegistry, plans: &'a PlanCache, settings: &'a MapperSettings) -> Self {
        Self {
            registry,
            plans,
            settings,
            depth: 0,
        }
    }

    /// One level deeper, or `CycleOrTooDeep` once the limit is passed.
    fn nested(&self) -> Result<Self, MappingError> {
        let depth = self.depth + 1;
        if depth > self.settings.max_depth {
            tracing::warn!(max_depth = self.settings.max_depth, "Mapping depth limit reached.");
            return Err(MappingError::CycleOrTooDeep {
                max_depth: self.settings.max_depth,
            });
        }
        Ok(Self { depth, ..*self })
    }

    /// The type to dispatch on: a record's own (possibly more derived) type
    /// when it is registered, otherwise the declared type without its
    /// nullable wrapper.
    fn runtime_type(&self, value: &Value, declared: &TypeDescriptor) -> TypeDescriptor {
        if let Value::Record(record) = value {
            if self.registry.record(record.type_name()).is_ok() {
                return TypeDescriptor::record(record.type_name());
            }
        }
        declared.underlying().clone()
    }

    fn record_plan(&self, source: &str, destination: &str) -> Result<Option<Arc<MemberPlan>>, MappingError> {
        let source = self.registry.record(source)?;
        let destination = self.registry.record(destination)?;
        Ok(self.plans.get_or_build(self.registry, source, destination))
    }

    /// Member-level fallback for a scalar that could not be converted.
    fn scalar_fallback(&self, value: &Value, target: &TypeDescriptor) -> Result<Value, MappingError> {
        if !self.settings.lenient_scalars {
            return Err(MappingError::ScalarConversion {
                value: value.to_json().to_string(),
                target: target.clone(),
            });
        }
        tracing::warn!(
            value = %value.to_json(),
            target = %target,
            "Scalar conversion failed; using the default value."
        );
        Ok(self.registry.default_value(target))
    }
}

/// Builds a new value of `destination` from `value`.
pub(crate) fn parse(
    ctx: &ConversionContext<'_>,
    value: &Value,
    source: &TypeDescriptor,
    destination: &TypeDescriptor,
) -> Result<Value, MappingError> {
    let ctx = ctx.nested()?;
    if value.is_null() {
        return Ok(ctx.registry.default_value(destination));
    }

    let source = ctx.runtime_type(value, source);
    if ctx.registry.is_assignable(&source, destination) {
        return Ok(value.clone());
    }

    match (&source, destination.underlying()) {
        (TypeDescriptor::Record(from), TypeDescriptor::Record(to)) => {
            let source_record = value
                .as_record()
                .ok_or_else(|| MappingError::mismatch(from.clone(), value))?;
            let mut record = instantiate_record(ctx.registry, to)?;
            let plan = ctx
                .record_plan(from, to)?
                .ok_or_else(|| MappingError::no_strategy(&source, destination))?;
            apply_plan(&ctx, &plan, source_record, &mut record)?;
            Ok(Value::Record(record))
        }
        (from, to) if from.is_scalar_like() && to.is_scalar_like() => {
            convert_scalar(ctx.registry, value, destination).ok_or_else(|| MappingError::ScalarConversion {
                value: value.to_json().to_string(),
                target: destination.clone(),
            })
        }
        (from, to) if collection_strategy_applies(from, to) => {
            convert_collection(&ctx, value, &source, destination)
        }
        _ => Err(MappingError::no_strategy(&source, destination)),
    }
}

/// Fills `target` from `value`. Returns false when no strategy applies, in
/// which case `target` is left untouched.
pub(crate) fn copy(
    ctx: &ConversionContext<'_>,
    value: &Value,
    source: &TypeDescriptor,
    target: &mut Value,
    destination: &TypeDescriptor,
) -> Result<bool, MappingError> {
    if value.is_null() {
        tracing::debug!(destination = %destination, "Source is null; nothing to copy.");
        return Ok(false);
    }

    let source = ctx.runtime_type(value, source);
    match (&source, destination.underlying()) {
        (TypeDescriptor::Record(from), TypeDescriptor::Record(to)) => {
            let Some(plan) = ctx.record_plan(from, to)? else {
                tracing::debug!(source = %from, destination = %to, "No conversion strategy applies.");
                return Ok(false);
            };
            let source_record = value
                .as_record()
                .ok_or_else(|| MappingError::mismatch(from.clone(), value))?;
            if target.is_null() {
                *target = Value::Record(instantiate_record(ctx.registry, to)?);
            }
            let found = target.kind_name();
            let target_record = target.as_record_mut().ok_or_else(|| MappingError::TypeMismatch {
                expected: to.clone(),
                found: found.to_string(),
            })?;
            apply_plan(ctx, &plan, source_record, target_record)?;
            Ok(true)
        }
        (from, to) if from.is_scalar_like() && to.is_scalar_like() => {
            *target = convert_slot(ctx, value, &source, destination)?;
            Ok(true)
        }
        (from, to) if collection_strategy_applies(from, to) => {
            *target = convert_collection(ctx, value, &source, destination)?;
            Ok(true)
        }
        _ if ctx.registry.is_assignable(&source, destination) => {
            *target = value.clone();
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Copies every planned member. Absent or null source members leave the
/// destination member as it was.
fn apply_plan(
    ctx: &ConversionContext<'_>,
    plan: &MemberPlan,
    source: &Record,
    destination: &mut Record,
) -> Result<(), MappingError> {
    for pair in &plan.pairs {
        let Some(value) = source.get(&pair.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let converted = convert_slot(ctx, value, &pair.source_type, &pair.destination_type)?;
        destination.set(pair.name.clone(), converted);
    }
    Ok(())
}

/// Converts one member, element or entry slot.
///
/// Assignable values are copied as-is and scalars are converted under the
/// lenient policy. Anything else recurses into `parse`.
fn convert_slot(
    ctx: &ConversionContext<'_>,
    value: &Value,
    source: &TypeDescriptor,
    destination: &TypeDescriptor,
) -> Result<Value, MappingError> {
    if value.is_null() {
        return Ok(ctx.registry.default_value(destination));
    }
    let runtime = ctx.runtime_type(value, source);
    if ctx.registry.is_assignable(&runtime, destination) {
        return Ok(value.clone());
    }
    if runtime.is_scalar_like() && destination.is_scalar_like() {
        return match convert_scalar(ctx.registry, value, destination) {
            Some(converted) => Ok(converted),
            None => ctx.scalar_fallback(value, destination),
        };
    }
    parse(ctx, value, &runtime, destination)
}

/// Whether element-wise conversion can take `source` to `destination`.
///
/// Sequences convert to sequences and mappings to mappings. A mapping also
/// converts to a sequence of records (each entry becomes one record with
/// `key` and `value` members) and back.
pub(crate) fn collection_strategy_applies(source: &TypeDescriptor, destination: &TypeDescriptor) -> bool {
    match (source.underlying(), destination.underlying()) {
        (TypeDescriptor::Sequence { .. }, TypeDescriptor::Sequence { .. }) => true,
        (TypeDescriptor::Mapping { .. }, TypeDescriptor::Mapping { .. }) => true,
        (TypeDescriptor::Mapping { .. }, TypeDescriptor::Sequence { element, .. })
        | (TypeDescriptor::Sequence { element, .. }, TypeDescriptor::Mapping { .. }) => {
            matches!(element.underlying(), TypeDescriptor::Record(_))
        }
        _ => false,
    }
}

fn convert_collection(
    ctx: &ConversionContext<'_>,
    value: &Value,
    source: &TypeDescriptor,
    destination: &TypeDescriptor,
) -> Result<Value, MappingError> {
    let no_strategy = || MappingError::no_strategy(source, destination);

    match (value, source, destination.underlying()) {
        (
            Value::Sequence(items),
            TypeDescriptor::Sequence { element: from, .. },
            TypeDescriptor::Sequence { element: to, kind },
        ) => {
            let mut converted = allocate_sequence(ctx.registry, to, *kind, items.len());
            for (index, item) in items.iter().enumerate() {
                let element = convert_slot(ctx, item, from, to)?;
                match converted.get_mut(index) {
                    Some(slot) => *slot = element,
                    None => converted.push(element),
                }
            }
            Ok(Value::Sequence(converted))
        }
        (
            Value::Mapping(entries),
            TypeDescriptor::Mapping {
                key: from_key,
                value: from_value,
            },
            TypeDescriptor::Mapping { key: to_key, value: to_value },
        ) => {
            let mut converted: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
            for (key, entry) in entries {
                let slots = [(key, from_key.as_ref()), (entry, from_value.as_ref())];
                let new_key = project_slot(ctx, slots, to_key)?;
                let new_value = project_slot(ctx, [slots[1], slots[0]], to_value)?;
                insert_entry(&mut converted, new_key, new_value);
            }
            Ok(Value::Mapping(converted))
        }
        (
            Value::Mapping(entries),
            TypeDescriptor::Mapping {
                key: from_key,
                value: from_value,
            },
            TypeDescriptor::Sequence { element, kind },
        ) => {
            let record_name = element.underlying().record_name().ok_or_else(no_strategy)?;
            let descriptor = ctx.registry.record(record_name)?;
            let mut converted = allocate_sequence(ctx.registry, element, *kind, entries.len());
            for (index, (key, entry)) in entries.iter().enumerate() {
                let mut record = instantiate_record(ctx.registry, record_name)?;
                for (slot, slot_value, slot_type) in [("key", key, from_key), ("value", entry, from_value)] {
                    if let Some(member) = descriptor.writable_member(slot) {
                        if !slot_value.is_null() {
                            record.set(slot, convert_slot(ctx, slot_value, slot_type, &member.ty)?);
                        }
                    }
                }
                match converted.get_mut(index) {
                    Some(existing) => *existing = Value::Record(record),
                    None => converted.push(Value::Record(record)),
                }
            }
            Ok(Value::Sequence(converted))
        }
        (
            Value::Sequence(items),
            TypeDescriptor::Sequence { element, .. },
            TypeDescriptor::Mapping { key: to_key, value: to_value },
        ) => {
            let mut converted: Vec<(Value, Value)> = Vec::with_capacity(items.len());
            for item in items.iter().filter(|item| !item.is_null()) {
                let runtime = ctx.runtime_type(item, element);
                let record_name = runtime.record_name().ok_or_else(no_strategy)?;
                let descriptor = ctx.registry.record(record_name)?;
                let record = item
                    .as_record()
                    .ok_or_else(|| MappingError::mismatch(record_name, item))?;
                let key_member = descriptor.readable_member("key").ok_or_else(no_strategy)?;
                let key = match record.get("key") {
                    Some(key) => convert_slot(ctx, key, &key_member.ty, to_key)?,
                    None => ctx.registry.default_value(to_key),
                };
                let value = match (descriptor.readable_member("value"), record.get("value")) {
                    (Some(member), Some(value)) => convert_slot(ctx, value, &member.ty, to_value)?,
                    _ => ctx.registry.default_value(to_value),
                };
                insert_entry(&mut converted, key, value);
            }
            Ok(Value::Mapping(converted))
        }
        _ => Err(no_strategy()),
    }
}

/// Fills one destination entry slot from the source entry.
///
/// `candidates` lists the same-named source slot first and the other slot
/// second. The same-named slot is used when some strategy converts it to
/// the target. Otherwise the other slot is used only when it is assignable
/// to the target, and failing that the slot is left at its default.
fn project_slot(
    ctx: &ConversionContext<'_>,
    candidates: [(&Value, &TypeDescriptor); 2],
    target: &TypeDescriptor,
) -> Result<Value, MappingError> {
    let [(value, declared), (other, other_declared)] = candidates;

    let runtime = ctx.runtime_type(value, declared);
    if (runtime.is_scalar_like() && target.is_scalar_like()) || select(ctx, &runtime, target).is_ok() {
        return convert_slot(ctx, value, declared, target);
    }
    let other_runtime = ctx.runtime_type(other, other_declared);
    if ctx.registry.is_assignable(&other_runtime, target) {
        return convert_slot(ctx, other, other_declared, target);
    }
    Ok(ctx.registry.default_value(target))
}

/// Mapping insert: a later entry with an equal key replaces the earlier one.
fn insert_entry(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

/// The strategy `parse` would use for a pair of types, with the member
/// table when both are records.
pub(crate) fn select(
    ctx: &ConversionContext<'_>,
    source: &TypeDescriptor,
    destination: &TypeDescriptor,
) -> Result<MemberPlan, MappingError> {
    let source = ctx.registry.resolve(source);
    let destination = ctx.registry.resolve(destination);
    if let (TypeDescriptor::Record(from), TypeDescriptor::Record(to)) = (source.underlying(), destination.underlying()) {
        return ctx
            .record_plan(from, to)?
            .map(|plan| plan.as_ref().clone())
            .ok_or_else(|| MappingError::no_strategy(&source, &destination));
    }
    let strategy = if ctx.registry.is_assignable(&source, &destination) {
        ConversionStrategy::AssignableCopy
    } else if collection_strategy_applies(&source, &destination) {
        ConversionStrategy::CollectionElementCopy
    } else {
        return Err(MappingError::no_strategy(&source, &destination));
    };
    Ok(MemberPlan {
        strategy,
        pairs: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{EnumDescriptor, RecordDescriptor, ScalarKind};

    fn scalar(kind: ScalarKind) -> TypeDescriptor {
        TypeDescriptor::scalar(kind)
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register_enum(EnumDescriptor::new("Mode").variant("Off", 0).variant("On", 1))
            .unwrap();
        registry
            .register_record(
                RecordDescriptor::builder("Point")
                    .member("x", scalar(ScalarKind::I32))
                    .member("y", scalar(ScalarKind::I32))
                    .build(),
            )
            .unwrap();
        registry
            .register_record(
                RecordDescriptor::builder("Reading")
                    .member("x", scalar(ScalarKind::String))
                    .member("y", scalar(ScalarKind::F64))
                    .member("mode", TypeDescriptor::enumeration("Mode"))
                    .build(),
            )
            .unwrap();
        registry
            .register_record(
                RecordDescriptor::builder("Entry")
                    .member("key", scalar(ScalarKind::String))
                    .member("value", scalar(ScalarKind::I64))
                    .build(),
            )
            .unwrap();
        registry
    }

    fn run<T>(registry: &TypeRegistry, settings: MapperSettings, f: impl FnOnce(&ConversionContext<'_>) -> T) -> T {
        let plans = PlanCache::default();
        let ctx = ConversionContext::new(registry, &plans, &settings);
        f(&ctx)
    }

    fn reading(x: &str, y: f64) -> Value {
        Value::Record(Record::new("Reading").with("x", x).with("y", Value::Float(y)))
    }

    #[test]
    fn test_members_convert_and_fall_back_leniently() {
        let registry = registry();
        let point = run(&registry, MapperSettings::default(), |ctx| {
            parse(ctx, &reading("abc", 2.5), &TypeDescriptor::record("Reading"), &TypeDescriptor::record("Point"))
        })
        .unwrap();
        let point = point.as_record().unwrap();
        assert_eq!(point.get("x"), Some(&Value::Int(0)));
        assert_eq!(point.get("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_strict_scalars_raise() {
        let registry = registry();
        let settings = MapperSettings {
            lenient_scalars: false,
            ..MapperSettings::default()
        };
        let err = run(&registry, settings, |ctx| {
            parse(ctx, &reading("abc", 2.5), &TypeDescriptor::record("Reading"), &TypeDescriptor::record("Point"))
        })
        .unwrap_err();
        assert!(matches!(err, MappingError::ScalarConversion { .. }));
    }

    #[test]
    fn test_copy_skips_null_members() {
        let registry = registry();
        let source = Value::Record(Record::new("Reading").with("y", Value::Float(7.0)).with("x", Value::Null));
        let mut target = Value::Record(Record::new("Point").with("x", Value::Int(9)).with("y", Value::Int(0)));
        let applied = run(&registry, MapperSettings::default(), |ctx| {
            copy(ctx, &source, &TypeDescriptor::record("Reading"), &mut target, &TypeDescriptor::record("Point"))
        })
        .unwrap();
        assert!(applied);
        let target = target.as_record().unwrap();
        assert_eq!(target.get("x"), Some(&Value::Int(9)));
        assert_eq!(target.get("y"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_mapping_to_sequence_of_entries_and_back() {
        let registry = registry();
        let source = Value::Mapping(vec![
            (Value::from("a"), Value::Int(1)),
            (Value::from("b"), Value::Int(2)),
        ]);
        let source_ty = TypeDescriptor::mapping(scalar(ScalarKind::String), scalar(ScalarKind::I32));
        let entries_ty = TypeDescriptor::list(TypeDescriptor::record("Entry"));

        let entries = run(&registry, MapperSettings::default(), |ctx| {
            parse(ctx, &source, &source_ty, &entries_ty)
        })
        .unwrap();
        let items = entries.as_sequence().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_record().unwrap().get("key"), Some(&Value::from("b")));
        assert_eq!(items[1].as_record().unwrap().get("value"), Some(&Value::Int(2)));

        let back = run(&registry, MapperSettings::default(), |ctx| {
            parse(ctx, &entries, &entries_ty, &source_ty)
        })
        .unwrap();
        assert_eq!(back, source);
    }

    #[test]
    fn test_null_entries_are_skipped() {
        let registry = registry();
        let entries = Value::Sequence(vec![
            Value::Null,
            Value::Record(Record::new("Entry").with("key", "a").with("value", Value::Int(3))),
        ]);
        let converted = run(&registry, MapperSettings::default(), |ctx| {
            parse(
                ctx,
                &entries,
                &TypeDescriptor::list(TypeDescriptor::record("Entry")),
                &TypeDescriptor::mapping(scalar(ScalarKind::String), scalar(ScalarKind::I64)),
            )
        })
        .unwrap();
        assert_eq!(converted, Value::Mapping(vec![(Value::from("a"), Value::Int(3))]));
    }

    #[test]
    fn test_value_slot_ignores_unassignable_keys() {
        let registry = registry();
        let point = |x: i64| Value::Record(Record::new("Point").with("x", Value::Int(x)).with("y", Value::Int(0)));
        let source = Value::Mapping(vec![(Value::from("1"), point(1)), (Value::from("2"), point(2))]);
        let converted = run(&registry, MapperSettings::default(), |ctx| {
            parse(
                ctx,
                &source,
                &TypeDescriptor::mapping(scalar(ScalarKind::String), TypeDescriptor::record("Point")),
                &TypeDescriptor::mapping(TypeDescriptor::record("Point"), scalar(ScalarKind::I32)),
            )
        })
        .unwrap();
        assert_eq!(
            converted,
            Value::Mapping(vec![(point(1), Value::Int(0)), (point(2), Value::Int(0))])
        );
    }

    #[test]
    fn test_equal_keys_collapse() {
        let registry = registry();
        let source = Value::Mapping(vec![
            (Value::from("1"), Value::Int(10)),
            (Value::from("01"), Value::Int(20)),
        ]);
        let converted = run(&registry, MapperSettings::default(), |ctx| {
            parse(
                ctx,
                &source,
                &TypeDescriptor::mapping(scalar(ScalarKind::String), scalar(ScalarKind::I32)),
                &TypeDescriptor::mapping(scalar(ScalarKind::I32), scalar(ScalarKind::I32)),
            )
        })
        .unwrap();
        assert_eq!(converted, Value::Mapping(vec![(Value::Int(1), Value::Int(20))]));
    }

    #[test]
    fn test_select_reports_strategies() {
        let registry = registry();
        let list_i32 = TypeDescriptor::list(scalar(ScalarKind::I32));
        run(&registry, MapperSettings::default(), |ctx| {
            assert_eq!(
                select(ctx, &list_i32, &TypeDescriptor::array(scalar(ScalarKind::I64)))
                    .unwrap()
                    .strategy,
                ConversionStrategy::CollectionElementCopy
            );
            assert_eq!(
                select(ctx, &list_i32, &TypeDescriptor::list_interface(scalar(ScalarKind::I32)))
                    .unwrap()
                    .strategy,
                ConversionStrategy::AssignableCopy
            );
            let plan = select(ctx, &TypeDescriptor::record("Reading"), &TypeDescriptor::record("Point")).unwrap();
            assert_eq!(plan.strategy, ConversionStrategy::CommonPropertyCopy);
            assert_eq!(plan.pairs.len(), 2);
            assert!(select(ctx, &TypeDescriptor::record("Point"), &list_i32).is_err());
        });
    }

    #[test]
    fn test_scalar_enum_member() {
        let registry = registry();
        let source = Value::Record(Record::new("Point").with("x", Value::Int(1)));
        let mut target = registry.blank_record("Reading").map(Value::Record).unwrap();
        run(&registry, MapperSettings::default(), |ctx| {
            copy(ctx, &source, &TypeDescriptor::record("Point"), &mut target, &TypeDescriptor::record("Reading"))
        })
        .unwrap();
        let target = target.as_record().unwrap();
        assert_eq!(target.get("x"), Some(&Value::from("1")));
        // Point has no `mode`, so it keeps its default.
        assert_eq!(target.get("mode"), Some(&Value::Enum(core_types::EnumValue::new("Off", 0))));
    }
}
