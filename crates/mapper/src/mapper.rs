use crate::construct::instantiate;
use crate::convert::{self, ConversionContext};
use crate::error::MappingError;
use crate::strategy::{MemberPlan, PlanCache};
use crate::typed::Mappable;
use configuration::MapperSettings;
use core_types::{TypeDescriptor, TypeRegistry, Value};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// The entry point for all mapping operations.
///
/// A `Mapper` owns the registry of known types and the memoized member
/// plans. Both only ever grow, so a single instance can be shared between
/// threads and used concurrently; each call keeps its own traversal state.
#[derive(Debug, Default)]
pub struct Mapper {
    registry: RwLock<TypeRegistry>,
    plans: PlanCache,
    settings: MapperSettings,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapper over an already populated registry, such as one
    /// loaded from a schema document.
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            registry: RwLock::new(registry),
            ..Self::default()
        }
    }

    pub fn with_settings(mut self, settings: MapperSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &MapperSettings {
        &self.settings
    }

    /// Read access to the registered types.
    pub fn registry(&self) -> RwLockReadGuard<'_, TypeRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `T` and every named type it refers to. Registering a type
    /// twice is a no-op.
    pub fn register<T: Mappable>(&self) -> Result<(), MappingError> {
        if self.registry().knows(&T::describe()) {
            return Ok(());
        }
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        T::register(&mut registry)?;
        tracing::debug!(ty = %T::describe(), "Registered mappable type.");
        Ok(())
    }

    /// The zero-equivalent value of a type: `false`, `0`, `0.0` or the zero
    /// enum variant for value-like types, `Null` for everything else.
    pub fn default_value(&self, ty: &TypeDescriptor) -> Value {
        let registry = self.registry();
        registry.default_value(&registry.resolve(ty))
    }

    /// Creates a new instance of `ty` with every member at its default.
    pub fn construct(&self, ty: &TypeDescriptor) -> Result<Value, MappingError> {
        let registry = self.registry();
        instantiate(&registry, &registry.resolve(ty))
    }

    /// Populates `destination` from `source`.
    ///
    /// Returns `Ok(false)` when the two types share nothing copyable; the
    /// destination is then left untouched. Errors raised while converting
    /// nested members still propagate.
    pub fn copy_value(
        &self,
        source: &Value,
        source_type: &TypeDescriptor,
        destination: &mut Value,
        destination_type: &TypeDescriptor,
    ) -> Result<bool, MappingError> {
        let registry = self.registry();
        let source_type = registry.resolve(source_type);
        let destination_type = registry.resolve(destination_type);
        let ctx = ConversionContext::new(&registry, &self.plans, &self.settings);
        let applied = convert::copy(&ctx, source, &source_type, destination, &destination_type)?;
        tracing::debug!(source = %source_type, destination = %destination_type, applied, "Copy finished.");
        Ok(applied)
    }

    /// Builds a new value of `destination_type` from `source`.
    ///
    /// Fails with `NoApplicableStrategy` when the shapes share nothing and
    /// with `NotConstructible` when a required record cannot be created.
    pub fn parse_value(
        &self,
        source: &Value,
        source_type: &TypeDescriptor,
        destination_type: &TypeDescriptor,
    ) -> Result<Value, MappingError> {
        let registry = self.registry();
        let source_type = registry.resolve(source_type);
        let destination_type = registry.resolve(destination_type);
        let ctx = ConversionContext::new(&registry, &self.plans, &self.settings);
        convert::parse(&ctx, source, &source_type, &destination_type)
    }

    /// Parses every element of `sources` into `destination_type`.
    pub fn parse_list_value(
        &self,
        sources: &[Value],
        source_type: &TypeDescriptor,
        destination_type: &TypeDescriptor,
    ) -> Result<Vec<Value>, MappingError> {
        let registry = self.registry();
        let source_type = registry.resolve(source_type);
        let destination_type = registry.resolve(destination_type);
        let ctx = ConversionContext::new(&registry, &self.plans, &self.settings);
        sources
            .iter()
            .map(|source| convert::parse(&ctx, source, &source_type, &destination_type))
            .collect()
    }

    /// The strategy a conversion between the two types would use, with the
    /// matched members when both are records. Scalar pairs that are not
    /// assignable are converted value by value and have no plan.
    pub fn plan(&self, source_type: &TypeDescriptor, destination_type: &TypeDescriptor) -> Result<MemberPlan, MappingError> {
        let registry = self.registry();
        let ctx = ConversionContext::new(&registry, &self.plans, &self.settings);
        convert::select(&ctx, source_type, destination_type)
    }

    /// Typed `copy_value`; both types are registered on first use.
    pub fn copy<S: Mappable, D: Mappable>(&self, source: &S, destination: &mut D) -> Result<bool, MappingError> {
        self.register::<S>()?;
        self.register::<D>()?;
        let mut target = destination.to_value();
        let applied = self.copy_value(&source.to_value(), &S::describe(), &mut target, &D::describe())?;
        if applied {
            *destination = D::from_value(&target)?;
        }
        Ok(applied)
    }

    /// Typed `parse_value`.
    pub fn parse<S: Mappable, D: Mappable>(&self, source: &S) -> Result<D, MappingError> {
        self.register::<S>()?;
        self.register::<D>()?;
        let value = self.parse_value(&source.to_value(), &S::describe(), &D::describe())?;
        D::from_value(&value)
    }

    /// Typed `parse_list_value`.
    pub fn parse_list<S: Mappable, D: Mappable>(&self, sources: &[S]) -> Result<Vec<D>, MappingError> {
        self.register::<S>()?;
        self.register::<D>()?;
        let values: Vec<Value> = sources.iter().map(Mappable::to_value).collect();
        self.parse_list_value(&values, &S::describe(), &D::describe())?
            .iter()
            .map(D::from_value)
            .collect()
    }

    /// Number of (source, destination) record pairs with a memoized plan.
    pub fn cached_plans(&self) -> usize {
        self.plans.len()
    }
}
