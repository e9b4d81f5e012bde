/// Declares a struct as a mappable record.
///
/// The struct must implement `Default`; members missing from a source value
/// keep their default. `extends` names the base record (whose fields the
/// struct should repeat) and `implements` lists capability sets declared
/// with [`mappable_capability!`].
///
/// ```ignore
/// mappable! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Employee extends Person implements [Named] {
///         pub name: String,
///         pub salary: Decimal,
///     }
/// }
/// ```
#[macro_export]
macro_rules! mappable {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident
            $(extends $base:ident)?
            $(implements [$($capability:path),* $(,)?])?
        {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field: $field_ty, )*
        }

        impl $crate::Mappable for $name {
            fn describe() -> $crate::core_types::TypeDescriptor {
                $crate::core_types::TypeDescriptor::record(stringify!($name))
            }

            fn register(
                registry: &mut $crate::core_types::TypeRegistry,
            ) -> ::std::result::Result<(), $crate::core_types::CoreError> {
                if registry.is_known(stringify!($name)) {
                    return Ok(());
                }
                registry.reserve(stringify!($name));
                let register = |registry: &mut $crate::core_types::TypeRegistry|
                 -> ::std::result::Result<(), $crate::core_types::CoreError> {
                    $( <$base as $crate::Mappable>::register(registry)?; )?
                    $($( <$capability as $crate::CapabilitySet>::register(registry)?; )*)?
                    $( <$field_ty as $crate::Mappable>::register(registry)?; )*

                    let builder = $crate::core_types::RecordDescriptor::builder(stringify!($name));
                    $( let builder = builder.extends(stringify!($base)); )?
                    $($( let builder = builder.implements(<$capability as $crate::CapabilitySet>::NAME); )*)?
                    $( let builder = builder.member(stringify!($field), <$field_ty as $crate::Mappable>::describe()); )*
                    registry.register_record(builder.build())?;
                    Ok(())
                };
                // A failed registration must not leave the name claimed.
                let registered = register(registry);
                if registered.is_err() {
                    registry.release(stringify!($name));
                }
                registered
            }

            #[allow(unused_mut)]
            fn to_value(&self) -> $crate::core_types::Value {
                let mut record = $crate::core_types::Record::new(stringify!($name));
                $( record.set(stringify!($field), $crate::Mappable::to_value(&self.$field)); )*
                $crate::core_types::Value::Record(record)
            }

            #[allow(unused_mut, unused_variables)]
            fn from_value(value: &$crate::core_types::Value) -> ::std::result::Result<Self, $crate::MappingError> {
                match value {
                    $crate::core_types::Value::Null => Ok(<Self as ::std::default::Default>::default()),
                    $crate::core_types::Value::Record(record) => {
                        let mut out = <Self as ::std::default::Default>::default();
                        $(
                            if let Some(member) = record.get(stringify!($field)) {
                                out.$field = <$field_ty as $crate::Mappable>::from_value(member)?;
                            }
                        )*
                        Ok(out)
                    }
                    other => Err($crate::MappingError::TypeMismatch {
                        expected: stringify!($name).to_string(),
                        found: other.kind_name().to_string(),
                    }),
                }
            }
        }
    };
}

/// Declares a fieldless enum with explicit discriminants as mappable.
///
/// A null value maps to the variant with discriminant 0, or the first
/// variant when none has it.
#[macro_export]
macro_rules! mappable_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$variant_meta:meta])* $variant:ident = $discriminant:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $( $(#[$variant_meta])* $variant = $discriminant, )+
        }

        impl $crate::Mappable for $name {
            fn describe() -> $crate::core_types::TypeDescriptor {
                $crate::core_types::TypeDescriptor::enumeration(stringify!($name))
            }

            fn register(
                registry: &mut $crate::core_types::TypeRegistry,
            ) -> ::std::result::Result<(), $crate::core_types::CoreError> {
                if registry.is_known(stringify!($name)) {
                    return Ok(());
                }
                registry.register_enum(
                    $crate::core_types::EnumDescriptor::new(stringify!($name))
                        $( .variant(stringify!($variant), $discriminant) )+
                )
            }

            fn to_value(&self) -> $crate::core_types::Value {
                let (variant, discriminant) = match self {
                    $( $name::$variant => (stringify!($variant), $discriminant), )+
                };
                $crate::core_types::Value::Enum($crate::core_types::EnumValue::new(variant, discriminant))
            }

            fn from_value(value: &$crate::core_types::Value) -> ::std::result::Result<Self, $crate::MappingError> {
                let mismatch = || $crate::MappingError::TypeMismatch {
                    expected: stringify!($name).to_string(),
                    found: value.kind_name().to_string(),
                };
                match value {
                    $crate::core_types::Value::Null => {
                        let mut first = None;
                        for (variant, discriminant) in [$( ($name::$variant, { let discriminant: i64 = $discriminant; discriminant }) ),+] {
                            if discriminant == 0 {
                                return Ok(variant);
                            }
                            if first.is_none() {
                                first = Some(variant);
                            }
                        }
                        first.ok_or_else(mismatch)
                    }
                    $crate::core_types::Value::Enum(e) => match e.variant.as_str() {
                        $( stringify!($variant) => Ok($name::$variant), )+
                        _ => Err(mismatch()),
                    },
                    _ => Err(mismatch()),
                }
            }
        }
    };
}

/// Declares a capability set: a named group of typed members that records
/// can list under `implements`.
///
/// ```ignore
/// mappable_capability! {
///     pub struct Named { name: String }
/// }
/// ```
#[macro_export]
macro_rules! mappable_capability {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $member:ident : $member_ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name;

        impl $crate::CapabilitySet for $name {
            const NAME: &'static str = stringify!($name);

            fn register(
                registry: &mut $crate::core_types::TypeRegistry,
            ) -> ::std::result::Result<(), $crate::core_types::CoreError> {
                if registry.is_known(Self::NAME) {
                    return Ok(());
                }
                $( <$member_ty as $crate::Mappable>::register(registry)?; )*
                registry.register_capability(
                    $crate::core_types::Capability::new(Self::NAME)
                        $( .member(stringify!($member), <$member_ty as $crate::Mappable>::describe()) )*
                )
            }
        }
    };
}
