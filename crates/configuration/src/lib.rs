use crate::error::ConfigError;
use core_types::TypeRegistry;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod schema;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use schema::{parse_type, SchemaDocument};
pub use settings::{LogLevel, LoggingSettings, MapperSettings, Settings, DEFAULT_MAX_DEPTH};

/// Loads the application settings.
///
/// Reads the given file, or an optional `shapeshift.toml` in the working
/// directory when no path is given, then applies `SHAPESHIFT__SECTION__KEY`
/// environment overrides (e.g. `SHAPESHIFT__MAPPER__MAX_DEPTH=64`).
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path),
        None => config::File::with_name("shapeshift").required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("SHAPESHIFT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    validate(&settings)?;
    Ok(settings)
}

/// Loads a schema document (TOML or JSON, by extension) and registers its types.
pub fn load_schema(path: &Path) -> Result<TypeRegistry, ConfigError> {
    let document = config::Config::builder()
        .add_source(config::File::from(path))
        .build()?
        .try_deserialize::<SchemaDocument>()?;

    tracing::debug!(
        path = %path.display(),
        records = document.records.len(),
        enums = document.enums.len(),
        capabilities = document.capabilities.len(),
        "Loaded schema document."
    );
    document.into_registry()
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.mapper.max_depth == 0 {
        return Err(ConfigError::ValidationError(
            "mapper.max_depth must be greater than 0".to_string(),
        ));
    }
    if settings.logging.file_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "logging.file_prefix must not be empty".to_string(),
        ));
    }
    Ok(())
}
