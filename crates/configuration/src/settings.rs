use serde::Deserialize;
use std::path::PathBuf;

/// The default recursion limit for a single mapping call.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// The root configuration structure for the whole application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mapper: MapperSettings,
    pub logging: LoggingSettings,
}

/// Parameters that govern a mapping call.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapperSettings {
    /// How deep nested members and elements may recurse before the call fails
    /// with `CycleOrTooDeep`.
    pub max_depth: usize,
    /// When true, a member whose scalar value cannot be converted is set to
    /// its default instead of failing the whole mapping.
    pub lenient_scalars: bool,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            lenient_scalars: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Where and how verbosely the binary logs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            directory: None,
            file_prefix: "shapeshift.log".to_string(),
        }
    }
}
