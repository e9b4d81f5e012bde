use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Record '{record}' does not satisfy capability '{capability}': {reason}")]
    CapabilityNotSatisfied {
        record: String,
        capability: String,
        reason: String,
    },

    #[error("Invalid type expression '{expr}': {reason}")]
    InvalidTypeExpression { expr: String, reason: String },

    #[error("Invalid value for type {ty}: {reason}")]
    InvalidValue { ty: String, reason: String },

    #[error("Enum '{0}' declares no variants")]
    EmptyEnum(String),
}
