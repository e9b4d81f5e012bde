use core_types::{CoreError, TypeDescriptor};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Type '{0}' has no usable no-argument constructor")]
    NotConstructible(String),

    #[error("No conversion strategy applies from {source_type} to {destination_type}")]
    NoApplicableStrategy {
        source_type: TypeDescriptor,
        destination_type: TypeDescriptor,
    },

    #[error("Mapping exceeded the maximum depth of {max_depth}; the object graph is cyclic or too deep")]
    CycleOrTooDeep { max_depth: usize },

    #[error("Cannot convert {value} to {target}")]
    ScalarConversion { value: String, target: TypeDescriptor },

    #[error("Expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Type registry error: {0}")]
    Registry(#[from] CoreError),
}

/// The category of a `MappingError`, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingErrorKind {
    NotConstructible,
    NoApplicableStrategy,
    CycleOrTooDeep,
    ScalarConversion,
    TypeMismatch,
    Registry,
}

impl MappingError {
    pub fn kind(&self) -> MappingErrorKind {
        match self {
            MappingError::NotConstructible(_) => MappingErrorKind::NotConstructible,
            MappingError::NoApplicableStrategy { .. } => MappingErrorKind::NoApplicableStrategy,
            MappingError::CycleOrTooDeep { .. } => MappingErrorKind::CycleOrTooDeep,
            MappingError::ScalarConversion { .. } => MappingErrorKind::ScalarConversion,
            MappingError::TypeMismatch { .. } => MappingErrorKind::TypeMismatch,
            MappingError::Registry(_) => MappingErrorKind::Registry,
        }
    }

    pub(crate) fn no_strategy(source: &TypeDescriptor, destination: &TypeDescriptor) -> Self {
        MappingError::NoApplicableStrategy {
            source_type: source.clone(),
            destination_type: destination.clone(),
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: &core_types::Value) -> Self {
        MappingError::TypeMismatch {
            expected: expected.into(),
            found: found.kind_name().to_string(),
        }
    }
}
