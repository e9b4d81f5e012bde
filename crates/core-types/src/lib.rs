//! # Shapeshift Core Types
//!
//! This crate holds the reflective data model the object mapper works on:
//! descriptions of types and their members, dynamic values, and the registry
//! that ties named types together.
//!
//! ## Architectural Principles
//!
//! - **Layer 0 Model:** No mapping logic lives here. The crate only describes
//!   shapes (`TypeDescriptor`, `RecordDescriptor`, `Capability`) and instances (`Value`).
//! - **Explicit Reflection:** Members are declared up front and registered once,
//!   instead of being discovered through runtime introspection.
//!
//! ## Public API
//!
//! - `TypeDescriptor`: The shape of a value, readable from type expressions like `list<Point>`.
//! - `TypeRegistry`: Registered records, enums and capabilities; answers assignability
//!   and default-value questions.
//! - `Value` / `Record`: Dynamic instances.
//! - `CoreError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod descriptors;
pub mod enums;
pub mod error;
pub mod json;
pub mod registry;
pub mod type_expr;
pub mod value;

// Re-export the core types to provide a clean public API.
pub use descriptors::{
    Capability, EnumDescriptor, MemberDescriptor, RecordBuilder, RecordDescriptor, TypeDescriptor,
};
pub use enums::{ScalarKind, SequenceKind};
pub use error::CoreError;
pub use json::TYPE_TAG;
pub use registry::TypeRegistry;
pub use value::{EnumValue, Record, Value};
