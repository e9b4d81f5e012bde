//! # Shapeshift Mapper Crate
//!
//! This crate converts a value of one shape into a value of another by
//! matching members structurally. It works on the dynamic model from
//! `core-types`, and on plain Rust types through the `Mappable` trait.
//!
//! ## Architectural Principles
//!
//! - **Strategy Priority:** A conversion is assignable if it can be, then a copy
//!   of a shared capability's members, then a copy of same-named members, then
//!   an element-wise collection conversion. The first that applies wins.
//! - **Lenient Members:** A member scalar that cannot be represented in the
//!   destination falls back to the destination's default instead of aborting
//!   the whole call (configurable through `MapperSettings`).
//! - **Memoized Plans:** Member-matching tables are built once per
//!   (source record, destination record) pair and reused.
//! - **Bounded Recursion:** Nested conversions count against a depth limit and
//!   fail with `CycleOrTooDeep` instead of overflowing the stack.
//!
//! ## Public API
//!
//! - `Mapper`: The main entry point (`copy`, `parse`, `parse_list` and their `_value` forms).
//! - `Mappable` / `CapabilitySet`: Implemented for Rust types, usually through
//!   `mappable!`, `mappable_enum!` and `mappable_capability!`.
//! - `ConversionStrategy` / `MemberPlan`: What a conversion between two types would do.
//! - `MappingError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
mod construct;
mod convert;
pub mod error;
mod macros;
pub mod mapper;
mod scalar;
pub mod strategy;
pub mod typed;

// Re-export the core types to provide a clean public API.
pub use configuration::MapperSettings;
pub use core_types;
pub use error::{MappingError, MappingErrorKind};
pub use mapper::Mapper;
pub use strategy::{ConversionStrategy, MemberPair, MemberPlan};
pub use typed::{CapabilitySet, Mappable};
