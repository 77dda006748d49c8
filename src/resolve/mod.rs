//! # Token and value resolution
//!
//! `types` classifies phrase tokens against the graph's type system;
//! `coerce` infers the literal type of raw attribute values.

pub mod coerce;
pub mod types;

pub use coerce::coerce;
pub use types::{Classification, ElementClass, TypeResolver};
