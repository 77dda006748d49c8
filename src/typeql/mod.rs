//! # TypeQL match queries
//!
//! A typed clause AST (`ast`) plus a fluent builder (`builder`). Queries are
//! values: stores evaluate them directly or render them with `Display`.

pub mod ast;
pub mod builder;

pub use ast::{HasConstraint, HasValue, MatchQuery, Pattern, RolePlayer, RoleRef, TypeRef, Var};
pub use builder::{MatchBuilder, ThingScope};

/// Label of the root of the whole type hierarchy.
pub const ROOT_THING: &str = "thing";
