//! # Knowledge Graph Model
//!
//! Clean DTOs for the typed knowledge graph the interpreter reasons over.
//! These types cross every boundary: store ↔ query ↔ resolvers ↔ report.
//!
//! Design rule: this module is pure data: no I/O, no state, no async.

pub mod value;
pub mod concept;
pub mod row;

pub use value::{Value, ValueType};
pub use concept::{AttributeValue, Concept, DeclaredType, Iid, RoleLabel, Thing, TypeKind};
pub use row::{ConceptRow, FromConcept};
