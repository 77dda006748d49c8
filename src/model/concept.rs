//! Concepts: the things, types and roles a match query can bind.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Value;

/// Opaque instance identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Iid(pub u64);

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// The three concrete branches of the type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Entity,
    Attribute,
    Relation,
}

impl TypeKind {
    /// Label of the root type of this branch.
    pub fn root_label(self) -> &'static str {
        match self {
            TypeKind::Entity => "entity",
            TypeKind::Attribute => "attribute",
            TypeKind::Relation => "relation",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_label())
    }
}

/// A type declared in the schema, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclaredType {
    pub label: String,
    pub kind: TypeKind,
    /// Direct supertype; `None` only for the roots.
    pub supertype: Option<String>,
}

/// A scoped role label, e.g. `positioning:positioned`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleLabel {
    pub scope: String,
    pub name: String,
}

impl RoleLabel {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self { scope: scope.into(), name: name.into() }
    }

    /// The root role every role specializes: `relation:role`.
    pub fn root() -> Self {
        Self::new("relation", "role")
    }

    pub fn is_root(&self) -> bool {
        self.scope == "relation" && self.name == "role"
    }
}

impl fmt::Display for RoleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

/// An entity or relation instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Thing {
    pub iid: Iid,
    pub type_label: String,
}

/// An attribute instance: a typed value, unique per (type, value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub iid: Iid,
    pub type_label: String,
    pub value: Value,
}

/// Anything a query variable can be bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "concept", rename_all = "lowercase")]
pub enum Concept {
    Entity(Thing),
    Relation(Thing),
    Attribute(AttributeValue),
    Type(DeclaredType),
    Role(RoleLabel),
}

impl Concept {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Concept::Entity(_) => "entity",
            Concept::Relation(_) => "relation",
            Concept::Attribute(_) => "attribute",
            Concept::Type(_) => "type",
            Concept::Role(_) => "role",
        }
    }

    /// Instance identifier, for entities, relations and attributes.
    pub fn iid(&self) -> Option<Iid> {
        match self {
            Concept::Entity(t) | Concept::Relation(t) => Some(t.iid),
            Concept::Attribute(a) => Some(a.iid),
            Concept::Type(_) | Concept::Role(_) => None,
        }
    }

    /// Label of the concept's type (or of the type/role itself).
    pub fn type_label(&self) -> String {
        match self {
            Concept::Entity(t) | Concept::Relation(t) => t.type_label.clone(),
            Concept::Attribute(a) => a.type_label.clone(),
            Concept::Type(t) => t.label.clone(),
            Concept::Role(r) => r.name.clone(),
        }
    }

    /// Binding identity: two concepts denote the same graph element.
    pub fn same_as(&self, other: &Concept) -> bool {
        match (self, other) {
            (Concept::Type(a), Concept::Type(b)) => a.label == b.label,
            (Concept::Role(a), Concept::Role(b)) => a == b,
            _ => matches!((self.iid(), other.iid()), (Some(a), Some(b)) if a == b),
        }
    }
}
