//! ConceptRow: one answer of a match query.

use hashbrown::HashMap;
use serde::Serialize;

use super::{AttributeValue, Concept, RoleLabel, Thing, Value};
use crate::{Error, Result};

/// Variable name (without `$`) → bound concept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConceptRow {
    pub values: HashMap<String, Concept>,
}

impl ConceptRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, var: impl Into<String>, concept: Concept) {
        self.values.insert(var.into(), concept);
    }

    /// Get the raw concept bound to `var`.
    pub fn concept(&self, var: &str) -> Result<&Concept> {
        self.values.get(var)
            .ok_or_else(|| Error::NotFound(format!("Variable '${var}'")))
    }

    /// Get a typed value from the row.
    pub fn get<T: FromConcept>(&self, var: &str) -> Result<T> {
        T::from_concept(self.concept(var)?)
    }

    /// Label of whatever `var` is bound to (instance type, type or role name).
    pub fn label(&self, var: &str) -> Result<String> {
        Ok(self.concept(var)?.type_label())
    }

    /// Attribute value bound to `var`, without literal quoting.
    pub fn plain_value(&self, var: &str) -> Result<String> {
        Ok(self.get::<AttributeValue>(var)?.value.to_plain())
    }
}

/// Convert from a bound concept to concrete types.
pub trait FromConcept: Sized {
    fn from_concept(concept: &Concept) -> Result<Self>;
}

fn type_error(expected: &str, got: &Concept) -> Error {
    Error::TypeError {
        expected: expected.into(),
        got: got.kind_name().into(),
    }
}

impl FromConcept for Thing {
    fn from_concept(concept: &Concept) -> Result<Self> {
        match concept {
            Concept::Entity(t) | Concept::Relation(t) => Ok(t.clone()),
            other => Err(type_error("Thing", other)),
        }
    }
}

impl FromConcept for AttributeValue {
    fn from_concept(concept: &Concept) -> Result<Self> {
        match concept {
            Concept::Attribute(a) => Ok(a.clone()),
            other => Err(type_error("Attribute", other)),
        }
    }
}

impl FromConcept for RoleLabel {
    fn from_concept(concept: &Concept) -> Result<Self> {
        match concept {
            Concept::Role(r) => Ok(r.clone()),
            other => Err(type_error("Role", other)),
        }
    }
}

impl FromConcept for Value {
    fn from_concept(concept: &Concept) -> Result<Self> {
        match concept {
            Concept::Attribute(a) => Ok(a.value.clone()),
            other => Err(type_error("Value", other)),
        }
    }
}
