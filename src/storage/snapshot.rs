//! JSON snapshot of a knowledge graph: schema, things and relations.
//!
//! ```json
//! {
//!   "schema": {
//!     "entities":   [{ "label": "valve", "sub": "mechanism" }],
//!     "attributes": [{ "label": "tag-number", "value_type": "string" }],
//!     "relations":  [{ "label": "positioning", "relates": ["positioned", "position"] }]
//!   },
//!   "things":    [{ "id": "v1", "isa": "valve", "has": { "tag-number": "V-1" } }],
//!   "relations": [{ "isa": "positioning", "players": [["positioned", "v1"], ["position", "e1"]] }]
//! }
//! ```
//!
//! Types must be declared after their supertypes. Raw attribute values are
//! typed by the attribute's declared value type; text destined for a
//! non-string attribute goes through literal inference.

use std::collections::BTreeMap;
use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::MemoryStore;
use crate::model::{Iid, Value, ValueType};
use crate::resolve::coerce;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub schema: SchemaSnapshot,
    #[serde(default)]
    pub things: Vec<ThingRecord>,
    #[serde(default)]
    pub relations: Vec<RelationRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub entities: Vec<EntityTypeRecord>,
    #[serde(default)]
    pub attributes: Vec<AttributeTypeRecord>,
    #[serde(default)]
    pub relations: Vec<RelationTypeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeRecord {
    pub label: String,
    #[serde(default)]
    pub sub: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeTypeRecord {
    pub label: String,
    #[serde(default)]
    pub sub: Option<String>,
    /// Inherited from the supertype when omitted.
    #[serde(default)]
    pub value_type: Option<ValueType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationTypeRecord {
    pub label: String,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub relates: Vec<String>,
}

/// One or several raw values for the same attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValues {
    Many(Vec<serde_json::Value>),
    One(serde_json::Value),
}

impl RawValues {
    fn as_slice(&self) -> &[serde_json::Value] {
        match self {
            RawValues::Many(v) => v,
            RawValues::One(v) => std::slice::from_ref(v),
        }
    }
}

/// An entity instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingRecord {
    pub id: String,
    pub isa: String,
    #[serde(default)]
    pub has: BTreeMap<String, RawValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// Needed only when the relation itself plays a role elsewhere.
    #[serde(default)]
    pub id: Option<String>,
    pub isa: String,
    /// `[role, player-id]` pairs.
    pub players: Vec<(String, String)>,
    #[serde(default)]
    pub has: BTreeMap<String, RawValues>,
}

impl Snapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Define the schema and insert all data into `store`.
    pub fn load_into(&self, store: &MemoryStore) -> Result<()> {
        for e in &self.schema.entities {
            store.define_entity(&e.label, e.sub.as_deref())?;
        }
        for a in &self.schema.attributes {
            let value_type = match (a.value_type, &a.sub) {
                (Some(vt), _) => vt,
                (None, Some(sup)) => store.value_type(sup)
                    .ok_or_else(|| Error::Schema(format!("Unknown supertype '{sup}' for '{}'", a.label)))?,
                (None, None) => {
                    return Err(Error::Schema(format!("Attribute type '{}' has no value type", a.label)));
                }
            };
            store.define_attribute(&a.label, a.sub.as_deref(), value_type)?;
        }
        for r in &self.schema.relations {
            store.define_relation(&r.label, r.sub.as_deref(), &r.relates)?;
        }

        let mut ids: HashMap<&str, Iid> = HashMap::new();
        for t in &self.things {
            let iid = store.insert_entity(&t.isa)?;
            if ids.insert(t.id.as_str(), iid).is_some() {
                return Err(Error::Schema(format!("Duplicate thing id '{}'", t.id)));
            }
            insert_attributes(store, iid, &t.has)?;
        }
        for r in &self.relations {
            let players = r.players.iter()
                .map(|(role, id)| {
                    ids.get(id.as_str())
                        .map(|iid| (role.as_str(), *iid))
                        .ok_or_else(|| Error::NotFound(format!("Role player '{id}' in {} relation", r.isa)))
                })
                .collect::<Result<Vec<_>>>()?;
            let iid = store.insert_relation(&r.isa, &players)?;
            if let Some(id) = &r.id {
                ids.insert(id.as_str(), iid);
            }
            insert_attributes(store, iid, &r.has)?;
        }
        Ok(())
    }
}

fn insert_attributes(store: &MemoryStore, owner: Iid, has: &BTreeMap<String, RawValues>) -> Result<()> {
    for (attribute, raw) in has {
        let value_type = store.value_type(attribute)
            .ok_or_else(|| Error::Schema(format!("Unknown attribute type '{attribute}'")))?;
        for value in raw.as_slice() {
            store.insert_has(owner, attribute, typed_value(value, value_type)?)?;
        }
    }
    Ok(())
}

/// Type a raw JSON value for an attribute of `value_type`.
fn typed_value(raw: &serde_json::Value, value_type: ValueType) -> Result<Value> {
    use serde_json::Value as Json;
    let value = match (raw, value_type) {
        (Json::String(s), ValueType::String) => Value::String(s.clone()),
        (Json::String(s), _) => coerce::coerce(s),
        (Json::Number(n), ValueType::String) => Value::String(n.to_string()),
        (Json::Number(n), ValueType::Double) => n.as_f64().map(Value::Double)
            .ok_or_else(|| Error::Schema(format!("Number {n} is not a double")))?,
        (Json::Number(n), _) => match n.as_i64() {
            Some(i) => Value::Long(i),
            None => n.as_f64().map(Value::Double)
                .ok_or_else(|| Error::Schema(format!("Number {n} is out of range")))?,
        },
        (Json::Bool(b), ValueType::String) => Value::String(b.to_string()),
        (Json::Bool(b), _) => Value::Boolean(*b),
        (other, _) => {
            return Err(Error::Schema(format!("Unsupported attribute value {other}")));
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GraphStore;
    use crate::tx::{TxMode, TxOptions};
    use crate::typeql::{MatchBuilder, ThingScope};

    const WORLD: &str = r#"{
        "schema": {
            "entities": [{ "label": "landmark-point" }],
            "attributes": [
                { "label": "name", "value_type": "string" },
                { "label": "water-depth", "value_type": "double" },
                { "label": "code", "value_type": "string" }
            ]
        },
        "things": [
            { "id": "lm1", "isa": "landmark-point",
              "has": { "name": "site-A", "water-depth": "1250", "code": 2024 } }
        ]
    }"#;

    #[tokio::test]
    async fn test_values_follow_declared_types() {
        let store = MemoryStore::from_snapshot(&Snapshot::from_json_str(WORLD).unwrap()).unwrap();
        let tx = store.open_tx(TxMode::Read, TxOptions::default()).await.unwrap();
        let scope = ThingScope::isa("landmark-point").has_var("water-depth", "d").has_var("code", "c");
        let rows = store.match_query(&tx, &MatchBuilder::new().element_scope("x", &scope).get(&["d", "c"]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<Value>("d").unwrap(), Value::Double(1250.0));
        assert_eq!(rows[0].get::<Value>("c").unwrap(), Value::String("2024".into()));
    }

    #[test]
    fn test_unknown_player_is_reported() {
        let json = r#"{
            "schema": { "entities": [{ "label": "a" }],
                        "relations": [{ "label": "linking", "relates": ["link"] }] },
            "things": [{ "id": "a1", "isa": "a" }],
            "relations": [{ "isa": "linking", "players": [["link", "a1"], ["link", "ghost"]] }]
        }"#;
        let err = MemoryStore::from_snapshot(&Snapshot::from_json_str(json).unwrap());
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_attribute_without_value_type_is_rejected() {
        let json = r#"{ "schema": { "attributes": [{ "label": "name" }] } }"#;
        let err = MemoryStore::from_snapshot(&Snapshot::from_json_str(json).unwrap());
        assert!(matches!(err, Err(Error::Schema(_))));
    }
}
