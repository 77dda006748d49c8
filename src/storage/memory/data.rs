//! Typed graph data held by [`MemoryStore`](super::MemoryStore).
//!
//! Schema types form a single-inheritance tree under the three roots
//! `entity`, `attribute` and `relation` (with `thing` above them all).
//! Instances are stored densely; an [`Iid`] is an index into that vector.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::model::{
    AttributeValue, Concept, DeclaredType, Iid, RoleLabel, Thing, TypeKind, Value, ValueType,
};
use crate::typeql::ROOT_THING;
use crate::{Error, Result};

/// Role players of one relation instance.
pub type Players = SmallVec<[(RoleLabel, Iid); 2]>;

#[derive(Debug, Clone)]
pub(crate) struct SchemaType {
    pub kind: TypeKind,
    pub supertype: Option<String>,
    pub value_type: Option<ValueType>,
    /// Role names declared by this relation type itself.
    pub relates: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum InstanceData {
    Entity,
    Relation(Players),
    Attribute(Value),
}

#[derive(Debug, Clone)]
pub(crate) struct Instance {
    pub type_label: String,
    pub data: InstanceData,
}

/// Schema plus instance data.
#[derive(Debug, Clone)]
pub struct GraphData {
    types: HashMap<String, SchemaType>,
    /// Definition order, for deterministic enumeration.
    type_order: Vec<String>,
    instances: Vec<Instance>,
    /// (attribute type, literal) → attribute instance
    attribute_index: HashMap<(String, String), Iid>,
    /// owner → owned attributes
    owned: HashMap<Iid, Vec<Iid>>,
    /// attribute → owners
    owners: HashMap<Iid, Vec<Iid>>,
}

impl Default for GraphData {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphData {
    /// Empty graph with only the root types.
    pub fn new() -> Self {
        let mut data = Self {
            types: HashMap::new(),
            type_order: Vec::new(),
            instances: Vec::new(),
            attribute_index: HashMap::new(),
            owned: HashMap::new(),
            owners: HashMap::new(),
        };
        for kind in [TypeKind::Entity, TypeKind::Attribute, TypeKind::Relation] {
            let relates = match kind {
                TypeKind::Relation => vec![RoleLabel::root().name],
                _ => Vec::new(),
            };
            data.insert_type(kind.root_label(), SchemaType { kind, supertype: None, value_type: None, relates });
        }
        data
    }

    fn insert_type(&mut self, label: &str, ty: SchemaType) {
        if self.types.insert(label.to_owned(), ty).is_none() {
            self.type_order.push(label.to_owned());
        }
    }

    // ========================================================================
    // Schema definition
    // ========================================================================

    /// Define `label sub supertype`. The supertype defaults to the kind's root.
    pub fn define_type(
        &mut self,
        label: &str,
        kind: TypeKind,
        supertype: Option<&str>,
        value_type: Option<ValueType>,
        relates: &[String],
    ) -> Result<()> {
        if label == ROOT_THING || self.types.contains_key(label) {
            return Err(Error::Schema(format!("Type '{label}' is already defined")));
        }
        let sup = supertype.unwrap_or(kind.root_label());
        let parent = self.types.get(sup)
            .ok_or_else(|| Error::Schema(format!("Unknown supertype '{sup}' for '{label}'")))?;
        if parent.kind != kind {
            return Err(Error::Schema(format!(
                "'{label}' is a {kind} type but its supertype '{sup}' is a {}", parent.kind
            )));
        }
        let value_type = match kind {
            TypeKind::Attribute => Some(
                value_type.or(parent.value_type)
                    .ok_or_else(|| Error::Schema(format!("Attribute type '{label}' has no value type")))?,
            ),
            _ => None,
        };
        self.insert_type(label, SchemaType {
            kind,
            supertype: Some(sup.to_owned()),
            value_type,
            relates: relates.to_vec(),
        });
        Ok(())
    }

    pub fn declared_type(&self, label: &str) -> Option<DeclaredType> {
        self.types.get(label).map(|t| DeclaredType {
            label: label.to_owned(),
            kind: t.kind,
            supertype: t.supertype.clone(),
        })
    }

    pub fn value_type(&self, attribute: &str) -> Option<ValueType> {
        self.types.get(attribute).and_then(|t| t.value_type)
    }

    /// `sub` is `sup` or one of its descendants. Every type is a `thing`.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sup == ROOT_THING {
            return self.types.contains_key(sub);
        }
        let mut current = Some(sub);
        while let Some(label) = current {
            if label == sup {
                return true;
            }
            current = self.types.get(label).and_then(|t| t.supertype.as_deref());
        }
        false
    }

    /// The role `name` as seen from relation type `relation` (declared there
    /// or inherited from a supertype).
    pub fn resolve_role(&self, relation: &str, name: &str) -> Option<RoleLabel> {
        let mut current = Some(relation);
        while let Some(label) = current {
            let ty = self.types.get(label)?;
            if ty.relates.iter().any(|r| r == name) {
                return Some(RoleLabel::new(label, name));
            }
            current = ty.supertype.as_deref();
        }
        None
    }

    /// Relation types (in definition order) that relate `role`, directly or by inheritance.
    pub fn relation_types_relating(&self, role: &str) -> Vec<String> {
        self.type_order
            .iter()
            .filter(|l| self.types.get(*l).is_some_and(|t| t.kind == TypeKind::Relation))
            .filter(|l| self.resolve_role(l, role).is_some())
            .cloned()
            .collect()
    }

    // ========================================================================
    // Instance data
    // ========================================================================

    fn next_iid(&self) -> Iid {
        Iid(self.instances.len() as u64)
    }

    fn require_kind(&self, label: &str, kind: TypeKind) -> Result<&SchemaType> {
        match self.types.get(label) {
            Some(t) if t.kind == kind => Ok(t),
            Some(t) => Err(Error::Schema(format!("'{label}' is a {} type, not {kind}", t.kind))),
            None => Err(Error::Schema(format!("Unknown type '{label}'"))),
        }
    }

    pub fn insert_entity(&mut self, type_label: &str) -> Result<Iid> {
        self.require_kind(type_label, TypeKind::Entity)?;
        let iid = self.next_iid();
        self.instances.push(Instance { type_label: type_label.to_owned(), data: InstanceData::Entity });
        Ok(iid)
    }

    /// Put an attribute; attributes are unique per (type, value).
    pub fn put_attribute(&mut self, type_label: &str, value: Value) -> Result<Iid> {
        let expected = self.require_kind(type_label, TypeKind::Attribute)?.value_type;
        let value = match (expected, value) {
            (Some(ValueType::Double), Value::Long(i)) => Value::Double(i as f64),
            (Some(vt), v) if vt == v.value_type() => v,
            (vt, v) => {
                return Err(Error::Schema(format!(
                    "Attribute '{type_label}' holds {} values, got {} {v}",
                    vt.map(|t| t.to_string()).unwrap_or_default(),
                    v.value_type(),
                )));
            }
        };
        let key = (type_label.to_owned(), value.to_string());
        if let Some(iid) = self.attribute_index.get(&key) {
            return Ok(*iid);
        }
        let iid = self.next_iid();
        self.instances.push(Instance { type_label: type_label.to_owned(), data: InstanceData::Attribute(value) });
        self.attribute_index.insert(key, iid);
        Ok(iid)
    }

    /// Record that `owner` has `attribute`.
    pub fn add_ownership(&mut self, owner: Iid, attribute: Iid) -> Result<()> {
        match self.instance(attribute).map(|i| &i.data) {
            Some(InstanceData::Attribute(_)) => {}
            _ => return Err(Error::NotFound(format!("Attribute {attribute}"))),
        }
        if self.instance(owner).is_none() {
            return Err(Error::NotFound(format!("Owner {owner}")));
        }
        let attrs = self.owned.entry(owner).or_default();
        if !attrs.contains(&attribute) {
            attrs.push(attribute);
            self.owners.entry(attribute).or_default().push(owner);
        }
        Ok(())
    }

    /// Insert a relation; role names are resolved against the relation type.
    pub fn insert_relation(&mut self, type_label: &str, players: &[(&str, Iid)]) -> Result<Iid> {
        self.require_kind(type_label, TypeKind::Relation)?;
        let mut resolved = Players::new();
        for (role, player) in players {
            let label = self.resolve_role(type_label, role)
                .ok_or_else(|| Error::Schema(format!("Relation '{type_label}' does not relate '{role}'")))?;
            if self.instance(*player).is_none() {
                return Err(Error::NotFound(format!("Role player {player}")));
            }
            resolved.push((label, *player));
        }
        let iid = self.next_iid();
        self.instances.push(Instance { type_label: type_label.to_owned(), data: InstanceData::Relation(resolved) });
        Ok(iid)
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub(crate) fn instance(&self, iid: Iid) -> Option<&Instance> {
        self.instances.get(iid.0 as usize)
    }

    pub(crate) fn instances(&self) -> impl Iterator<Item = (Iid, &Instance)> {
        self.instances.iter().enumerate().map(|(i, inst)| (Iid(i as u64), inst))
    }

    pub(crate) fn attributes_of(&self, owner: Iid) -> &[Iid] {
        self.owned.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn owners_of(&self, attribute: Iid) -> &[Iid] {
        self.owners.get(&attribute).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn attribute_value(&self, iid: Iid) -> Option<&Value> {
        match &self.instance(iid)?.data {
            InstanceData::Attribute(v) => Some(v),
            _ => None,
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// The concept an instance binds to in a query answer.
    pub fn concept(&self, iid: Iid) -> Option<Concept> {
        let inst = self.instance(iid)?;
        let thing = || Thing { iid, type_label: inst.type_label.clone() };
        Some(match &inst.data {
            InstanceData::Entity => Concept::Entity(thing()),
            InstanceData::Relation(_) => Concept::Relation(thing()),
            InstanceData::Attribute(v) => Concept::Attribute(AttributeValue {
                iid,
                type_label: inst.type_label.clone(),
                value: v.clone(),
            }),
        })
    }
}
