//! Token classification against the graph's type system.

use std::fmt;

use tracing::{debug, warn};

use crate::config::Vocabulary;
use crate::model::TypeKind;
use crate::storage::GraphStore;
use crate::typeql::{MatchBuilder, ThingScope};
use crate::Result;

/// What a single phrase token denotes in the world model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A preposition (`relation: None`) or a role name of `relation`.
    Role { token: String, relation: Option<String> },
    /// A value of a command attribute (`command-type` or `function`).
    Command { attribute: String },
    /// An attribute type, or a value of attribute `label` owned by `owner`.
    Attribute { label: String, owner: Option<String> },
    Entity { label: String, supertype: Option<String> },
    Relation { label: String },
    Unknown,
}

impl Classification {
    pub fn is_role(&self) -> bool {
        matches!(self, Classification::Role { .. })
    }

    /// Attribute or declared-type label, if the token has one.
    pub fn label(&self) -> Option<&str> {
        match self {
            Classification::Command { attribute: label }
            | Classification::Attribute { label, .. }
            | Classification::Entity { label, .. }
            | Classification::Relation { label } => Some(label),
            Classification::Role { .. } | Classification::Unknown => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Role { token, relation: Some(r) } => write!(f, "{token}:role:{r}"),
            Classification::Role { token, relation: None } => write!(f, "{token}:role"),
            Classification::Command { attribute } => write!(f, "attribute:{attribute}"),
            Classification::Attribute { label, .. } => write!(f, "attribute:{label}"),
            Classification::Entity { label, .. } => write!(f, "entity:{label}"),
            Classification::Relation { label } => write!(f, "relation:{label}"),
            Classification::Unknown => write!(f, "unknown"),
        }
    }
}

/// How an element head token is matched to things.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementClass {
    /// The token names an entity type.
    Entity { label: String, supertype: Option<String> },
    /// The token is a value of `attribute`, carried by things of type `owner`.
    Attribute { attribute: String, owner: Option<String> },
}

impl ElementClass {
    pub fn from_classification(c: &Classification) -> Option<Self> {
        match c {
            Classification::Entity { label, supertype } => Some(ElementClass::Entity {
                label: label.clone(),
                supertype: supertype.clone(),
            }),
            Classification::Attribute { label, owner } => Some(ElementClass::Attribute {
                attribute: label.clone(),
                owner: owner.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, ElementClass::Entity { .. })
    }

    /// The class compliance is checked against besides the element itself.
    pub fn superclass(&self) -> Option<&str> {
        match self {
            ElementClass::Entity { supertype, .. } => supertype.as_deref(),
            ElementClass::Attribute { owner, .. } => owner.as_deref(),
        }
    }

    /// Label shown for the element's kind: the entity type or the attribute.
    pub fn kind_label(&self) -> &str {
        match self {
            ElementClass::Entity { label, .. } => label,
            ElementClass::Attribute { attribute, .. } => attribute,
        }
    }

    /// `isa`/`has` constraints selecting things denoted by `token`.
    pub fn scope(&self, token: &str, tag: Option<(&str, &str)>) -> ThingScope {
        let scope = match self {
            ElementClass::Entity { label, .. } => ThingScope::isa(label.as_str()),
            ElementClass::Attribute { attribute, owner } => {
                ThingScope::isa(owner.as_deref().unwrap_or(crate::typeql::ROOT_THING))
                    .has(attribute.as_str(), token)
            }
        };
        match tag {
            Some((attribute, value)) => scope.has(attribute, value),
            None => scope,
        }
    }
}

/// Classifies tokens inside one read transaction.
pub struct TypeResolver<'a, S: GraphStore> {
    store: &'a S,
    tx: &'a S::Tx,
    vocab: &'a Vocabulary,
}

impl<'a, S: GraphStore> TypeResolver<'a, S> {
    pub fn new(store: &'a S, tx: &'a S::Tx, vocab: &'a Vocabulary) -> Self {
        Self { store, tx, vocab }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.vocab
    }

    /// Classify one token. Lookups run in order: declared type (verbatim),
    /// preposition, attribute value, relation role (lower-cased).
    pub async fn classify(&self, token: &str) -> Result<Classification> {
        if let Some(declared) = self.store.resolve_declared_type(self.tx, token).await? {
            let label = declared.label;
            return Ok(match declared.kind {
                TypeKind::Attribute if self.vocab.is_command_attribute(&label) => {
                    Classification::Command { attribute: label }
                }
                TypeKind::Attribute => Classification::Attribute { label, owner: None },
                TypeKind::Entity => Classification::Entity { label, supertype: declared.supertype },
                TypeKind::Relation => Classification::Relation { label },
            });
        }

        if self.vocab.is_preposition(token) {
            return Ok(Classification::Role { token: token.to_owned(), relation: None });
        }

        if let Some(label) = self.store.attribute_value_lookup(self.tx, token).await? {
            if self.vocab.is_command_attribute(&label) {
                return Ok(Classification::Command { attribute: label });
            }
            let owner = self.value_owner(&label, token).await?;
            return Ok(Classification::Attribute { label, owner });
        }

        let role = token.to_lowercase();
        if let Some(relation) = self.store.relation_role_lookup(self.tx, &role).await? {
            return Ok(Classification::Role { token: role, relation: Some(relation) });
        }

        warn!(token, "token is not part of the world model");
        Ok(Classification::Unknown)
    }

    /// Type of the first entity owning `attribute "<value>"`.
    async fn value_owner(&self, attribute: &str, value: &str) -> Result<Option<String>> {
        let scope = ThingScope::isa(TypeKind::Entity.root_label()).has(attribute, value);
        let query = MatchBuilder::new().element_scope("y", &scope).get(&["y"]);
        let rows = self.store.match_query(self.tx, &query).await?;
        let owner = match rows.first() {
            Some(row) => Some(row.label("y")?),
            None => None,
        };
        debug!(attribute, value, ?owner, "attribute value owner");
        Ok(owner)
    }

    /// Element class of a head token, if it names an entity type or an
    /// attribute value.
    pub async fn element_class(&self, token: &str) -> Result<Option<ElementClass>> {
        Ok(ElementClass::from_classification(&self.classify(token).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, Snapshot};
    use crate::tx::{TxMode, TxOptions};

    const WORLD: &str = r#"{
        "schema": {
            "entities": [
                { "label": "mechanism" }, { "label": "valve", "sub": "mechanism" },
                { "label": "equipment" }, { "label": "goal" }
            ],
            "attributes": [
                { "label": "tag-number", "value_type": "string" },
                { "label": "element-type", "value_type": "string" },
                { "label": "command-type", "value_type": "string" },
                { "label": "function", "value_type": "string" }
            ],
            "relations": [{ "label": "positioning", "relates": ["positioned", "position"] }]
        },
        "things": [
            { "id": "e1", "isa": "equipment", "has": { "tag-number": "E-1", "element-type": "manifold" } },
            { "id": "g1", "isa": "goal", "has": { "command-type": "open" } },
            { "id": "g2", "isa": "goal", "has": { "function": "apply-torque-on" } }
        ]
    }"#;

    async fn classify_all(tokens: &[&str]) -> Vec<Classification> {
        let store = MemoryStore::from_snapshot(&Snapshot::from_json_str(WORLD).unwrap()).unwrap();
        let tx = store.open_tx(TxMode::Read, TxOptions::default()).await.unwrap();
        let vocab = Vocabulary::default();
        let resolver = TypeResolver::new(&store, &tx, &vocab);
        let mut out = Vec::new();
        for t in tokens {
            out.push(resolver.classify(t).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_declared_types_win() {
        let c = classify_all(&["valve", "positioning", "tag-number", "command-type"]).await;
        assert_eq!(c[0], Classification::Entity { label: "valve".into(), supertype: Some("mechanism".into()) });
        assert_eq!(c[1], Classification::Relation { label: "positioning".into() });
        assert_eq!(c[2], Classification::Attribute { label: "tag-number".into(), owner: None });
        assert_eq!(c[3], Classification::Command { attribute: "command-type".into() });
    }

    #[tokio::test]
    async fn test_prepositions_before_values() {
        let c = classify_all(&["of", "INTO", "Of"]).await;
        assert!(c.iter().all(Classification::is_role));
    }

    #[tokio::test]
    async fn test_values_commands_and_roles() {
        let c = classify_all(&["open", "apply-torque-on", "manifold", "POSITION", "Valve"]).await;
        assert_eq!(c[0], Classification::Command { attribute: "command-type".into() });
        assert_eq!(c[1], Classification::Command { attribute: "function".into() });
        assert_eq!(
            c[2],
            Classification::Attribute { label: "element-type".into(), owner: Some("equipment".into()) }
        );
        assert_eq!(
            c[3],
            Classification::Role { token: "position".into(), relation: Some("positioning".into()) }
        );
        assert_eq!(c[4], Classification::Unknown);
    }

    #[test]
    fn test_element_scope_forms() {
        let entity = ElementClass::Entity { label: "valve".into(), supertype: Some("mechanism".into()) };
        let scope = entity.scope("valve", Some(("tag-number", "V-1")));
        assert_eq!(scope, ThingScope::isa("valve").has("tag-number", "V-1"));
        assert_eq!(entity.superclass(), Some("mechanism"));

        let attr = ElementClass::Attribute { attribute: "element-type".into(), owner: Some("equipment".into()) };
        assert_eq!(attr.scope("manifold", None), ThingScope::isa("equipment").has("element-type", "manifold"));
        assert_eq!(attr.superclass(), Some("equipment"));
    }
}
