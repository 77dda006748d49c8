//! The structured intent record built from one phrase.

use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Slot name: `command`, `element-<n>`, `pair-<n>` or `prep-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Command,
    Element(u32),
    Pair(u32),
    Prep(u32),
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Command => write!(f, "command"),
            SlotKey::Element(n) => write!(f, "element-{n}"),
            SlotKey::Pair(n) => write!(f, "pair-{n}"),
            SlotKey::Prep(n) => write!(f, "prep-{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotValue {
    Token(String),
    /// `[element-type-or-class, tag-number]`
    Pair { element: String, tag: String },
}

impl Serialize for SlotValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SlotValue::Token(t) => serializer.serialize_str(t),
            SlotValue::Pair { element, tag } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(element)?;
                seq.serialize_element(tag)?;
                seq.end()
            }
        }
    }
}

/// An element reference: a head token, tagged when it came from a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementRef {
    pub element: String,
    pub tag: Option<String>,
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{} {tag}", self.element),
            None => f.write_str(&self.element),
        }
    }
}

/// Slots in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentRecord {
    slots: Vec<(SlotKey, SlotValue)>,
}

impl IntentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// A usable command line has at least two populated slots.
    pub fn is_valid(&self) -> bool {
        self.slots.len() > 1
    }

    pub fn slots(&self) -> impl Iterator<Item = (&SlotKey, &SlotValue)> {
        self.slots.iter().map(|(k, v)| (k, v))
    }

    pub fn get(&self, key: SlotKey) -> Option<&SlotValue> {
        self.slots.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn command(&self) -> Option<&str> {
        match self.get(SlotKey::Command)? {
            SlotValue::Token(t) => Some(t),
            SlotValue::Pair { .. } => None,
        }
    }

    /// The first preposition, if any.
    pub fn first_prep(&self) -> Option<&str> {
        match self.get(SlotKey::Prep(1))? {
            SlotValue::Token(t) => Some(t),
            SlotValue::Pair { .. } => None,
        }
    }

    /// The element the command acts on: `element-1`, else `pair-1`.
    pub fn primary(&self) -> Option<ElementRef> {
        self.element_ref(SlotKey::Element(1))
            .or_else(|| self.element_ref(SlotKey::Pair(1)))
    }

    /// The first pair that is not the primary element.
    pub fn paired(&self) -> Option<ElementRef> {
        let primary_is_pair = self.get(SlotKey::Element(1)).is_none();
        self.slots.iter()
            .filter(|(k, _)| matches!(k, SlotKey::Pair(n) if !(primary_is_pair && *n == 1)))
            .find_map(|(k, _)| self.element_ref(*k))
    }

    fn element_ref(&self, key: SlotKey) -> Option<ElementRef> {
        Some(match self.get(key)? {
            SlotValue::Token(t) => ElementRef { element: t.clone(), tag: None },
            SlotValue::Pair { element, tag } => ElementRef { element: element.clone(), tag: Some(tag.clone()) },
        })
    }

    /// The tokens of the record in slot order; re-parsing them yields an
    /// equivalent record.
    pub fn tokens(&self) -> Vec<String> {
        self.slots.iter()
            .flat_map(|(_, v)| match v {
                SlotValue::Token(t) => vec![t.clone()],
                SlotValue::Pair { element, tag } => vec![element.clone(), tag.clone()],
            })
            .collect()
    }

    pub(crate) fn push(&mut self, key: SlotKey, value: SlotValue) {
        self.slots.push((key, value));
    }

    /// Set the command; an existing command slot keeps its position.
    pub(crate) fn set_command(&mut self, token: &str) {
        let value = SlotValue::Token(token.to_owned());
        match self.slots.iter_mut().find(|(k, _)| *k == SlotKey::Command) {
            Some(slot) => slot.1 = value,
            None => self.slots.push((SlotKey::Command, value)),
        }
    }
}

impl Serialize for IntentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (k, v) in &self.slots {
            map.serialize_entry(&k.to_string(), v)?;
        }
        map.end()
    }
}

impl fmt::Display for IntentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.slots.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            match v {
                SlotValue::Token(t) => write!(f, "'{k}': '{t}'")?,
                SlotValue::Pair { element, tag } => write!(f, "'{k}': ['{element}', '{tag}']")?,
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> IntentRecord {
        let mut r = IntentRecord::new();
        r.set_command("clean");
        r.push(SlotKey::Element(1), SlotValue::Token("surface".into()));
        r.push(SlotKey::Prep(1), SlotValue::Token("OF".into()));
        r.push(SlotKey::Pair(1), SlotValue::Pair { element: "rov-panel".into(), tag: "P-1".into() });
        r
    }

    #[test]
    fn test_serializes_in_discovery_order() {
        let json = serde_json::to_string(&record()).unwrap();
        assert_eq!(
            json,
            r#"{"command":"clean","element-1":"surface","prep-1":"OF","pair-1":["rov-panel","P-1"]}"#
        );
    }

    #[test]
    fn test_primary_and_paired() {
        let r = record();
        assert_eq!(r.primary(), Some(ElementRef { element: "surface".into(), tag: None }));
        assert_eq!(r.paired(), Some(ElementRef { element: "rov-panel".into(), tag: Some("P-1".into()) }));
        assert_eq!(r.first_prep(), Some("OF"));

        let mut r = IntentRecord::new();
        r.set_command("open");
        r.push(SlotKey::Pair(1), SlotValue::Pair { element: "valve".into(), tag: "V-1".into() });
        assert_eq!(r.primary().unwrap().tag.as_deref(), Some("V-1"));
        assert_eq!(r.paired(), None);
    }

    #[test]
    fn test_last_command_wins_in_first_position() {
        let mut r = record();
        r.set_command("open");
        assert_eq!(r.command(), Some("open"));
        assert_eq!(r.tokens()[0], "open");
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn test_tokens_and_display() {
        let r = record();
        assert_eq!(r.tokens().join(" "), "clean surface OF rov-panel P-1");
        assert_eq!(
            r.to_string(),
            "{'command': 'clean', 'element-1': 'surface', 'prep-1': 'OF', 'pair-1': ['rov-panel', 'P-1']}"
        );
        assert!(r.is_valid());
        assert!(!IntentRecord::new().is_valid());
    }
}
