//! Interpreter configuration.
//!
//! Every field has a default matching the subsea world model, so an empty
//! JSON object (or no file at all) is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::StoreConfig;
use crate::tx::TxOptions;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub store: StoreConfig,
    pub vocabulary: Vocabulary,
    pub limits: RetryLimits,
    pub tx: TxOptions,
    /// Fallback log filter when `RUST_LOG` is unset (binary only).
    pub log_level: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            vocabulary: Vocabulary::default(),
            limits: RetryLimits::default(),
            tx: TxOptions::default(),
            log_level: "info".into(),
        }
    }
}

impl InterpreterConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let l = &self.limits;
        if l.phrase_attempts == 0 || l.tag_selection_attempts == 0 || l.command_restarts == 0 {
            return Err(Error::Config("retry limits must be at least 1".into()));
        }
        if self.vocabulary.tag_number.is_empty() || self.vocabulary.element_type.is_empty() {
            return Err(Error::Config("tag-number and element-type labels are required".into()));
        }
        Ok(())
    }
}

/// Bounds on the interactive recovery loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryLimits {
    /// Phrases accepted per intent build (the first one included).
    pub phrase_attempts: u32,
    /// Invalid tag selections tolerated per ambiguity.
    pub tag_selection_attempts: u32,
    /// Whole-command restarts after a compliance or location failure.
    pub command_restarts: u32,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self { phrase_attempts: 5, tag_selection_attempts: 3, command_restarts: 3 }
    }
}

/// Labels of the world model the interpreter relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Positional prepositions, matched case-insensitively.
    pub prepositions: Vec<String>,
    /// Prepositions expressing part-of, matched exactly.
    pub part_prepositions: Vec<String>,
    /// Attribute whose values are goal commands.
    pub command_type: String,
    /// Attribute whose values are tool functions.
    pub function: String,
    pub tag_number: String,
    pub element_type: String,
    pub goal: String,
    pub goal_location: String,
    pub tool: String,
    /// Relation kinds that describe physical arrangement.
    pub physical_relations: Vec<String>,
    /// Classes whose instances can be a target location.
    pub location_classes: Vec<String>,
    /// Elements that move around and carry a current location.
    pub current_location_elements: Vec<String>,
    /// Elements identified through the thing they are part of.
    pub part_scoped_elements: Vec<String>,
    pub locating: String,
    pub located_role: String,
    pub location_role: String,
    pub landmark: String,
    pub coordinates: CoordinateLabels,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>();
        Self {
            prepositions: strings(&["TO", "FROM", "AT", "IN", "ON", "OF", "INTO"]),
            part_prepositions: strings(&["OF"]),
            command_type: "command-type".into(),
            function: "function".into(),
            tag_number: "tag-number".into(),
            element_type: "element-type".into(),
            goal: "goal".into(),
            goal_location: "goal-location".into(),
            tool: "tool".into(),
            physical_relations: strings(&["forming", "assembling", "composing", "linking", "positioning"]),
            location_classes: strings(&["equipment", "vessel", "storage"]),
            current_location_elements: strings(&["connector", "tool"]),
            part_scoped_elements: strings(&["surface"]),
            locating: "locating".into(),
            located_role: "currently-located-at".into(),
            location_role: "location".into(),
            landmark: "landmark-point".into(),
            coordinates: CoordinateLabels::default(),
        }
    }
}

impl Vocabulary {
    /// Attribute labels whose values are commands.
    pub fn is_command_attribute(&self, label: &str) -> bool {
        label == self.command_type || label == self.function
    }

    pub fn is_preposition(&self, token: &str) -> bool {
        let upper = token.to_uppercase();
        self.prepositions.iter().any(|p| *p == upper) || self.part_prepositions.iter().any(|p| p == token)
    }

    pub fn is_part_preposition(&self, token: &str) -> bool {
        self.part_prepositions.iter().any(|p| p.eq_ignore_ascii_case(token))
    }

    /// Identifying attributes, most specific first.
    pub fn discriminators(&self) -> [&str; 2] {
        [self.tag_number.as_str(), self.element_type.as_str()]
    }
}

/// Attribute labels of a landmark point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateLabels {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
    pub water_depth: String,
}

impl Default for CoordinateLabels {
    fn default() -> Self {
        Self {
            name: "name".into(),
            latitude: "latitude".into(),
            longitude: "longitude".into(),
            water_depth: "water-depth".into(),
        }
    }
}
