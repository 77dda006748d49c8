//! # Situation Awareness Procedure
//!
//! One phrase, one read transaction:
//!
//! 1. build the intent record
//! 2. profile the command (goals, tools, goal location)
//! 3. classify the primary element and check compliance
//! 4. collect the relation context (with the paired element, if any)
//! 5. resolve target locations
//! 6. describe the target and what it shares with the local neighbourhood
//!
//! Compliance and location failures end the procedure with
//! [`Error::Compliance`] / [`Error::Location`]; recovery is the caller's.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::compliance::{check_compliance, goal_list, Compliance};
use crate::config::InterpreterConfig;
use crate::intent::{ElementRef, IntentBuilder, IntentRecord};
use crate::location::{resolve_target, CoordinateRecord, LocationPair, TargetLocation};
use crate::operator::{Notice, Operator};
use crate::relations::{ContextRequest, PairedElement, RelationAggregate, RelationCollector};
use crate::resolve::{Classification, ElementClass, TypeResolver};
use crate::storage::GraphStore;
use crate::typeql::{MatchBuilder, ThingScope};
use crate::{Error, Result};

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandProfile {
    pub command: String,
    /// Attribute the command is a value of (`command-type` or `function`).
    pub attribute: String,
    pub use_tool: bool,
    pub goals: Vec<String>,
    /// Element types of the tools able to perform a tool function.
    pub tools: Vec<String>,
    pub goal_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementReport {
    pub element: ElementRef,
    /// `entity` or `attribute`.
    pub kind: String,
    pub class: String,
    pub superclass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance: Option<Compliance>,
    pub relations: RelationAggregate,
    pub target: TargetLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_relations: Option<RelationAggregate>,
    pub common_elements: Vec<String>,
}

impl ElementReport {
    fn new(element: ElementRef, class: &ElementClass, relations: RelationAggregate, target: TargetLocation) -> Self {
        Self {
            element,
            kind: if class.is_entity() { "entity" } else { "attribute" }.to_owned(),
            class: class.kind_label().to_owned(),
            superclass: class.superclass().map(str::to_owned),
            compliance: None,
            relations,
            target,
            target_relations: None,
            common_elements: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SituationReport {
    pub intent: IntentRecord,
    pub command: Option<CommandProfile>,
    pub primary: Option<ElementReport>,
    pub paired: Option<ElementReport>,
    pub current_locations: Vec<CoordinateRecord>,
}

impl fmt::Display for SituationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command Line ▶ {}", self.intent)?;
        if let Some(c) = &self.command {
            writeln!(f, "Q1. What kind of command is {} ?", c.command)?;
            if c.use_tool {
                writeln!(f, "    {} ▶ is a tool function and {:?} ▶ Requires TOOL", c.command, c.goals)?;
                writeln!(f, "    Tool list ▶ {:?}", c.tools)?;
            } else {
                writeln!(f, "    {} ▶ is a {:?}", c.command, c.goals)?;
            }
            if let Some(gl) = &c.goal_location {
                writeln!(f, "    goal-location ▶ {gl}")?;
            }
        }
        for report in self.primary.iter().chain(&self.paired) {
            write!(f, "{report}")?;
        }
        for c in &self.current_locations {
            writeln!(f, "Current location ▶ {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ElementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Q2. What kind of element is {} ?", self.element.element)?;
        let superclass = self.superclass.as_deref().unwrap_or(self.kind.as_str());
        write!(f, "    {} ▶ is a ({superclass}) {}", self.element.element, self.kind)?;
        match &self.element.tag {
            Some(tag) => writeln!(f, " | tag-number: {tag}")?,
            None => writeln!(f)?,
        }
        match &self.compliance {
            Some(Compliance::ToolMediated) => writeln!(f, "    COMPLIANT ▶ REQUIRES TOOL")?,
            Some(Compliance::Permitted { goal, .. }) => writeln!(f, "    YES ▶ COMPLIANT ({goal})")?,
            None => {}
        }
        for line in self.relations.to_string().lines() {
            writeln!(f, "    {line}")?;
        }
        writeln!(f, "Location (TARGET) ▶ {}", self.target)?;
        if let Some(relations) = &self.target_relations {
            for line in relations.to_string().lines() {
                writeln!(f, "    {line}")?;
            }
        }
        if !self.common_elements.is_empty() {
            writeln!(f, "Common elements ▶ {:?}", self.common_elements)?;
        }
        Ok(())
    }
}

// ============================================================================
// Procedure
// ============================================================================

pub struct Inquiry<'a, S: GraphStore> {
    store: &'a S,
    tx: &'a S::Tx,
    config: &'a InterpreterConfig,
    resolver: TypeResolver<'a, S>,
    collector: RelationCollector<'a, S>,
}

impl<'a, S: GraphStore> Inquiry<'a, S> {
    pub fn new(store: &'a S, tx: &'a S::Tx, config: &'a InterpreterConfig) -> Self {
        let vocab = &config.vocabulary;
        Self {
            store,
            tx,
            config,
            resolver: TypeResolver::new(store, tx, vocab),
            collector: RelationCollector::new(store, tx, vocab),
        }
    }

    pub async fn run<O: Operator>(&self, phrase: &str, operator: &mut O) -> Result<SituationReport> {
        let vocab = &self.config.vocabulary;
        let intent = IntentBuilder::new(self.store, self.tx, vocab, self.config.limits)
            .build(phrase, operator)
            .await?;

        let command = match intent.command() {
            Some(c) => Some(self.command_profile(c).await?),
            None => {
                operator.notify(&Notice::MissingCommand)?;
                None
            }
        };

        let mut report = SituationReport {
            intent: intent.clone(),
            command,
            primary: None,
            paired: None,
            current_locations: Vec::new(),
        };
        let Some(primary) = intent.primary() else {
            info!(intent = %intent, "no element to inquire about");
            return Ok(report);
        };

        let class = self.element_class(&primary.element).await?;
        let compliance = match &report.command {
            Some(c) => Some(check_compliance(&c.command, &primary.element, c.use_tool, class.superclass(), &c.goals)?),
            None => None,
        };

        let paired = match intent.paired() {
            Some(p) => {
                let class = self.element_class(&p.element).await?;
                Some((p, class))
            }
            None => None,
        };

        let request = ContextRequest {
            element: &primary.element,
            class: &class,
            tag: primary.tag.as_deref(),
            paired: paired.as_ref().and_then(|(p, class)| {
                p.tag.as_deref().map(|tag| PairedElement { element: &p.element, class, tag })
            }),
            first_prep: intent.first_prep(),
        };
        let mut context = self.collector.collect(&request).await?;
        context.promote_locations();
        report.current_locations = context.current_locations.clone();

        match paired {
            Some((paired, paired_class)) => {
                let reference = paired.to_string();
                let paired_target = self.target(&context.paired_locations, &reference, &context.current_locations).await?;
                let fallback = if context.current_locations.is_empty() {
                    paired_target.coordinates()
                } else {
                    context.current_locations.clone()
                };
                let primary_target = self.target(&context.subject_locations, &reference, &fallback).await?;

                let mut paired_report =
                    ElementReport::new(paired, &paired_class, context.cross_paired.clone(), paired_target);
                self.describe_target(&mut paired_report, &context.cross_paired).await?;

                let mut primary_report = ElementReport::new(primary, &class, context.direct, primary_target);
                primary_report.compliance = compliance;
                report.primary = Some(primary_report);
                report.paired = Some(paired_report);
            }
            None => {
                let reference = primary.to_string();
                let target = self.target(&context.subject_locations, &reference, &context.current_locations).await?;
                let mut primary_report = ElementReport::new(primary, &class, context.direct.clone(), target);
                primary_report.compliance = compliance;
                self.describe_target(&mut primary_report, &context.direct).await?;
                report.primary = Some(primary_report);
            }
        }

        info!(intent = %report.intent, "situation report complete");
        Ok(report)
    }

    async fn element_class(&self, element: &str) -> Result<ElementClass> {
        self.resolver.element_class(element).await?
            .ok_or_else(|| Error::NotFound(format!("Element class of '{element}'")))
    }

    async fn target(
        &self,
        candidates: &[LocationPair],
        reference: &str,
        fallback: &[CoordinateRecord],
    ) -> Result<TargetLocation> {
        resolve_target(self.store, self.tx, &self.config.vocabulary, candidates, reference, fallback).await
    }

    /// Goals, tools and goal location of a command token.
    async fn command_profile(&self, command: &str) -> Result<CommandProfile> {
        let vocab = &self.config.vocabulary;
        let attribute = match self.resolver.classify(command).await? {
            Classification::Command { attribute } => attribute,
            other => other.label().unwrap_or(vocab.command_type.as_str()).to_owned(),
        };

        let holders = goal_list(self.store, self.tx, command, &attribute, true).await?;
        let use_tool = holders.iter().any(|h| *h == vocab.function);
        let goals = goal_list(self.store, self.tx, command, &vocab.command_type, false).await?;

        let tools = if use_tool {
            let scope = ThingScope::isa(vocab.tool.as_str())
                .has(vocab.function.as_str(), command)
                .has_var(vocab.element_type.as_str(), "y");
            let query = MatchBuilder::new().element_scope("x", &scope).get(&["y"]);
            self.store.match_query(self.tx, &query).await?
                .iter()
                .map(|row| row.plain_value("y"))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let scope = ThingScope::isa(vocab.goal.as_str())
            .has(vocab.command_type.as_str(), command)
            .has_var(vocab.goal_location.as_str(), "gl");
        let query = MatchBuilder::new().element_scope("x", &scope).get(&["gl"]);
        let goal_location = match self.store.match_query(self.tx, &query).await?.first() {
            Some(row) => Some(row.plain_value("gl")?),
            None => None,
        };

        debug!(command, use_tool, ?goals, ?tools, "command profile");
        Ok(CommandProfile { command: command.to_owned(), attribute, use_tool, goals, tools, goal_location })
    }

    /// Relations of a resolved target and the participants it shares with
    /// `local`.
    async fn describe_target(&self, report: &mut ElementReport, local: &RelationAggregate) -> Result<()> {
        let Some(pair) = report.target.pair().cloned() else {
            return Ok(());
        };
        let Some(class) = self.resolver.element_class(&pair.class).await? else {
            return Ok(());
        };
        let mut context = self.collector
            .collect(&ContextRequest::single(&pair.class, &class, Some(&pair.tag)))
            .await?;
        context.promote_locations();
        report.common_elements = context.direct.common_participants(local);
        report.target_relations = Some(context.direct);
        Ok(())
    }
}
