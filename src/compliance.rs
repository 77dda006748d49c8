//! Command compliance: may this command act on this element?
//!
//! A goal list names the types a command is meant for (for `open`:
//! `valve-operation-goal`, …). An element complies when its own label or its
//! superclass label appears in one of those goal labels. Tool functions are
//! always compliant: the tool mediates the action.

use serde::Serialize;
use tracing::debug;

use crate::storage::GraphStore;
use crate::typeql::{MatchBuilder, ThingScope, ROOT_THING};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComplianceError {
    #[error("Cannot {command} {element}: no goal for it among {goals:?}")]
    NotPermitted { command: String, element: String, goals: Vec<String> },

    #[error("Cannot {command} {element}: the command has no goals")]
    NoGoals { command: String, element: String },
}

impl ComplianceError {
    pub fn command(&self) -> &str {
        match self {
            ComplianceError::NotPermitted { command, .. } | ComplianceError::NoGoals { command, .. } => command,
        }
    }

    pub fn element(&self) -> &str {
        match self {
            ComplianceError::NotPermitted { element, .. } | ComplianceError::NoGoals { element, .. } => element,
        }
    }
}

/// Why a command was judged compliant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum Compliance {
    /// The command is a tool function.
    ToolMediated,
    /// `label` (element or superclass) appears in `goal`.
    Permitted { label: String, goal: String },
}

/// Check `command` against `goals` for `element` and its `superclass`.
pub fn check_compliance(
    command: &str,
    element: &str,
    use_tool: bool,
    superclass: Option<&str>,
    goals: &[String],
) -> std::result::Result<Compliance, ComplianceError> {
    if use_tool {
        return Ok(Compliance::ToolMediated);
    }
    if goals.is_empty() {
        return Err(ComplianceError::NoGoals { command: command.to_owned(), element: element.to_owned() });
    }

    for label in std::iter::once(element).chain(superclass) {
        if let Some(goal) = goals.iter().find(|g| appears_in(label, g)) {
            debug!(command, label, goal = goal.as_str(), "compliant");
            return Ok(Compliance::Permitted { label: label.to_owned(), goal: goal.clone() });
        }
    }

    Err(ComplianceError::NotPermitted {
        command: command.to_owned(),
        element: element.to_owned(),
        goals: goals.to_vec(),
    })
}

/// `label` equals `goal` or a contiguous run of its hyphen-separated segments.
fn appears_in(label: &str, goal: &str) -> bool {
    if label.is_empty() {
        return false;
    }
    let needle: Vec<&str> = label.split('-').collect();
    let haystack: Vec<&str> = goal.split('-').collect();
    haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Goal list for a command value.
///
/// With `by_value`, the attribute types holding `value`; otherwise the types
/// of things owning `attribute "<value>"`. Labels are distinct, in answer
/// order.
pub async fn goal_list<S: GraphStore>(
    store: &S,
    tx: &S::Tx,
    value: &str,
    attribute: &str,
    by_value: bool,
) -> Result<Vec<String>> {
    let query = if by_value {
        MatchBuilder::new().value("x", value).get(&["x"])
    } else {
        let scope = ThingScope::isa(ROOT_THING).has(attribute, value);
        MatchBuilder::new().element_scope("x", &scope).get(&["x"])
    };

    let mut goals: Vec<String> = Vec::new();
    for row in store.match_query(tx, &query).await? {
        let label = row.label("x")?;
        if !goals.contains(&label) {
            goals.push(label);
        }
    }
    debug!(value, attribute, by_value, ?goals, "goal list");
    Ok(goals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn goals(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_element_or_superclass_must_appear() {
        let g = goals(&["valve-operation-goal", "hatch-operation-goal"]);
        assert_eq!(
            check_compliance("open", "valve", false, Some("mechanism"), &g),
            Ok(Compliance::Permitted { label: "valve".into(), goal: "valve-operation-goal".into() })
        );
        assert_eq!(
            check_compliance("open", "ball-valve", false, Some("valve"), &g).unwrap(),
            Compliance::Permitted { label: "valve".into(), goal: "valve-operation-goal".into() }
        );
        let err = check_compliance("open", "manifold", false, Some("equipment"), &g).unwrap_err();
        assert_eq!(err.command(), "open");
        assert_eq!(err.element(), "manifold");
        assert!(matches!(err, ComplianceError::NotPermitted { .. }));
    }

    #[test]
    fn test_segments_match_whole_words_only() {
        assert!(appears_in("valve", "valve-operation-goal"));
        assert!(appears_in("operation-goal", "valve-operation-goal"));
        assert!(!appears_in("val", "valve-operation-goal"));
        assert!(!appears_in("valve-goal", "valve-operation-goal"));
        assert!(!appears_in("", "valve-operation-goal"));
    }

    proptest! {
        #[test]
        fn tool_commands_are_always_compliant(
            element in "[a-z-]{0,12}",
            goals in proptest::collection::vec("[a-z-]{1,12}", 0..4),
        ) {
            prop_assert_eq!(
                check_compliance("clean", &element, true, None, &goals),
                Ok(Compliance::ToolMediated)
            );
        }

        #[test]
        fn empty_goal_list_never_complies(element in "[a-z]{1,12}", sup in proptest::option::of("[a-z]{1,12}")) {
            let verdict = check_compliance("open", &element, false, sup.as_deref(), &[]);
            prop_assert!(
                matches!(verdict, Err(ComplianceError::NoGoals { .. })),
                "expected NoGoals, got {:?}",
                verdict
            );
        }
    }
}
