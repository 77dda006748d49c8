//! TypeQL match-query AST
//!
//! These types represent the pattern-match queries the interpreter issues.
//! They are pure data with no behavior beyond rendering.
//! `Display` renders the canonical TypeQL text sent to remote stores.

use std::fmt;

use smallvec::SmallVec;

use crate::model::{RoleLabel, Value};

/// A query variable, rendered as `$name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub String);

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self { Var(name.to_owned()) }
}

/// A complete `match … get …;` query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    pub patterns: Vec<Pattern>,
    /// Projection. Answers are distinct over these variables.
    pub get: Vec<Var>,
}

/// One statement of a conjunction.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `$x isa valve, has tag-number "T";`
    Isa { var: Var, type_label: String, has: Vec<HasConstraint> },
    /// `$y has $t;`
    Has { owner: Var, attribute: Var },
    /// `$r($a:$x, $b:$y) isa relation;`
    Relation { var: Option<Var>, players: SmallVec<[RolePlayer; 2]>, type_label: String },
    /// `$rx type relation:role;` / `$e type valve;`
    Type { var: Var, label: TypeRef },
    /// `$x "open";`: an attribute with this value, of any type.
    Value { var: Var, value: Value },
    /// `$r relates position;`
    Relates { var: Var, role: String },
    /// `{…} or {…};`
    Or(Vec<Vec<Pattern>>),
    /// `not {…};`
    Not(Vec<Pattern>),
}

/// `has <attribute> <value-or-var>` inside an `isa` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct HasConstraint {
    pub attribute: String,
    pub value: HasValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HasValue {
    Literal(Value),
    Var(Var),
}

/// A relation role player: `role:$player` or bare `$player`.
#[derive(Debug, Clone, PartialEq)]
pub struct RolePlayer {
    pub role: Option<RoleRef>,
    pub player: Var,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoleRef {
    /// Role type variable: `$rx:$x`
    Var(Var),
    /// Role name: `location:$y`
    Label(String),
}

/// Target of a `type` statement.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Label(String),
    Role(RoleLabel),
}

// ============================================================================
// Introspection
// ============================================================================

impl Pattern {
    /// Every variable mentioned by this pattern (including nested ones).
    pub fn vars(&self) -> Vec<&Var> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a Var>) {
        match self {
            Pattern::Isa { var, has, .. } => {
                out.push(var);
                for h in has {
                    if let HasValue::Var(v) = &h.value {
                        out.push(v);
                    }
                }
            }
            Pattern::Has { owner, attribute } => {
                out.push(owner);
                out.push(attribute);
            }
            Pattern::Relation { var, players, .. } => {
                if let Some(v) = var {
                    out.push(v);
                }
                for p in players {
                    if let Some(RoleRef::Var(r)) = &p.role {
                        out.push(r);
                    }
                    out.push(&p.player);
                }
            }
            Pattern::Type { var, .. } | Pattern::Value { var, .. } | Pattern::Relates { var, .. } => {
                out.push(var);
            }
            Pattern::Or(branches) => {
                for branch in branches {
                    for p in branch {
                        p.collect_vars(out);
                    }
                }
            }
            Pattern::Not(inner) => {
                for p in inner {
                    p.collect_vars(out);
                }
            }
        }
    }

    /// Negations and disjunctions only filter or widen existing bindings.
    pub fn is_filter(&self) -> bool {
        matches!(self, Pattern::Or(_) | Pattern::Not(_))
    }
}

// ============================================================================
// Display (TypeQL text)
// ============================================================================

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl fmt::Display for HasValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HasValue::Literal(v) => write!(f, "{v}"),
            HasValue::Var(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Display for RolePlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Some(RoleRef::Var(r)) => write!(f, "{r}:{}", self.player),
            Some(RoleRef::Label(l)) => write!(f, "{l}:{}", self.player),
            None => write!(f, "{}", self.player),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Label(l) => f.write_str(l),
            TypeRef::Role(r) => write!(f, "{r}"),
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, patterns: &[Pattern]) -> fmt::Result {
    write!(f, "{{")?;
    for (i, p) in patterns.iter().enumerate() {
        if i > 0 { write!(f, " ")?; }
        write!(f, "{p}")?;
    }
    write!(f, "}}")
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Isa { var, type_label, has } => {
                write!(f, "{var} isa {type_label}")?;
                for h in has {
                    write!(f, ", has {} {}", h.attribute, h.value)?;
                }
                write!(f, ";")
            }
            Pattern::Has { owner, attribute } => write!(f, "{owner} has {attribute};"),
            Pattern::Relation { var, players, type_label } => {
                if let Some(v) = var {
                    write!(f, "{v}")?;
                }
                write!(f, "(")?;
                for (i, p) in players.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{p}")?;
                }
                write!(f, ") isa {type_label};")
            }
            Pattern::Type { var, label } => write!(f, "{var} type {label};"),
            Pattern::Value { var, value } => write!(f, "{var} {value};"),
            Pattern::Relates { var, role } => write!(f, "{var} relates {role};"),
            Pattern::Or(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 { write!(f, " or ")?; }
                    write_block(f, branch)?;
                }
                write!(f, ";")
            }
            Pattern::Not(inner) => {
                write!(f, "not ")?;
                write_block(f, inner)?;
                write!(f, ";")
            }
        }
    }
}

impl fmt::Display for MatchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match")?;
        for p in &self.patterns {
            write!(f, " {p}")?;
        }
        write!(f, " get")?;
        for (i, v) in self.get.iter().enumerate() {
            if i > 0 { write!(f, ",")?; }
            write!(f, " {v}")?;
        }
        write!(f, ";")
    }
}
