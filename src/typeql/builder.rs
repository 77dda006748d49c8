//! Fluent construction of match queries.
//!
//! The interpreter never concatenates query text. Every query is assembled
//! from named steps here and only rendered to TypeQL for logging or for a
//! remote store.

use smallvec::SmallVec;

use super::ast::*;
use crate::model::{RoleLabel, TypeKind, Value};

/// The `isa` + `has` constraints that pin down one thing.
#[derive(Debug, Clone, PartialEq)]
pub struct ThingScope {
    pub type_label: String,
    pub has: Vec<HasConstraint>,
}

impl ThingScope {
    pub fn isa(type_label: impl Into<String>) -> Self {
        Self { type_label: type_label.into(), has: Vec::new() }
    }

    /// `has <attribute> <literal>`
    pub fn has(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.has.push(HasConstraint {
            attribute: attribute.into(),
            value: HasValue::Literal(value.into()),
        });
        self
    }

    /// `has <attribute> $var`
    pub fn has_var(mut self, attribute: impl Into<String>, var: impl Into<String>) -> Self {
        self.has.push(HasConstraint {
            attribute: attribute.into(),
            value: HasValue::Var(Var::new(var)),
        });
        self
    }
}

/// Accumulates patterns; finish with [`MatchBuilder::get`].
#[derive(Debug, Clone, Default)]
pub struct MatchBuilder {
    patterns: Vec<Pattern>,
}

impl MatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary pattern.
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// `$var isa <type>, has …;`
    pub fn element_scope(self, var: &str, scope: &ThingScope) -> Self {
        self.pattern(Pattern::Isa {
            var: Var::new(var),
            type_label: scope.type_label.clone(),
            has: scope.has.clone(),
        })
    }

    /// `$owner has $attr; {$attr isa <a>;} or {$attr isa <b>;} …`
    ///
    /// Binds `attr` to whichever identifying attribute the owner carries.
    pub fn discriminated(self, owner: &str, attr: &str, discriminators: &[&str]) -> Self {
        let branches = discriminators
            .iter()
            .map(|label| vec![Pattern::Isa {
                var: Var::new(attr),
                type_label: (*label).to_owned(),
                has: Vec::new(),
            }])
            .collect();
        self.pattern(Pattern::Has { owner: Var::new(owner), attribute: Var::new(attr) })
            .pattern(Pattern::Or(branches))
    }

    /// `$rel($ra:$a, $rb:$b) isa relation;` with both role variables
    /// restricted to roles more specific than `relation:role`.
    pub fn related_excluding_placeholder(
        self,
        relation: &str,
        (role_a, player_a): (&str, &str),
        (role_b, player_b): (&str, &str),
    ) -> Self {
        let players: SmallVec<[RolePlayer; 2]> = [(role_a, player_a), (role_b, player_b)]
            .into_iter()
            .map(|(role, player)| RolePlayer {
                role: Some(RoleRef::Var(Var::new(role))),
                player: Var::new(player),
            })
            .collect();
        let exclude = |role: &str| Pattern::Not(vec![Pattern::Type {
            var: Var::new(role),
            label: TypeRef::Role(RoleLabel::root()),
        }]);
        self.pattern(Pattern::Relation {
            var: Some(Var::new(relation)),
            players,
            type_label: TypeKind::Relation.root_label().to_owned(),
        })
        .pattern(exclude(role_a))
        .pattern(exclude(role_b))
    }

    /// `$var(role:$player, …) isa <type>;` with role names (or bare players).
    pub fn relation(self, var: Option<&str>, type_label: &str, players: &[(Option<&str>, &str)]) -> Self {
        let players = players
            .iter()
            .map(|(role, player)| RolePlayer {
                role: role.map(|r| RoleRef::Label(r.to_owned())),
                player: Var::new(*player),
            })
            .collect();
        self.pattern(Pattern::Relation {
            var: var.map(Var::new),
            players,
            type_label: type_label.to_owned(),
        })
    }

    /// `$var <literal>;`
    pub fn value(self, var: &str, value: impl Into<Value>) -> Self {
        self.pattern(Pattern::Value { var: Var::new(var), value: value.into() })
    }

    /// `$var relates <role>;`
    pub fn relates(self, var: &str, role: &str) -> Self {
        self.pattern(Pattern::Relates { var: Var::new(var), role: role.to_owned() })
    }

    /// Finish with the projection.
    pub fn get(self, vars: &[&str]) -> MatchQuery {
        MatchQuery {
            patterns: self.patterns,
            get: vars.iter().map(|v| Var::new(*v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_element_scope_entity_form() {
        let scope = ThingScope::isa("valve").has("tag-number", "MECH-VALVE-TURN-UN-IN-11");
        let q = MatchBuilder::new().element_scope("x", &scope).get(&["x"]);
        assert_eq!(
            q.to_string(),
            r#"match $x isa valve, has tag-number "MECH-VALVE-TURN-UN-IN-11"; get $x;"#
        );
    }

    #[test]
    fn test_neighbourhood_query_shape() {
        let scope = ThingScope::isa("thing").has("element-type", "valve");
        let q = MatchBuilder::new()
            .element_scope("x", &scope)
            .discriminated("y", "t", &["tag-number", "element-type"])
            .related_excluding_placeholder("rxy", ("rx", "x"), ("ry", "y"))
            .get(&["x", "rx", "y", "ry", "rxy", "t"]);
        assert_eq!(
            q.to_string(),
            concat!(
                r#"match $x isa thing, has element-type "valve"; "#,
                "$y has $t; {$t isa tag-number;} or {$t isa element-type;}; ",
                "$rxy($rx:$x, $ry:$y) isa relation; ",
                "not {$rx type relation:role;}; not {$ry type relation:role;}; ",
                "get $x, $rx, $y, $ry, $rxy, $t;"
            )
        );
    }

    #[test]
    fn test_labelled_relation_and_lookups() {
        let q = MatchBuilder::new()
            .relation(Some("l"), "locating", &[(Some("currently-located-at"), "x"), (Some("location"), "lm")])
            .get(&["lm"]);
        assert_eq!(q.to_string(), "match $l(currently-located-at:$x, location:$lm) isa locating; get $lm;");

        let q = MatchBuilder::new().relates("r", "position").get(&["r"]);
        assert_eq!(q.to_string(), "match $r relates position; get $r;");
    }
}
