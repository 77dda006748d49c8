//! Match-query evaluation over [`GraphData`].
//!
//! A backtracking solver. Conjunctive statements are picked greedily: fully
//! bound statements first (pure checks), then statements touching a bound
//! variable, then statements carrying a literal. Disjunctions and negations
//! run last, in query order, once the conjunction has bound their variables.

use hashbrown::{HashMap, HashSet};

use super::data::{GraphData, InstanceData};
use crate::model::{ConceptRow, Concept, Iid, RoleLabel, TypeKind, Value};
use crate::typeql::{HasValue, MatchQuery, Pattern, RolePlayer, RoleRef, TypeRef, Var};
use crate::{Error, Result};

/// What a variable is bound to during solving.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Binding {
    Thing(Iid),
    Type(String),
    Role(RoleLabel),
}

type Env = HashMap<String, Binding>;

/// Evaluate `query` and project distinct answers.
pub(crate) fn evaluate(data: &GraphData, query: &MatchQuery) -> Result<Vec<ConceptRow>> {
    let mentioned: HashSet<&str> = query.patterns.iter()
        .flat_map(|p| p.vars())
        .map(Var::name)
        .collect();
    if let Some(v) = query.get.iter().find(|v| !mentioned.contains(v.name())) {
        return Err(Error::Store(format!("Variable {v} in get is not bound by the match clause")));
    }

    let solver = Solver { data };
    let mut solutions = Vec::new();
    solver.solve(&query.patterns.iter().collect::<Vec<_>>(), Env::new(), &mut solutions);

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for env in solutions {
        let key: Vec<Option<Binding>> = query.get.iter().map(|v| env.get(v.name()).cloned()).collect();
        if !seen.insert(key) {
            continue;
        }
        let mut row = ConceptRow::new();
        for var in &query.get {
            if let Some(b) = env.get(var.name()) {
                row.insert(var.name(), solver.concept(b)?);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

struct Solver<'g> {
    data: &'g GraphData,
}

impl<'g> Solver<'g> {
    fn concept(&self, binding: &Binding) -> Result<Concept> {
        match binding {
            Binding::Thing(iid) => self.data.concept(*iid)
                .ok_or_else(|| Error::NotFound(format!("Instance {iid}"))),
            Binding::Type(label) => self.data.declared_type(label)
                .map(Concept::Type)
                .ok_or_else(|| Error::NotFound(format!("Type '{label}'"))),
            Binding::Role(role) => Ok(Concept::Role(role.clone())),
        }
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    fn next_index(&self, pending: &[&Pattern], env: &Env) -> usize {
        let mut best: Option<(usize, (bool, bool, bool))> = None;
        for (i, p) in pending.iter().enumerate() {
            if p.is_filter() {
                continue;
            }
            let vars = p.vars();
            let bound = vars.iter().filter(|v| env.contains_key(v.name())).count();
            let rank = (bound == vars.len(), bound > 0, has_literal(p));
            if best.is_none_or(|(_, r)| rank > r) {
                best = Some((i, rank));
            }
        }
        // Only filters left: take them in query order.
        best.map(|(i, _)| i).unwrap_or(0)
    }

    fn solve(&self, pending: &[&Pattern], env: Env, out: &mut Vec<Env>) {
        if pending.is_empty() {
            out.push(env);
            return;
        }
        let idx = self.next_index(pending, &env);
        let pattern = pending[idx];
        let rest: Vec<&Pattern> = pending.iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, p)| *p)
            .collect();
        for next in self.extend(pattern, &env) {
            self.solve(&rest, next, out);
        }
    }

    /// All extensions of `env` satisfying one pattern.
    fn extend(&self, pattern: &Pattern, env: &Env) -> Vec<Env> {
        match pattern {
            Pattern::Isa { var, type_label, has } => self.extend_isa(var, type_label, env)
                .into_iter()
                .flat_map(|e| {
                    has.iter().fold(vec![e], |envs, h| {
                        envs.into_iter().flat_map(|e| self.extend_has(var, &h.attribute, &h.value, &e)).collect()
                    })
                })
                .collect(),
            Pattern::Has { owner, attribute } => self.extend_has_var(owner, attribute, None, env),
            Pattern::Relation { var, players, type_label } => self.extend_relation(var.as_ref(), players, type_label, env),
            Pattern::Type { var, label } => self.extend_type(var, label, env),
            Pattern::Value { var, value } => self.extend_value(var, value, env),
            Pattern::Relates { var, role } => self.extend_relates(var, role, env),
            Pattern::Or(branches) => {
                let mut out = Vec::new();
                for branch in branches {
                    self.solve(&branch.iter().collect::<Vec<_>>(), env.clone(), &mut out);
                }
                out
            }
            Pattern::Not(inner) => {
                let mut found = Vec::new();
                self.solve(&inner.iter().collect::<Vec<_>>(), env.clone(), &mut found);
                if found.is_empty() { vec![env.clone()] } else { Vec::new() }
            }
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn instance_type(&self, iid: Iid) -> Option<&str> {
        self.data.instance(iid).map(|i| i.type_label.as_str())
    }

    fn extend_isa(&self, var: &Var, type_label: &str, env: &Env) -> Vec<Env> {
        match env.get(var.name()) {
            Some(Binding::Thing(iid)) => match self.instance_type(*iid) {
                Some(t) if self.data.is_subtype(t, type_label) => vec![env.clone()],
                _ => Vec::new(),
            },
            Some(_) => Vec::new(),
            None => self.data.instances()
                .filter(|(_, inst)| self.data.is_subtype(&inst.type_label, type_label))
                .map(|(iid, _)| bind(env, var, Binding::Thing(iid)))
                .collect(),
        }
    }

    /// `$owner has <attribute> <value>` inside an `isa` statement.
    fn extend_has(&self, owner: &Var, attribute: &str, value: &HasValue, env: &Env) -> Vec<Env> {
        match value {
            HasValue::Var(v) => self.extend_has_var(owner, v, Some(attribute), env),
            HasValue::Literal(lit) => {
                let Some(Binding::Thing(o)) = env.get(owner.name()) else {
                    return Vec::new();
                };
                let matched = self.data.attributes_of(*o).iter().any(|a| {
                    self.instance_type(*a).is_some_and(|t| self.data.is_subtype(t, attribute))
                        && self.data.attribute_value(*a).is_some_and(|v| v.loosely_equals(lit))
                });
                if matched { vec![env.clone()] } else { Vec::new() }
            }
        }
    }

    /// `$owner has $attr`, optionally restricted to an attribute type.
    fn extend_has_var(&self, owner: &Var, attr: &Var, attribute: Option<&str>, env: &Env) -> Vec<Env> {
        let type_ok = |a: Iid| match attribute {
            Some(label) => self.instance_type(a).is_some_and(|t| self.data.is_subtype(t, label)),
            None => true,
        };
        match (env.get(owner.name()), env.get(attr.name())) {
            (Some(Binding::Thing(o)), Some(Binding::Thing(a))) => {
                if self.data.attributes_of(*o).contains(a) && type_ok(*a) {
                    vec![env.clone()]
                } else {
                    Vec::new()
                }
            }
            (Some(Binding::Thing(o)), None) => self.data.attributes_of(*o).iter()
                .filter(|a| type_ok(**a))
                .map(|a| bind(env, attr, Binding::Thing(*a)))
                .collect(),
            (None, Some(Binding::Thing(a))) if type_ok(*a) => self.data.owners_of(*a).iter()
                .map(|o| bind(env, owner, Binding::Thing(*o)))
                .collect(),
            (None, None) => self.data.instances()
                .flat_map(|(o, _)| self.data.attributes_of(o).iter().map(move |a| (o, *a)))
                .filter(|(_, a)| type_ok(*a))
                .map(|(o, a)| {
                    let e = bind(env, owner, Binding::Thing(o));
                    bind(&e, attr, Binding::Thing(a))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn extend_relation(
        &self,
        var: Option<&Var>,
        players: &[RolePlayer],
        type_label: &str,
        env: &Env,
    ) -> Vec<Env> {
        let candidates: Vec<Iid> = match var.and_then(|v| env.get(v.name())) {
            Some(Binding::Thing(r)) => vec![*r],
            Some(_) => return Vec::new(),
            None => self.data.instances()
                .filter(|(_, inst)| matches!(inst.data, InstanceData::Relation(_)))
                .map(|(iid, _)| iid)
                .collect(),
        };

        let mut out = Vec::new();
        for rel in candidates {
            let Some(inst) = self.data.instance(rel) else { continue };
            let InstanceData::Relation(entries) = &inst.data else { continue };
            if !self.data.is_subtype(&inst.type_label, type_label) {
                continue;
            }
            let start = match var {
                Some(v) => bind(env, v, Binding::Thing(rel)),
                None => env.clone(),
            };
            let mut used = vec![false; entries.len()];
            self.assign_players(players, entries, &mut used, start, &mut out);
        }
        out
    }

    /// Injectively map pattern role players onto the relation's entries.
    fn assign_players(
        &self,
        players: &[RolePlayer],
        entries: &[(RoleLabel, Iid)],
        used: &mut [bool],
        env: Env,
        out: &mut Vec<Env>,
    ) {
        let Some((first, rest)) = players.split_first() else {
            out.push(env);
            return;
        };
        for (i, (role, player)) in entries.iter().enumerate() {
            if used[i] {
                continue;
            }
            let player_env = match env.get(first.player.name()) {
                Some(Binding::Thing(p)) if p == player => env.clone(),
                Some(_) => continue,
                None => bind(&env, &first.player, Binding::Thing(*player)),
            };
            for role_env in role_bindings(first.role.as_ref(), role, &player_env) {
                used[i] = true;
                self.assign_players(rest, entries, used, role_env, out);
                used[i] = false;
            }
        }
    }

    fn extend_type(&self, var: &Var, label: &TypeRef, env: &Env) -> Vec<Env> {
        let target = match label {
            TypeRef::Label(l) => match self.data.declared_type(l) {
                Some(_) => Binding::Type(l.clone()),
                None => return Vec::new(),
            },
            TypeRef::Role(r) => Binding::Role(r.clone()),
        };
        match env.get(var.name()) {
            Some(b) if *b == target => vec![env.clone()],
            Some(_) => Vec::new(),
            None => vec![bind(env, var, target)],
        }
    }

    fn extend_value(&self, var: &Var, value: &Value, env: &Env) -> Vec<Env> {
        match env.get(var.name()) {
            Some(Binding::Thing(a)) => {
                if self.data.attribute_value(*a).is_some_and(|v| v.loosely_equals(value)) {
                    vec![env.clone()]
                } else {
                    Vec::new()
                }
            }
            Some(_) => Vec::new(),
            None => self.data.instances()
                .filter(|(_, inst)| matches!(&inst.data, InstanceData::Attribute(v) if v.loosely_equals(value)))
                .map(|(iid, _)| bind(env, var, Binding::Thing(iid)))
                .collect(),
        }
    }

    fn extend_relates(&self, var: &Var, role: &str, env: &Env) -> Vec<Env> {
        match env.get(var.name()) {
            Some(Binding::Type(label)) => {
                let is_relation = self.data.declared_type(label).is_some_and(|t| t.kind == TypeKind::Relation);
                if is_relation && self.data.resolve_role(label, role).is_some() {
                    vec![env.clone()]
                } else {
                    Vec::new()
                }
            }
            Some(_) => Vec::new(),
            None => self.data.relation_types_relating(role)
                .into_iter()
                .map(|label| bind(env, var, Binding::Type(label)))
                .collect(),
        }
    }
}

/// Ways a pattern role reference can match an entry's actual role.
///
/// A role variable binds to the actual role and to the root role it
/// specializes, mirroring role subtyping.
fn role_bindings(role_ref: Option<&RoleRef>, actual: &RoleLabel, env: &Env) -> Vec<Env> {
    let root = RoleLabel::root();
    match role_ref {
        None => vec![env.clone()],
        Some(RoleRef::Label(name)) => {
            if actual.name == *name || root.name == *name {
                vec![env.clone()]
            } else {
                Vec::new()
            }
        }
        Some(RoleRef::Var(v)) => {
            let mut candidates = vec![actual.clone()];
            if *actual != root {
                candidates.push(root);
            }
            match env.get(v.name()) {
                Some(Binding::Role(bound)) if candidates.contains(bound) => vec![env.clone()],
                Some(_) => Vec::new(),
                None => candidates.into_iter().map(|r| bind(env, v, Binding::Role(r))).collect(),
            }
        }
    }
}

fn bind(env: &Env, var: &Var, binding: Binding) -> Env {
    let mut next = env.clone();
    next.insert(var.name().to_owned(), binding);
    next
}

fn has_literal(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Isa { has, .. } => has.iter().any(|h| matches!(h.value, HasValue::Literal(_))),
        Pattern::Value { .. } | Pattern::Type { .. } | Pattern::Relates { .. } => true,
        _ => false,
    }
}
