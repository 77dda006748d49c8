//! # Relation Collector
//!
//! Pulls the relation neighbourhood around a referenced element and groups
//! it by relation kind.
//!
//! For a subject `x` the collector asks for every neighbour `y` linked to it
//! by a relation, identified by its tag-number or element-type:
//!
//! ```text
//! match $x isa valve, has tag-number "…";
//!       $y has $t; {$t isa tag-number;} or {$t isa element-type;};
//!       $rxy($rx:$x, $ry:$y) isa relation;
//!       not {$rx type relation:role;}; not {$ry type relation:role;};
//! get $x, $rx, $y, $ry, $rxy, $t;
//! ```
//!
//! With a paired element `z`, two more hops are joined in: `x ↔ z` and
//! `z ↔ w`, each with the same placeholder exclusion.
//!
//! ## Aggregation rules
//!
//! | Rule | Effect |
//! |------|--------|
//! | relation kind not physical | ignored |
//! | connecting role is `relation:role` | ignored |
//! | same participant in the same role | tag-number entry beats element-type entry |
//! | neighbour in a location class, tagged | recorded as a location candidate |

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::config::Vocabulary;
use crate::location::{landmark_scope, CoordinateRecord, LocationPair};
use crate::model::{ConceptRow, Iid, RoleLabel, Thing};
use crate::resolve::ElementClass;
use crate::storage::GraphStore;
use crate::typeql::{MatchBuilder, ThingScope};
use crate::Result;

// ============================================================================
// Aggregates
// ============================================================================

/// Which identifying attribute an entry was found through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Discriminator {
    TagNumber,
    ElementType,
}

/// One participant of a relation, seen from the collected element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateEntry {
    pub participant: Iid,
    pub subject_type: String,
    pub discriminator: Discriminator,
    /// Tag-number or element-type value.
    pub value: String,
    pub role: RoleLabel,
}

impl AggregateEntry {
    /// `"<type> <value>"`, the identity used to compare aggregates.
    pub fn participant_key(&self) -> String {
        format!("{} {}", self.subject_type, self.value)
    }
}

impl fmt::Display for AggregateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ▶ {}", self.subject_type, self.value, self.role.name)
    }
}

/// Relation kind → entries, both in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationAggregate {
    groups: Vec<(String, Vec<AggregateEntry>)>,
}

impl RelationAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|(_, entries)| entries.is_empty())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(kind, _)| kind.as_str())
    }

    pub fn entries(&self, kind: &str) -> &[AggregateEntry] {
        self.groups.iter()
            .find(|(k, _)| k == kind)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregateEntry)> {
        self.groups.iter().flat_map(|(k, entries)| entries.iter().map(move |e| (k.as_str(), e)))
    }

    /// Formatted triples of one kind.
    pub fn triples(&self, kind: &str) -> Vec<String> {
        self.entries(kind).iter().map(ToString::to_string).collect()
    }

    /// Add `entry` under `kind` if the kind is physical and neither
    /// connecting role is the placeholder. Returns whether anything changed.
    pub fn record(
        &mut self,
        physical: &[String],
        kind: &str,
        connecting: [&RoleLabel; 2],
        entry: AggregateEntry,
    ) -> bool {
        if !physical.iter().any(|p| p == kind) || connecting.iter().any(|r| r.is_root()) {
            return false;
        }
        let entries = match self.groups.iter().position(|(k, _)| k == kind) {
            Some(i) => &mut self.groups[i].1,
            None => {
                self.groups.push((kind.to_owned(), Vec::new()));
                let last = self.groups.len() - 1;
                &mut self.groups[last].1
            }
        };

        if entries.contains(&entry) {
            return false;
        }
        let same_participant = |e: &AggregateEntry| e.participant == entry.participant && e.role == entry.role;
        match (entry.discriminator, entries.iter().position(same_participant)) {
            (Discriminator::ElementType, Some(_)) => false,
            (Discriminator::TagNumber, Some(i)) if entries[i].discriminator == Discriminator::ElementType => {
                entries[i] = entry;
                true
            }
            _ => {
                entries.push(entry);
                true
            }
        }
    }

    /// In every kind, move the entry naming `pair` to the front. Returns the
    /// first one moved.
    pub fn promote(&mut self, pair: &LocationPair) -> Option<&AggregateEntry> {
        let mut found = None;
        for (gi, (_, entries)) in self.groups.iter_mut().enumerate() {
            if let Some(i) = entries.iter().position(|e| e.subject_type == pair.class && e.value == pair.tag) {
                let entry = entries.remove(i);
                entries.insert(0, entry);
                found.get_or_insert(gi);
            }
        }
        found.and_then(|gi| self.groups[gi].1.first())
    }

    /// Participants present in both aggregates, sorted.
    pub fn common_participants(&self, other: &RelationAggregate) -> Vec<String> {
        let mine: BTreeSet<String> = self.iter().map(|(_, e)| e.participant_key()).collect();
        let theirs: BTreeSet<String> = other.iter().map(|(_, e)| e.participant_key()).collect();
        mine.intersection(&theirs).cloned().collect()
    }
}

impl Serialize for RelationAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (kind, _) in &self.groups {
            map.serialize_entry(kind, &self.triples(kind))?;
        }
        map.end()
    }
}

impl fmt::Display for RelationAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, entries) in &self.groups {
            writeln!(f, "{kind}")?;
            for e in entries {
                writeln!(f, "    {e}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Context
// ============================================================================

/// The neighbour role and tag through which a location class was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationDetail {
    pub role: String,
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationContext {
    /// x ↔ y
    pub direct: RelationAggregate,
    /// x ↔ z, seen from x.
    pub cross_subject: RelationAggregate,
    /// z ↔ w, seen from w.
    pub cross_paired: RelationAggregate,
    pub subject_locations: Vec<LocationPair>,
    pub paired_locations: Vec<LocationPair>,
    pub location_details: BTreeMap<String, LocationDetail>,
    pub current_locations: Vec<CoordinateRecord>,
}

impl RelationContext {
    /// Move the entries naming each recorded location to the front.
    pub fn promote_locations(&mut self) {
        for (class, detail) in &self.location_details {
            let pair = LocationPair::new(class.as_str(), detail.tag.as_str());
            self.direct.promote(&pair);
            self.cross_paired.promote(&pair);
        }
    }
}

/// A paired element: always tagged.
#[derive(Debug, Clone, Copy)]
pub struct PairedElement<'a> {
    pub element: &'a str,
    pub class: &'a ElementClass,
    pub tag: &'a str,
}

/// What to collect around.
#[derive(Debug, Clone, Copy)]
pub struct ContextRequest<'a> {
    pub element: &'a str,
    pub class: &'a ElementClass,
    pub tag: Option<&'a str>,
    pub paired: Option<PairedElement<'a>>,
    pub first_prep: Option<&'a str>,
}

impl<'a> ContextRequest<'a> {
    pub fn single(element: &'a str, class: &'a ElementClass, tag: Option<&'a str>) -> Self {
        Self { element, class, tag, paired: None, first_prep: None }
    }

    /// Tag identifying the subject: its own, or the paired element's when
    /// the subject is named through what it is part of (`surface OF rov-panel …`).
    pub fn subject_tag(&self, vocab: &Vocabulary) -> Option<&'a str> {
        match self.paired {
            Some(paired)
                if self.first_prep.is_some_and(|p| vocab.is_part_preposition(p))
                    && vocab.part_scoped_elements.iter().any(|e| e == self.element) =>
            {
                Some(paired.tag)
            }
            _ => self.tag,
        }
    }
}

// ============================================================================
// Collector
// ============================================================================

const DIRECT_VARS: [&str; 6] = ["x", "rx", "y", "ry", "rxy", "t"];
const PAIRED_VARS: [&str; 9] = ["z", "r2x", "rz", "rxz", "w", "r2z", "rw", "rwz", "s"];
const CURRENT_VARS: [&str; 4] = ["ln", "lt", "lg", "wd"];

pub struct RelationCollector<'a, S: GraphStore> {
    store: &'a S,
    tx: &'a S::Tx,
    vocab: &'a Vocabulary,
}

impl<'a, S: GraphStore> RelationCollector<'a, S> {
    pub fn new(store: &'a S, tx: &'a S::Tx, vocab: &'a Vocabulary) -> Self {
        Self { store, tx, vocab }
    }

    /// Collect the relation context of `request`.
    pub async fn collect(&self, request: &ContextRequest<'_>) -> Result<RelationContext> {
        let subject = self.subject_scope(request);
        let discriminators = self.vocab.discriminators();

        let mut builder = MatchBuilder::new();
        if let Some(scope) = &subject {
            builder = builder.element_scope("x", scope);
        }
        builder = builder
            .discriminated("y", "t", &discriminators)
            .related_excluding_placeholder("rxy", ("rx", "x"), ("ry", "y"));

        let mut vars: Vec<&str> = DIRECT_VARS.to_vec();
        if let Some(paired) = &request.paired {
            let scope = paired.class.scope(paired.element, Some((self.vocab.tag_number.as_str(), paired.tag)));
            builder = builder
                .discriminated("w", "s", &discriminators)
                .element_scope("z", &scope)
                .related_excluding_placeholder("rxz", ("r2x", "x"), ("rz", "z"))
                .related_excluding_placeholder("rwz", ("r2z", "z"), ("rw", "w"));
            vars.extend(PAIRED_VARS);
        }

        let query = builder.get(&vars);
        let rows = self.store.match_query(self.tx, &query).await?;
        let mut context = aggregate_rows(self.vocab, &rows, request)?;

        if self.vocab.current_location_elements.iter().any(|e| e == request.element) {
            let scope = subject.unwrap_or_else(|| request.class.scope(request.element, None));
            context.current_locations = self.current_locations(&scope).await?;
        }
        debug!(
            element = request.element,
            rows = rows.len(),
            direct = context.direct.iter().count(),
            locations = context.subject_locations.len(),
            "relation context"
        );
        Ok(context)
    }

    /// Scope of `x`. `None` leaves it unconstrained.
    fn subject_scope(&self, request: &ContextRequest<'_>) -> Option<ThingScope> {
        if request.paired.is_some_and(|p| request.tag == Some(p.tag)) {
            return None;
        }
        let tag = request.subject_tag(self.vocab).map(|t| (self.vocab.tag_number.as_str(), t));
        Some(request.class.scope(request.element, tag))
    }

    /// Landmark points `x` is currently located at.
    async fn current_locations(&self, subject: &ThingScope) -> Result<Vec<CoordinateRecord>> {
        let query = MatchBuilder::new()
            .element_scope("x", subject)
            .element_scope("lm", &landmark_scope(self.vocab, CURRENT_VARS))
            .relation(
                Some("l"),
                &self.vocab.locating,
                &[(Some(self.vocab.located_role.as_str()), "x"), (Some(self.vocab.location_role.as_str()), "lm")],
            )
            .get(&["lm", "ln", "lt", "lg", "wd"]);

        let mut records: Vec<CoordinateRecord> = Vec::new();
        for row in self.store.match_query(self.tx, &query).await? {
            let record = CoordinateRecord::from_row(&row, CURRENT_VARS)?;
            if !records.contains(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Fold query answers into a context. Rows carry the direct variables and,
/// for paired requests, the paired ones.
pub fn aggregate_rows(
    vocab: &Vocabulary,
    rows: &[ConceptRow],
    request: &ContextRequest<'_>,
) -> Result<RelationContext> {
    let mut context = RelationContext::default();
    let physical = &vocab.physical_relations;
    let subject_tag = request.subject_tag(vocab);

    for row in rows {
        let rx: RoleLabel = row.get("rx")?;
        let ry: RoleLabel = row.get("ry")?;
        let kind = row.label("rxy")?;
        let t = participant(vocab, row, "y", "t", &ry)?;

        record_location(vocab, &mut context.location_details, &mut context.subject_locations, [&rx, &ry], &t);
        context.direct.record(physical, &kind, [&ry, &rx], t);

        if request.paired.is_some() {
            let x: Thing = row.get("x")?;
            let r2x: RoleLabel = row.get("r2x")?;
            let rz: RoleLabel = row.get("rz")?;
            let r2z: RoleLabel = row.get("r2z")?;
            let rw: RoleLabel = row.get("rw")?;
            let s = participant(vocab, row, "w", "s", &rw)?;

            record_location(vocab, &mut context.location_details, &mut context.paired_locations, [&r2z, &rw], &s);

            let subject = AggregateEntry {
                participant: x.iid,
                subject_type: x.type_label,
                discriminator: if subject_tag.is_some() { Discriminator::TagNumber } else { Discriminator::ElementType },
                value: subject_tag.unwrap_or(request.element).to_owned(),
                role: r2x.clone(),
            };
            context.cross_subject.record(physical, &row.label("rxz")?, [&r2x, &rz], subject);
            context.cross_paired.record(physical, &row.label("rwz")?, [&rw, &r2z], s);
        }
    }
    Ok(context)
}

/// Entry for the neighbour bound to `var`, identified through `attr`.
fn participant(
    vocab: &Vocabulary,
    row: &ConceptRow,
    var: &str,
    attr: &str,
    role: &RoleLabel,
) -> Result<AggregateEntry> {
    let thing: Thing = row.get(var)?;
    let discriminator = if row.label(attr)? == vocab.tag_number {
        Discriminator::TagNumber
    } else {
        Discriminator::ElementType
    };
    Ok(AggregateEntry {
        participant: thing.iid,
        subject_type: thing.type_label,
        discriminator,
        value: row.plain_value(attr)?,
        role: role.clone(),
    })
}

/// A tagged neighbour in a location class is a location candidate.
fn record_location(
    vocab: &Vocabulary,
    details: &mut BTreeMap<String, LocationDetail>,
    pairs: &mut Vec<LocationPair>,
    connecting: [&RoleLabel; 2],
    neighbour: &AggregateEntry,
) {
    let is_location = vocab.location_classes.iter().any(|c| *c == neighbour.subject_type);
    if !is_location || neighbour.discriminator != Discriminator::TagNumber || connecting.iter().any(|r| r.is_root()) {
        return;
    }
    details.insert(
        neighbour.subject_type.clone(),
        LocationDetail { role: neighbour.role.name.clone(), tag: neighbour.value.clone() },
    );
    let pair = LocationPair::new(neighbour.subject_type.as_str(), neighbour.value.as_str());
    if !pairs.contains(&pair) {
        pairs.push(pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use pretty_assertions::assert_eq;

    fn entry(participant: u64, discriminator: Discriminator, value: &str, role: &str) -> AggregateEntry {
        AggregateEntry {
            participant: Iid(participant),
            subject_type: "equipment".into(),
            discriminator,
            value: value.into(),
            role: RoleLabel::new("positioning", role),
        }
    }

    fn physical() -> Vec<String> {
        Vocabulary::default().physical_relations
    }

    #[test]
    fn test_tag_number_beats_element_type() {
        let role = RoleLabel::new("positioning", "position");
        let mut agg = RelationAggregate::new();
        assert!(agg.record(&physical(), "positioning", [&role, &role], entry(1, Discriminator::ElementType, "manifold", "position")));
        assert!(agg.record(&physical(), "positioning", [&role, &role], entry(1, Discriminator::TagNumber, "E-1", "position")));
        assert!(!agg.record(&physical(), "positioning", [&role, &role], entry(1, Discriminator::ElementType, "manifold", "position")));
        assert_eq!(agg.triples("positioning"), vec!["equipment E-1 ▶ position"]);
    }

    #[test]
    fn test_noise_is_filtered() {
        let role = RoleLabel::new("positioning", "position");
        let mut agg = RelationAggregate::new();
        assert!(!agg.record(&physical(), "locating", [&role, &role], entry(1, Discriminator::TagNumber, "E-1", "position")));
        assert!(!agg.record(&physical(), "positioning", [&RoleLabel::root(), &role], entry(1, Discriminator::TagNumber, "E-1", "position")));
        assert!(agg.is_empty());
    }

    #[test]
    fn test_promote_and_common() {
        let role = RoleLabel::new("positioning", "position");
        let mut agg = RelationAggregate::new();
        agg.record(&physical(), "positioning", [&role, &role], entry(1, Discriminator::TagNumber, "E-1", "position"));
        agg.record(&physical(), "positioning", [&role, &role], entry(2, Discriminator::TagNumber, "E-2", "position"));
        let promoted = agg.promote(&LocationPair::new("equipment", "E-2")).cloned();
        assert_eq!(promoted.map(|e| e.value), Some("E-2".to_owned()));
        assert_eq!(agg.triples("positioning")[0], "equipment E-2 ▶ position");

        let mut other = RelationAggregate::new();
        other.record(&physical(), "linking", [&role, &role], entry(2, Discriminator::TagNumber, "E-2", "link"));
        assert_eq!(agg.common_participants(&other), vec!["equipment E-2".to_owned()]);

        let json = serde_json::to_string(&agg).unwrap();
        assert_eq!(json, r#"{"positioning":["equipment E-2 ▶ position","equipment E-1 ▶ position"]}"#);
    }

    #[test]
    fn test_part_scoped_subject_takes_the_paired_tag() {
        let vocab = Vocabulary::default();
        let surface = ElementClass::Entity { label: "surface".into(), supertype: Some("component".into()) };
        let panel = ElementClass::Entity { label: "rov-panel".into(), supertype: Some("component".into()) };
        let paired = PairedElement { element: "rov-panel", class: &panel, tag: "P-1" };

        let mut request = ContextRequest::single("surface", &surface, None);
        assert_eq!(request.subject_tag(&vocab), None);

        request.paired = Some(paired);
        assert_eq!(request.subject_tag(&vocab), None);

        request.first_prep = Some("OF");
        assert_eq!(request.subject_tag(&vocab), Some("P-1"));

        let valve = ElementClass::Entity { label: "valve".into(), supertype: None };
        let request = ContextRequest { element: "valve", class: &valve, tag: Some("V-1"), paired: Some(paired), first_prep: Some("OF") };
        assert_eq!(request.subject_tag(&vocab), Some("V-1"));
    }

    fn arb_role() -> impl Strategy<Value = RoleLabel> {
        prop_oneof![
            Just(RoleLabel::root()),
            "[a-z]{1,8}".prop_map(|n| RoleLabel::new("positioning", n)),
        ]
    }

    fn arb_kind() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("positioning".to_owned()),
            Just("forming".to_owned()),
            Just("locating".to_owned()),
            "[a-z]{1,8}",
        ]
    }

    proptest! {
        #[test]
        fn aggregates_never_hold_placeholder_roles(
            rows in proptest::collection::vec((arb_kind(), arb_role(), arb_role(), 0u64..4, any::<bool>()), 0..40)
        ) {
            let physical = physical();
            let mut agg = RelationAggregate::new();
            for (kind, a, b, participant, tagged) in rows {
                let discriminator = if tagged { Discriminator::TagNumber } else { Discriminator::ElementType };
                let e = AggregateEntry {
                    participant: Iid(participant),
                    subject_type: "equipment".into(),
                    discriminator,
                    value: format!("V-{participant}"),
                    role: b.clone(),
                };
                agg.record(&physical, &kind, [&a, &b], e);
            }
            for (kind, e) in agg.iter() {
                prop_assert!(!e.role.is_root());
                prop_assert!(physical.iter().any(|p| p == kind));
            }
        }
    }
}
