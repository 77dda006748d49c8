//! Target locations: where is the thing a command is aimed at?
//!
//! Locatable things (equipment, vessels, storage) are tied to a landmark
//! point by a `locating` relation. Relation collection yields the location
//! pairs around an element; [`resolve_target`] turns those candidates into a
//! single [`TargetLocation`] or a [`LocationError`].

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::Vocabulary;
use crate::model::ConceptRow;
use crate::storage::GraphStore;
use crate::typeql::{MatchBuilder, ThingScope};
use crate::Result;

/// `[class, tag-number]` of a locatable thing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocationPair {
    pub class: String,
    pub tag: String,
}

impl LocationPair {
    pub fn new(class: impl Into<String>, tag: impl Into<String>) -> Self {
        Self { class: class.into(), tag: tag.into() }
    }
}

impl fmt::Display for LocationPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.class, self.tag)
    }
}

/// Coordinates of a landmark point, as stored (no unit conversion).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CoordinateRecord {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
    #[serde(rename = "water-depth")]
    pub water_depth: String,
}

impl CoordinateRecord {
    /// Read a record from `row`, with variables in the order
    /// name, latitude, longitude, water depth.
    pub fn from_row(row: &ConceptRow, [name, lat, lon, depth]: [&str; 4]) -> Result<Self> {
        Ok(Self {
            name: row.plain_value(name)?,
            latitude: row.plain_value(lat)?,
            longitude: row.plain_value(lon)?,
            water_depth: row.plain_value(depth)?,
        })
    }
}

impl fmt::Display for CoordinateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name: {} | latitude: {} | longitude: {} | water-depth: {}",
            self.name, self.latitude, self.longitude, self.water_depth
        )
    }
}

/// `$var isa landmark-point, has name $n, has latitude $lat, …`
pub(crate) fn landmark_scope(vocab: &Vocabulary, [name, lat, lon, depth]: [&str; 4]) -> ThingScope {
    let c = &vocab.coordinates;
    ThingScope::isa(vocab.landmark.as_str())
        .has_var(c.name.as_str(), name)
        .has_var(c.latitude.as_str(), lat)
        .has_var(c.longitude.as_str(), lon)
        .has_var(c.water_depth.as_str(), depth)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The single candidate has no `locating` fact.
    #[error("No location found for [{0}]")]
    Unlocated(LocationPair),

    /// Neither candidates nor fallback coordinates.
    #[error("No location available for {element}")]
    Missing { element: String },
}

/// Outcome of target resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", rename_all = "kebab-case")]
pub enum TargetLocation {
    Resolved { pair: LocationPair, coordinates: CoordinateRecord },
    /// Several candidates; the target is the same as `reference`'s.
    SameAs { reference: String, candidates: Vec<LocationPair> },
    /// No candidate of its own; coordinates carried over from `reference`.
    Propagated { reference: String, coordinates: Vec<CoordinateRecord> },
}

impl TargetLocation {
    /// The location pair, when resolved to exactly one.
    pub fn pair(&self) -> Option<&LocationPair> {
        match self {
            TargetLocation::Resolved { pair, .. } => Some(pair),
            _ => None,
        }
    }

    /// Coordinates known for this target.
    pub fn coordinates(&self) -> Vec<CoordinateRecord> {
        match self {
            TargetLocation::Resolved { coordinates, .. } => vec![coordinates.clone()],
            TargetLocation::Propagated { coordinates, .. } => coordinates.clone(),
            TargetLocation::SameAs { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for TargetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetLocation::Resolved { pair, coordinates } => write!(f, "[{pair}] {coordinates}"),
            TargetLocation::SameAs { reference, .. } => write!(f, "SAME AS ▶ {reference}"),
            TargetLocation::Propagated { reference, coordinates } => {
                write!(f, "FROM {reference} ▶ ")?;
                for (i, c) in coordinates.iter().enumerate() {
                    if i > 0 { write!(f, "; ")?; }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
        }
    }
}

/// First landmark point the pair's thing is located at.
pub async fn find_location<S: GraphStore>(
    store: &S,
    tx: &S::Tx,
    vocab: &Vocabulary,
    pair: &LocationPair,
) -> Result<Option<CoordinateRecord>> {
    const VARS: [&str; 4] = ["n", "lat", "lon", "wdp"];
    let thing = ThingScope::isa(pair.class.as_str()).has(vocab.tag_number.as_str(), pair.tag.as_str());
    let query = MatchBuilder::new()
        .element_scope("x", &thing)
        .element_scope("y", &landmark_scope(vocab, VARS))
        .relation(None, &vocab.locating, &[(None, "x"), (Some(vocab.location_role.as_str()), "y")])
        .get(&VARS);

    let rows = store.match_query(tx, &query).await?;
    let record = rows.first().map(|row| CoordinateRecord::from_row(row, VARS)).transpose()?;
    debug!(%pair, found = record.is_some(), "find location");
    Ok(record)
}

/// Reconcile location candidates into one target.
///
/// `reference` names the element the target is relative to; `fallback` are
/// coordinates already known for it.
pub async fn resolve_target<S: GraphStore>(
    store: &S,
    tx: &S::Tx,
    vocab: &Vocabulary,
    candidates: &[LocationPair],
    reference: &str,
    fallback: &[CoordinateRecord],
) -> Result<TargetLocation> {
    match candidates {
        [pair] => match find_location(store, tx, vocab, pair).await? {
            Some(coordinates) => Ok(TargetLocation::Resolved { pair: pair.clone(), coordinates }),
            None => Err(LocationError::Unlocated(pair.clone()).into()),
        },
        [] if !fallback.is_empty() => Ok(TargetLocation::Propagated {
            reference: reference.to_owned(),
            coordinates: fallback.to_vec(),
        }),
        [] => Err(LocationError::Missing { element: reference.to_owned() }.into()),
        _ => Ok(TargetLocation::SameAs { reference: reference.to_owned(), candidates: candidates.to_vec() }),
    }
}
