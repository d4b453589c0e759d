//! Records mirrored from the datastore.
//!
//! The sync engine is generic over [`Record`]; the concrete shapes here are
//! built from raw table rows the same way the rest of the application reads
//! them: missing names get a placeholder, unknown genders collapse to
//! `Unknown`, and empty strings count as absent.

use crate::RecordId;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A domain entity the sync engine can hold in a collection.
pub trait Record: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Datastore table the record lives in.
    const TABLE: &'static str;

    /// Unique identity.
    fn id(&self) -> &RecordId;

    /// Secondary duplicate signal for near-simultaneous inserts of what is
    /// semantically the same entity. `None` opts the record out.
    fn natural_key(&self) -> Option<NaturalKey>;

    /// Builds the record from a raw table row.
    fn from_row(row: serde_json::Value) -> crate::Result<Self>;
}

/// Normalized non-id attributes used as a secondary identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    name: String,
    discriminant: String,
}

impl NaturalKey {
    /// Creates a key; the name is trimmed and lowercased.
    pub fn new(name: &str, discriminant: impl Into<String>) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            discriminant: discriminant.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn discriminant(&self) -> &str {
        &self.discriminant
    }
}

/// Recorded sex of an animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        }
    }

    fn from_column(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("male") => Self::Male,
            Some("female") => Self::Female,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_id(value: Option<String>) -> Option<RecordId> {
    non_empty(value).map(RecordId::from)
}

fn require_id(id: Option<String>, table: &str) -> crate::Result<RecordId> {
    non_empty_id(id).ok_or_else(|| crate::Error::MalformedRow(format!("{table} row without id")))
}

fn parse_row<T: DeserializeOwned>(row: serde_json::Value, table: &str) -> crate::Result<T> {
    if !row.is_object() {
        return Err(crate::Error::MalformedRow(format!(
            "{table} row is not an object"
        )));
    }
    Ok(serde_json::from_value(row)?)
}

// ── Bird ─────────────────────────────────────────────────────────

/// Placeholder name for birds stored without one.
pub const UNNAMED_BIRD: &str = "Unnamed bird";

/// A bird in the breeder's flock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bird {
    pub id: RecordId,
    pub name: String,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_id: Option<RecordId>,
}

impl Bird {
    /// Creates a bird with only the required fields set.
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, gender: Gender) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gender,
            color: None,
            birth_date: None,
            ring_number: None,
            photo: None,
            health_notes: None,
            mother_id: None,
            father_id: None,
        }
    }

    /// Sets the color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Sets the ring number.
    #[must_use]
    pub fn with_ring_number(mut self, ring: impl Into<String>) -> Self {
        self.ring_number = Some(ring.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct BirdRow {
    id: Option<String>,
    name: Option<String>,
    gender: Option<String>,
    color: Option<String>,
    birth_date: Option<NaiveDate>,
    ring_number: Option<String>,
    photo_url: Option<String>,
    health_notes: Option<String>,
    mother_id: Option<String>,
    father_id: Option<String>,
}

impl Record for Bird {
    const TABLE: &'static str = "birds";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn natural_key(&self) -> Option<NaturalKey> {
        Some(NaturalKey::new(&self.name, self.gender.as_str()))
    }

    fn from_row(row: serde_json::Value) -> crate::Result<Self> {
        let row: BirdRow = parse_row(row, Self::TABLE)?;
        Ok(Self {
            id: require_id(row.id, Self::TABLE)?,
            name: non_empty(row.name).unwrap_or_else(|| UNNAMED_BIRD.to_string()),
            gender: Gender::from_column(row.gender.as_deref()),
            color: non_empty(row.color),
            birth_date: row.birth_date,
            ring_number: non_empty(row.ring_number),
            photo: non_empty(row.photo_url),
            health_notes: non_empty(row.health_notes),
            mother_id: non_empty_id(row.mother_id),
            father_id: non_empty_id(row.father_id),
        })
    }
}

// ── Chick ────────────────────────────────────────────────────────

/// Placeholder name for chicks stored without one.
pub const UNNAMED_CHICK: &str = "Unnamed chick";

/// A chick hatched from a tracked clutch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chick {
    pub id: RecordId,
    pub name: String,
    pub gender: Gender,
    /// Clutch (incubation) the chick hatched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clutch_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hatch_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egg_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egg_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_id: Option<RecordId>,
}

impl Chick {
    /// Creates a chick with only the required fields set.
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, gender: Gender) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gender,
            clutch_id: None,
            hatch_date: None,
            egg_id: None,
            egg_number: None,
            color: None,
            ring_number: None,
            photo: None,
            health_notes: None,
            mother_id: None,
            father_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChickRow {
    id: Option<String>,
    name: Option<String>,
    gender: Option<String>,
    incubation_id: Option<String>,
    clutch_id: Option<String>,
    hatch_date: Option<NaiveDate>,
    egg_id: Option<String>,
    egg_number: Option<u32>,
    color: Option<String>,
    ring_number: Option<String>,
    photo_url: Option<String>,
    health_notes: Option<String>,
    mother_id: Option<String>,
    father_id: Option<String>,
}

impl Record for Chick {
    const TABLE: &'static str = "chicks";

    fn id(&self) -> &RecordId {
        &self.id
    }

    // Unnamed chicks in one clutch routinely share the placeholder name and
    // gender, so they never match by natural key.
    fn natural_key(&self) -> Option<NaturalKey> {
        if self.name == UNNAMED_CHICK {
            return None;
        }
        Some(NaturalKey::new(&self.name, self.gender.as_str()))
    }

    fn from_row(row: serde_json::Value) -> crate::Result<Self> {
        let row: ChickRow = parse_row(row, Self::TABLE)?;
        Ok(Self {
            id: require_id(row.id, Self::TABLE)?,
            name: non_empty(row.name).unwrap_or_else(|| UNNAMED_CHICK.to_string()),
            gender: Gender::from_column(row.gender.as_deref()),
            clutch_id: non_empty_id(row.incubation_id).or_else(|| non_empty_id(row.clutch_id)),
            hatch_date: row.hatch_date,
            egg_id: non_empty_id(row.egg_id),
            egg_number: row.egg_number,
            color: non_empty(row.color),
            ring_number: non_empty(row.ring_number),
            photo: non_empty(row.photo_url),
            health_notes: non_empty(row.health_notes),
            mother_id: non_empty_id(row.mother_id),
            father_id: non_empty_id(row.father_id),
        })
    }
}
