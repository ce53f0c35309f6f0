//! Facility (water point) records.

use std::fmt;

use crate::{FacilityId, GeoPoint};

/// Operational status of a facility as recorded by the inventory.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FacilityStatus {
    Functional,
    NonFunctional,
    PartiallyFunctional,
    #[default]
    Unknown,
}

impl FacilityStatus {
    /// Lenient parse of the status strings found in inventory exports.
    ///
    /// Case, surrounding whitespace and `_`/`-`/space separators are ignored.
    /// Anything unrecognised maps to [`FacilityStatus::Unknown`].
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "functional" | "working" => Self::Functional,
            "nonfunctional" | "broken" | "notworking" => Self::NonFunctional,
            "partiallyfunctional" | "partlyfunctional" | "partial" => Self::PartiallyFunctional,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Functional => "functional",
            Self::NonFunctional => "non-functional",
            Self::PartiallyFunctional => "partially-functional",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FacilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point of interest with a functional status.  Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Facility {
    pub id:       FacilityId,
    pub name:     String,
    /// English display name, when the import carries one.
    pub name_en:  Option<String>,
    /// OSM `amenity` tag (e.g. `water_point`, `drinking_water`).
    pub amenity:  Option<String>,
    /// OSM `man_made` tag (e.g. `water_well`).
    pub man_made: Option<String>,
    pub status:   FacilityStatus,
    pub position: GeoPoint,
    /// Owning administrative region.
    pub region:   Option<String>,
}

impl Facility {
    /// Minimal constructor; optional attributes start empty.
    pub fn new(id: FacilityId, name: impl Into<String>, status: FacilityStatus, position: GeoPoint) -> Self {
        Self {
            id,
            name: name.into(),
            name_en: None,
            amenity: None,
            man_made: None,
            status,
            position,
            region: None,
        }
    }

    /// English name when present, otherwise the primary name.
    pub fn display_name(&self) -> &str {
        self.name_en
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}
