//! CSV and JSON loaders for the bulk sources.
//!
//! # Facilities CSV
//!
//! ```csv
//! id,name,name_en,amenity,man_made,status,lat,lon,region
//! 1,Chitsime cha Mwale,Mwale Borehole,water_point,water_well,functional,-13.25,34.00,Central
//! ```
//!
//! `name_en`, `amenity`, `man_made`, `status` and `region` may be empty or
//! absent.  Unrecognised statuses load as `unknown`.
//!
//! # Roads CSV
//!
//! ```csv
//! id,source,target,cost,reverse_cost,oneway,name,fclass,excluded,geometry
//! 7,10,11,1090.5,1090.5,B,M1,primary,0,"[[34.0,-13.25],[34.01,-13.25]]"
//! 8,,,,,F,,track,,"[[34.01,-13.25],[34.02,-13.26]]"
//! ```
//!
//! Empty `source`/`target`/`cost`/`reverse_cost` fields are unset and left
//! for topology repair.  `geometry` is a JSON array of `[lon, lat]` pairs.
//! `oneway` takes the OSM shapefile codes `B`, `F`, `T`.  Costs may be
//! `inf` for a forbidden direction.
//!
//! # Population raster JSON
//!
//! The serde form of [`RasterGrid`].

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use wp_core::{EdgeId, Facility, FacilityId, FacilityStatus, GeoPoint, VertexId};
use wp_spatial::{OneWay, RoadSegment};

use crate::{LoadError, LoadResult, RasterGrid};

// ── CSV records ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FacilityRecord {
    id:       u32,
    name:     String,
    #[serde(default)]
    name_en:  Option<String>,
    #[serde(default)]
    amenity:  Option<String>,
    #[serde(default)]
    man_made: Option<String>,
    #[serde(default)]
    status:   Option<String>,
    lat:      f64,
    lon:      f64,
    #[serde(default)]
    region:   Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct RoadRecord {
    id:           u32,
    #[serde(default)]
    source:       Option<u32>,
    #[serde(default)]
    target:       Option<u32>,
    #[serde(default)]
    cost:         Option<f64>,
    #[serde(default)]
    reverse_cost: Option<f64>,
    #[serde(default)]
    oneway:       Option<String>,
    #[serde(default)]
    name:         Option<String>,
    #[serde(default)]
    fclass:       Option<String>,
    #[serde(default)]
    excluded:     Option<u8>,
    geometry:     String,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

impl RoadRecord {
    fn into_segment(self, record: u64) -> LoadResult<RoadSegment> {
        let pairs: Vec<[f64; 2]> = serde_json::from_str(&self.geometry).map_err(|e| LoadError::Invalid {
            record,
            message: format!("edge {}: bad geometry: {e}", self.id),
        })?;
        let geometry: Vec<GeoPoint> = pairs.into_iter().map(GeoPoint::from_lon_lat).collect();
        if let Some(bad) = geometry.iter().find(|p| !p.is_valid()) {
            return Err(LoadError::Invalid {
                record,
                message: format!("edge {}: coordinate {bad} out of range", self.id),
            });
        }
        for (label, cost) in [("cost", self.cost), ("reverse_cost", self.reverse_cost)] {
            if cost.is_some_and(|c| c.is_nan() || c < 0.0) {
                return Err(LoadError::Invalid {
                    record,
                    message: format!("edge {}: {label} must be non-negative", self.id),
                });
            }
        }

        Ok(RoadSegment {
            id:           EdgeId(self.id),
            geometry,
            cost:         self.cost,
            reverse_cost: self.reverse_cost,
            source:       self.source.map(VertexId),
            target:       self.target.map(VertexId),
            oneway:       self.oneway.as_deref().map(OneWay::parse).unwrap_or_default(),
            name:         non_empty(self.name),
            fclass:       non_empty(self.fclass),
            excluded:     self.excluded.is_some_and(|x| x != 0),
        })
    }
}

// ── Facilities ────────────────────────────────────────────────────────────────

/// Load facilities from a CSV file.
pub fn load_facilities_csv(path: &Path) -> LoadResult<Vec<Facility>> {
    let file = std::fs::File::open(path)?;
    load_facilities_reader(file)
}

/// Like [`load_facilities_csv`] but accepts any `Read` source.
pub fn load_facilities_reader<R: Read>(reader: R) -> LoadResult<Vec<Facility>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for (i, result) in csv_reader.deserialize::<FacilityRecord>().enumerate() {
        let rec = result?;
        let position = GeoPoint::new(rec.lat, rec.lon);
        if !position.is_valid() {
            return Err(LoadError::Invalid {
                record:  i as u64 + 1,
                message: format!("facility {}: coordinate {position} out of range", rec.id),
            });
        }
        out.push(Facility {
            id:       FacilityId(rec.id),
            name:     rec.name,
            name_en:  non_empty(rec.name_en),
            amenity:  non_empty(rec.amenity),
            man_made: non_empty(rec.man_made),
            status:   rec.status.as_deref().map(FacilityStatus::parse).unwrap_or_default(),
            position,
            region:   non_empty(rec.region),
        });
    }
    log::info!("loaded {} facilities", out.len());
    Ok(out)
}

// ── Roads ─────────────────────────────────────────────────────────────────────

/// Load road segments from a CSV file.
pub fn load_roads_csv(path: &Path) -> LoadResult<Vec<RoadSegment>> {
    let file = std::fs::File::open(path)?;
    load_roads_reader(file)
}

/// Like [`load_roads_csv`] but accepts any `Read` source.
pub fn load_roads_reader<R: Read>(reader: R) -> LoadResult<Vec<RoadSegment>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for (i, result) in csv_reader.deserialize::<RoadRecord>().enumerate() {
        out.push(result?.into_segment(i as u64 + 1)?);
    }
    let unlinked = out.iter().filter(|s| !s.is_linked()).count();
    log::info!("loaded {} road segments ({unlinked} unlinked)", out.len());
    Ok(out)
}

/// Overlay a repair journal (rows in the roads CSV format, as written by
/// [`CsvTopologyStore`](crate::CsvTopologyStore)) onto `segments`.
///
/// The last journal row for an edge wins.  Rows for unknown edges are
/// ignored.  Returns the number of segments replaced.
pub fn apply_repair_journal<R: Read>(segments: &mut [RoadSegment], journal: R) -> LoadResult<usize> {
    let mut latest: HashMap<EdgeId, RoadSegment> = HashMap::new();
    for seg in load_roads_reader(journal)? {
        latest.insert(seg.id, seg);
    }

    let mut applied = 0;
    for seg in segments.iter_mut() {
        if let Some(repaired) = latest.remove(&seg.id) {
            *seg = repaired;
            applied += 1;
        }
    }
    if !latest.is_empty() {
        log::warn!("repair journal: {} rows for unknown edges ignored", latest.len());
    }
    log::info!("repair journal: {applied} segments restored");
    Ok(applied)
}

// ── Raster ────────────────────────────────────────────────────────────────────

/// Load a population raster from a JSON file.
pub fn load_raster_json(path: &Path) -> LoadResult<RasterGrid> {
    let file = std::fs::File::open(path)?;
    load_raster_reader(std::io::BufReader::new(file))
}

/// Like [`load_raster_json`] but accepts any `Read` source.
pub fn load_raster_reader<R: Read>(reader: R) -> LoadResult<RasterGrid> {
    let grid: RasterGrid = serde_json::from_reader(reader)?;
    grid.validate().map_err(|message| LoadError::Invalid { record: 1, message })?;
    log::info!("loaded {}x{} population raster", grid.rows, grid.cols);
    Ok(grid)
}
