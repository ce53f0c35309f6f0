//! Population and facility counts inside a disk around a point.
//!
//! # Clipping
//!
//! The disk is defined by geodesic distance.  For every raster cell that
//! overlaps the disk's bounding box:
//!
//! - all four corners inside the disk → the whole cell value counts (the
//!   disk is convex, so the cell is fully covered);
//! - otherwise the value is scaled by the fraction of the cell's area inside
//!   the disk.  The latitude band shared by cell and disk is cut into `n`
//!   strips; in each strip the disk's longitude extent is exact and is
//!   clipped to the cell.  Strips follow the disk, so a disk much smaller
//!   than a cell is measured as finely as a large one.
//!
//! Longitudes are compared modulo 360°, so a disk crossing the antimeridian
//! picks up the cells on both sides.
//!
//! # Proxy estimate
//!
//! Without a raster the aggregator reports `facility_count ×
//! persons_per_facility` and flags it as [`PopulationSource::FacilityProxy`].
//! It is a rough fallback and not comparable with raster sums.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use wp_core::geo::EARTH_RADIUS_M;
use wp_core::{BBox, FacilityId, GeoPoint};
use wp_spatial::{SpatialIndex, SpatialResult};

// ── PopulationGrid ────────────────────────────────────────────────────────────

/// One raster cell and its value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GridCell {
    pub bounds: BBox,
    pub value:  f64,
}

/// A gridded scalar field queryable by bounding box.
pub trait PopulationGrid: Send + Sync {
    /// Call `f` for every cell that intersects `bbox`.  Cells without data
    /// may be skipped.
    fn for_each_cell(&self, bbox: &BBox, f: &mut dyn FnMut(GridCell));
}

/// Regular lat/lon raster, row-major from the north-west corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    /// Latitude of the top edge of row 0.
    pub origin_lat:    f64,
    /// Longitude of the left edge of column 0.
    pub origin_lon:    f64,
    pub cell_size_deg: f64,
    pub rows:          usize,
    pub cols:          usize,
    /// `rows × cols` values, row 0 first.
    pub values:        Vec<f64>,
    /// Value marking "no data".
    #[serde(default)]
    pub nodata:        Option<f64>,
}

impl RasterGrid {
    /// Check the shape invariants a deserialised raster may violate.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.cell_size_deg.is_finite() && self.cell_size_deg > 0.0) {
            return Err(format!("cell_size_deg must be positive, got {}", self.cell_size_deg));
        }
        if self.values.len() != self.rows * self.cols {
            return Err(format!(
                "expected {} values for {}x{} grid, got {}",
                self.rows * self.cols,
                self.rows,
                self.cols,
                self.values.len()
            ));
        }
        if !GeoPoint::new(self.origin_lat, self.origin_lon).is_valid() {
            return Err(format!("invalid origin ({}, {})", self.origin_lat, self.origin_lon));
        }
        Ok(())
    }

    pub fn cell_bounds(&self, row: usize, col: usize) -> BBox {
        let max_lat = self.origin_lat - row as f64 * self.cell_size_deg;
        let min_lon = self.origin_lon + col as f64 * self.cell_size_deg;
        BBox {
            min_lat: max_lat - self.cell_size_deg,
            min_lon,
            max_lat,
            max_lon: min_lon + self.cell_size_deg,
        }
    }

    /// Usable value of a cell: nodata, negative, and non-finite read as 0.
    pub fn value(&self, row: usize, col: usize) -> f64 {
        let v = self.values[row * self.cols + col];
        if self.nodata.is_some_and(|nd| v == nd) || !v.is_finite() || v < 0.0 {
            0.0
        } else {
            v
        }
    }

    /// Half-open index range of cells along one axis overlapping `[lo, hi]`
    /// measured as an offset from the origin.
    fn span(&self, lo: f64, hi: f64, len: usize) -> std::ops::Range<usize> {
        let start = (lo / self.cell_size_deg).floor().max(0.0);
        let end = (hi / self.cell_size_deg).ceil().max(0.0);
        let start = (start as usize).min(len);
        let end = (end as usize).min(len);
        start..end.max(start)
    }
}

impl PopulationGrid for RasterGrid {
    fn for_each_cell(&self, bbox: &BBox, f: &mut dyn FnMut(GridCell)) {
        let rows = self.span(self.origin_lat - bbox.max_lat, self.origin_lat - bbox.min_lat, self.rows);

        // The box may run past ±180°; look for the overflow one turn over.
        let mut cols: Vec<std::ops::Range<usize>> = [-360.0, 0.0, 360.0]
            .into_iter()
            .map(|shift| {
                self.span(bbox.min_lon + shift - self.origin_lon, bbox.max_lon + shift - self.origin_lon, self.cols)
            })
            .filter(|r| !r.is_empty())
            .collect();
        cols.sort_by_key(|r| r.start);
        let mut merged: Vec<std::ops::Range<usize>> = Vec::with_capacity(cols.len());
        for r in cols {
            match merged.last_mut() {
                Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
                _ => merged.push(r),
            }
        }

        for row in rows {
            for col in merged.iter().flat_map(|r| r.clone()) {
                let value = self.value(row, col);
                if value > 0.0 {
                    f(GridCell { bounds: self.cell_bounds(row, col), value });
                }
            }
        }
    }
}

// ── BufferAggregator ──────────────────────────────────────────────────────────

/// Where a [`BufferSummary::population`] figure came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PopulationSource {
    Raster,
    /// `facility_count × persons_per_facility`.  Do not rely on it.
    FacilityProxy,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct BufferSummary {
    pub facility_count: usize,
    pub population:     f64,
    pub source:         PopulationSource,
}

pub struct BufferAggregator {
    grid:                 Option<Arc<dyn PopulationGrid>>,
    samples_per_axis:     u32,
    persons_per_facility: f64,
}

impl BufferAggregator {
    pub fn new(grid: Option<Arc<dyn PopulationGrid>>, samples_per_axis: u32, persons_per_facility: f64) -> Self {
        Self { grid, samples_per_axis: samples_per_axis.max(1), persons_per_facility }
    }

    pub fn has_grid(&self) -> bool {
        self.grid.is_some()
    }

    /// Raster population inside the disk.  Zero without a raster or for a
    /// non-positive radius.
    pub fn population_within(&self, center: GeoPoint, radius_m: f64) -> f64 {
        let Some(grid) = &self.grid else { return 0.0 };
        if radius_m.is_nan() || radius_m <= 0.0 {
            return 0.0;
        }

        let bbox = BBox::around(center, radius_m);
        let mut total = 0.0;
        grid.for_each_cell(&bbox, &mut |cell: GridCell| {
            let fraction = self.covered_fraction(center, radius_m, &cell.bounds);
            total += cell.value * fraction;
        });
        total
    }

    /// Facility count and population inside the disk.
    pub fn summarise(
        &self,
        facilities: &SpatialIndex<FacilityId>,
        center: GeoPoint,
        radius_m: f64,
    ) -> SpatialResult<BufferSummary> {
        let facility_count = facilities.within(center, radius_m)?.len();
        let summary = match self.grid {
            Some(_) => BufferSummary {
                facility_count,
                population: self.population_within(center, radius_m),
                source:     PopulationSource::Raster,
            },
            None => BufferSummary {
                facility_count,
                population: facility_count as f64 * self.persons_per_facility,
                source:     PopulationSource::FacilityProxy,
            },
        };
        log::debug!(
            "buffer {center} r={radius_m} m: {} facilities, population {:.0} ({:?})",
            summary.facility_count,
            summary.population,
            summary.source
        );
        Ok(summary)
    }

    fn covered_fraction(&self, center: GeoPoint, radius_m: f64, cell: &BBox) -> f64 {
        let corners = [
            GeoPoint::new(cell.min_lat, cell.min_lon),
            GeoPoint::new(cell.min_lat, cell.max_lon),
            GeoPoint::new(cell.max_lat, cell.min_lon),
            GeoPoint::new(cell.max_lat, cell.max_lon),
        ];
        if corners.iter().all(|&c| center.distance_m(c) <= radius_m) {
            return 1.0;
        }

        // Angular radius; the disk spans exactly `lat ± d` in latitude.
        let d = radius_m / EARTH_RADIUS_M;
        if d >= std::f64::consts::PI {
            return 1.0;
        }
        let lat_lo = cell.min_lat.max(center.lat - d.to_degrees());
        let lat_hi = cell.max_lat.min(center.lat + d.to_degrees());
        if lat_hi <= lat_lo {
            return 0.0;
        }

        // Centre longitude moved to the turn nearest the cell.
        let cell_mid = 0.5 * (cell.min_lon + cell.max_lon);
        let c_lon = cell_mid + wrap_degrees(center.lon - cell_mid);
        let c_lat = center.lat.to_radians();

        let n = self.samples_per_axis;
        let step = (lat_hi - lat_lo) / n as f64;
        let mut covered = 0.0;
        for i in 0..n {
            let lat = lat_lo + (i as f64 + 0.5) * step;
            let half = half_width_deg(c_lat, lat.to_radians(), d);
            let lo = cell.min_lon.max(c_lon - half);
            let hi = cell.max_lon.min(c_lon + half);
            if hi > lo {
                covered += (hi - lo).to_radians() * lat.to_radians().cos();
            }
        }
        covered *= step.to_radians();

        let cell_area = (cell.max_lon - cell.min_lon).to_radians()
            * (cell.max_lat.to_radians().sin() - cell.min_lat.to_radians().sin());
        if cell_area <= 0.0 {
            return 0.0;
        }
        (covered / cell_area).clamp(0.0, 1.0)
    }
}

/// `x` folded into `[-180, 180)`.
fn wrap_degrees(x: f64) -> f64 {
    (x + 180.0).rem_euclid(360.0) - 180.0
}

/// Half the longitude extent, in degrees, of a spherical cap of angular
/// radius `d` centred at latitude `c_lat`, measured along latitude `lat`
/// (both radians).  Zero where the parallel misses the cap.
fn half_width_deg(c_lat: f64, lat: f64, d: f64) -> f64 {
    let denom = lat.cos() * c_lat.cos();
    let num = d.cos() - lat.sin() * c_lat.sin();
    if denom <= 1e-12 {
        // At a pole: the whole parallel or nothing.
        return if num <= 0.0 { 180.0 } else { 0.0 };
    }
    let cos_dl = num / denom;
    if cos_dl >= 1.0 {
        0.0
    } else if cos_dl <= -1.0 {
        180.0
    } else {
        cos_dl.acos().to_degrees()
    }
}
