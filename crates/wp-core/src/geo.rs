//! Geographic coordinate type and geodesic utilities.
//!
//! `GeoPoint` uses `f64` latitude/longitude.  Facility positions and road
//! geometry come from a national import where single precision would put
//! snapped vertices metres apart from their source endpoints.

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per degree of latitude (and of longitude at the equator).
pub const METRES_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// A WGS-84 geographic coordinate.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build from a `[lon, lat]` pair, the GeoJSON coordinate order.
    #[inline]
    pub fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self { lat: pair[1], lon: pair[0] }
    }

    /// `[lon, lat]` pair, the GeoJSON coordinate order.
    #[inline]
    pub fn lon_lat(self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    /// `true` when both components are finite and inside the WGS-84 range.
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// Earth-centred cartesian coordinates on a sphere of [`EARTH_RADIUS_M`].
    ///
    /// Straight-line (chord) distance between two embedded points is a
    /// monotone function of great-circle distance, so a euclidean index over
    /// these coordinates ranks neighbours exactly as haversine would.
    pub fn to_ecef(self) -> [f64; 3] {
        let lat = self.lat.to_radians();
        let lon = self.lon.to_radians();
        [
            EARTH_RADIUS_M * lat.cos() * lon.cos(),
            EARTH_RADIUS_M * lat.cos() * lon.sin(),
            EARTH_RADIUS_M * lat.sin(),
        ]
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Chord length corresponding to a great-circle distance of `distance_m`.
///
/// Distances past half the circumference saturate at the diameter.
pub fn chord_for_distance(distance_m: f64) -> f64 {
    let half_angle = (distance_m / EARTH_RADIUS_M * 0.5).min(std::f64::consts::FRAC_PI_2);
    2.0 * EARTH_RADIUS_M * half_angle.sin()
}

/// Sum of haversine distances along a polyline.  Zero for fewer than two
/// points.
pub fn polyline_length_m(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|w| w[0].distance_m(w[1])).sum()
}

// ── BBox ──────────────────────────────────────────────────────────────────────

/// Axis-aligned bounding box in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BBox {
    /// Box that contains every point within `radius_m` of `center`.
    ///
    /// Slightly conservative: the longitude span uses the latitude of the
    /// box edge closest to the pole, where a degree of longitude is shortest.
    pub fn around(center: GeoPoint, radius_m: f64) -> Self {
        let d_lat = radius_m / METRES_PER_DEGREE;
        let min_lat = (center.lat - d_lat).max(-90.0);
        let max_lat = (center.lat + d_lat).min(90.0);

        let widest = min_lat.abs().max(max_lat.abs()).to_radians().cos();
        let d_lon = if widest <= 1e-9 {
            180.0
        } else {
            (radius_m / (METRES_PER_DEGREE * widest)).min(180.0)
        };

        Self {
            min_lat,
            min_lon: center.lon - d_lon,
            max_lat,
            max_lon: center.lon + d_lon,
        }
    }

    #[inline]
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat
            && p.lat <= self.max_lat
            && p.lon >= self.min_lon
            && p.lon <= self.max_lon
    }
}
