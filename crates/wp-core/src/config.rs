//! Service configuration.

use crate::{CoreError, CoreResult};

/// Top-level configuration for the routing core.
///
/// Typically loaded from a JSON file by the application crate and passed to
/// `FacilityService`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServiceConfig {
    /// Farthest a coordinate may be from a graph vertex and still snap to it.
    /// Used both by topology repair and by request-time snapping.
    pub max_snap_distance_m: f64,

    /// Vertices a single shortest-path search may settle before giving up
    /// and reporting the target unreachable.
    pub max_explored_vertices: usize,

    /// Worker threads for per-candidate route lookups.  `None` sizes the pool
    /// to `default_k`.
    pub route_workers: Option<usize>,

    /// Number of facilities returned by a nearest query when unspecified.
    pub default_k: usize,

    /// Buffer radius used when a request does not specify one.
    pub default_buffer_radius_m: f64,

    /// Latitude strips used to measure how much of a raster cell that
    /// straddles the buffer boundary lies inside it.
    pub samples_per_axis: u32,

    /// Persons attributed to each facility by the proxy population estimate
    /// used when no raster is loaded.
    pub persons_per_facility: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_snap_distance_m:     500.0,
            max_explored_vertices:   1_000_000,
            route_workers:           None,
            default_k:               5,
            default_buffer_radius_m: 5_000.0,
            samples_per_axis:        8,
            persons_per_facility:    250.0,
        }
    }
}

impl ServiceConfig {
    /// Reject values the rest of the core cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.max_snap_distance_m.is_finite() && self.max_snap_distance_m >= 0.0) {
            return Err(CoreError::Config(format!(
                "max_snap_distance_m must be a non-negative number, got {}",
                self.max_snap_distance_m
            )));
        }
        if self.max_explored_vertices == 0 {
            return Err(CoreError::Config("max_explored_vertices must be positive".into()));
        }
        if self.route_workers == Some(0) {
            return Err(CoreError::Config("route_workers must be positive when set".into()));
        }
        if !(self.default_buffer_radius_m.is_finite() && self.default_buffer_radius_m >= 0.0) {
            return Err(CoreError::Config(format!(
                "default_buffer_radius_m must be a non-negative number, got {}",
                self.default_buffer_radius_m
            )));
        }
        if self.samples_per_axis == 0 {
            return Err(CoreError::Config("samples_per_axis must be positive".into()));
        }
        if !(self.persons_per_facility.is_finite() && self.persons_per_facility >= 0.0) {
            return Err(CoreError::Config("persons_per_facility must be non-negative".into()));
        }
        Ok(())
    }

    /// Thread count for the route lookup pool.
    pub fn route_pool_size(&self) -> usize {
        self.route_workers.unwrap_or(self.default_k).max(1)
    }
}
