//! Nearest facilities by straight-line distance, each with a road route.
//!
//! # Ranking vs. routing
//!
//! Candidates are ranked purely by geodesic distance from the query point
//! (ties by ascending facility id).  The route is supplementary: a candidate
//! whose route cannot be found keeps its rank and is reported with
//! [`RouteOutcome::Unreachable`].  Route length never reorders results.
//!
//! # Concurrency
//!
//! The K route lookups only read the shared snapshot, so they fan out on a
//! bounded `rayon` pool owned by the finder and are joined in rank order.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::FxHashMap;
use serde::Serialize;

use wp_core::{Facility, FacilityId, GeoPoint, VertexId};
use wp_spatial::{Route, Router, SpatialIndex, SpatialResult};

use crate::{RoutingSnapshot, ServiceResult};

// ── Result types ──────────────────────────────────────────────────────────────

/// Route to a candidate, or the unreachable sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Found(Route),
    Unreachable,
}

impl RouteOutcome {
    pub fn route(&self) -> Option<&Route> {
        match self {
            Self::Found(r) => Some(r),
            Self::Unreachable => None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable)
    }
}

/// One ranked candidate.
#[derive(Debug, Clone, Serialize)]
pub struct NearestFacility {
    pub facility:   Facility,
    /// Geodesic distance from the query point, metres.
    pub distance_m: f64,
    /// Road geometry as `[lon, lat]` pairs; serialises as `null` when
    /// unreachable.
    #[serde(serialize_with = "serialize_route")]
    pub route:      RouteOutcome,
}

fn serialize_route<S: serde::Serializer>(route: &RouteOutcome, s: S) -> Result<S::Ok, S::Error> {
    route.route().map(Route::lon_lat).serialize(s)
}

// ── NearestFacilityFinder ─────────────────────────────────────────────────────

pub struct NearestFacilityFinder {
    facilities: Vec<Facility>,
    by_id:      FxHashMap<FacilityId, usize>,
    index:      SpatialIndex<FacilityId>,
    pool:       ThreadPool,
}

impl NearestFacilityFinder {
    /// Index `facilities` and start a pool of `workers` route threads.
    ///
    /// Duplicate ids keep the first record.  Facilities with invalid
    /// coordinates are dropped.
    pub fn new(facilities: Vec<Facility>, workers: usize) -> ServiceResult<Self> {
        let mut kept: Vec<Facility> = Vec::with_capacity(facilities.len());
        let mut by_id: FxHashMap<FacilityId, usize> =
            FxHashMap::with_capacity_and_hasher(facilities.len(), Default::default());
        for f in facilities {
            if !f.position.is_valid() {
                log::warn!("facility {}: invalid position {}, skipped", f.id, f.position);
                continue;
            }
            if by_id.contains_key(&f.id) {
                log::warn!("facility {}: duplicate id, keeping first record", f.id);
                continue;
            }
            by_id.insert(f.id, kept.len());
            kept.push(f);
        }

        let index = SpatialIndex::build(kept.iter().map(|f| (f.id, f.position)));
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("wp-route-{i}"))
            .build()?;
        log::info!("facility index: {} facilities, {} route workers", kept.len(), workers.max(1));

        Ok(Self { facilities: kept, by_id, index, pool })
    }

    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    pub fn index(&self) -> &SpatialIndex<FacilityId> {
        &self.index
    }

    pub fn get(&self, id: FacilityId) -> Option<&Facility> {
        self.by_id.get(&id).map(|&i| &self.facilities[i])
    }

    /// The `k` facilities nearest `point`, each with a route over
    /// `snapshot`.
    ///
    /// # Errors
    ///
    /// Only request-level failures: an empty facility index or an invalid
    /// query point.  Per-candidate routing failures are reported inline.
    pub fn find_nearest(
        &self,
        snapshot: &RoutingSnapshot,
        router: &dyn Router,
        point: GeoPoint,
        k: usize,
    ) -> SpatialResult<Vec<NearestFacility>> {
        let hits = self.index.nearest(point, k)?;

        let origin = match snapshot.locator.try_snap(point) {
            Ok(v) => Some(v),
            Err(e) => {
                log::debug!("nearest {point}: origin not snapped: {e}");
                None
            }
        };

        let results = self.pool.install(|| {
            hits.par_iter()
                .map(|hit| {
                    let facility = &self.facilities[self.by_id[&hit.id]];
                    NearestFacility {
                        facility:   facility.clone(),
                        distance_m: hit.distance_m,
                        route:      route_to(snapshot, router, origin, facility),
                    }
                })
                .collect::<Vec<_>>()
        });
        Ok(results)
    }
}

fn route_to(
    snapshot: &RoutingSnapshot,
    router: &dyn Router,
    origin: Option<VertexId>,
    facility: &Facility,
) -> RouteOutcome {
    let Some(from) = origin else {
        return RouteOutcome::Unreachable;
    };
    let to = match snapshot.locator.try_snap(facility.position) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("facility {}: destination not snapped: {e}", facility.id);
            return RouteOutcome::Unreachable;
        }
    };
    match router.shortest_path(&snapshot.graph, from, to) {
        Ok(route) => RouteOutcome::Found(route),
        Err(e) => {
            log::debug!("facility {}: {e}", facility.id);
            RouteOutcome::Unreachable
        }
    }
}
