//! The query façade: lifecycle, readiness, and the three public operations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, TryLockError};

use serde::Serialize;

use wp_core::{EdgeId, Facility, GeoPoint, ServiceConfig};
use wp_spatial::{
    DijkstraRouter, NullTopologyStore, RepairReport, RoadSegment, Router, TopologyRepairer, TopologyStore,
};

use crate::{
    BufferAggregator, BufferSummary, NearestFacility, NearestFacilityFinder, PopulationGrid, RoutingSnapshot,
    ServiceError, ServiceResult,
};

// ── RepairSummary ─────────────────────────────────────────────────────────────

/// What a [`FacilityService::repair_topology`] call did.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RepairSummary {
    pub unlinked_edges_found: usize,
    /// Number of segments left out of routing.
    pub edges_excluded:       usize,
    pub excluded_ids:         Vec<EdgeId>,
    pub links_repaired:       usize,
    pub costs_repaired:       usize,
    pub writes:               usize,
    /// Segments changed in memory but not accepted by the store.
    pub store_failures:       usize,
}

impl From<&RepairReport> for RepairSummary {
    fn from(r: &RepairReport) -> Self {
        Self {
            unlinked_edges_found: r.unlinked_edges_found,
            edges_excluded:       r.edges_excluded.len(),
            excluded_ids:         r.edges_excluded.clone(),
            links_repaired:       r.links_repaired,
            costs_repaired:       r.costs_repaired,
            writes:               r.writes,
            store_failures:       r.changed - r.writes,
        }
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Fluent builder for [`FacilityService`].
///
/// | Method            | Default                                        |
/// |-------------------|------------------------------------------------|
/// | `.facilities(v)`  | none (every nearest/buffer query `IndexEmpty`) |
/// | `.roads(v)`       | none (every route unreachable)                 |
/// | `.population(g)`  | none (facility-count proxy)                    |
/// | `.store(s)`       | `NullTopologyStore`                            |
/// | `.router(r)`      | `DijkstraRouter` capped at `max_explored_vertices` |
pub struct FacilityServiceBuilder {
    config:     ServiceConfig,
    facilities: Vec<Facility>,
    roads:      Vec<RoadSegment>,
    population: Option<Arc<dyn PopulationGrid>>,
    store:      Option<Box<dyn TopologyStore + Send>>,
    router:     Option<Box<dyn Router>>,
}

impl FacilityServiceBuilder {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            facilities: Vec::new(),
            roads:      Vec::new(),
            population: None,
            store:      None,
            router:     None,
        }
    }

    pub fn facilities(mut self, facilities: Vec<Facility>) -> Self {
        self.facilities = facilities;
        self
    }

    pub fn roads(mut self, roads: Vec<RoadSegment>) -> Self {
        self.roads = roads;
        self
    }

    pub fn population(mut self, grid: Arc<dyn PopulationGrid>) -> Self {
        self.population = Some(grid);
        self
    }

    /// Where repaired segments are persisted.
    pub fn store(mut self, store: Box<dyn TopologyStore + Send>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn router(mut self, router: Box<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    /// Validate the configuration and index the facilities.  The returned
    /// service is not ready: call [`FacilityService::repair_topology`]
    /// before routing queries.
    pub fn build(self) -> ServiceResult<FacilityService> {
        self.config.validate()?;

        let finder = NearestFacilityFinder::new(self.facilities, self.config.route_pool_size())?;
        let buffer = BufferAggregator::new(
            self.population,
            self.config.samples_per_axis,
            self.config.persons_per_facility,
        );
        let router: Box<dyn Router> = match self.router {
            Some(r) => r,
            None => Box::new(DijkstraRouter::new(self.config.max_explored_vertices)),
        };
        let store: Box<dyn TopologyStore + Send> = match self.store {
            Some(s) => s,
            None => Box::new(NullTopologyStore),
        };
        let snapshot = Arc::new(RoutingSnapshot::empty(self.config.max_snap_distance_m));

        Ok(FacilityService {
            config: self.config,
            finder,
            buffer,
            router,
            repair: Mutex::new(RepairState { segments: self.roads, store }),
            snapshot: RwLock::new(snapshot),
            ready: AtomicBool::new(false),
        })
    }

    /// [`build`](Self::build) followed by the first topology repair.
    pub fn start(self) -> ServiceResult<FacilityService> {
        let service = self.build()?;
        service.repair_topology()?;
        Ok(service)
    }
}

// ── FacilityService ───────────────────────────────────────────────────────────

struct RepairState {
    segments: Vec<RoadSegment>,
    store:    Box<dyn TopologyStore + Send>,
}

/// Nearest-facility and buffer queries over one facility set and road table.
///
/// All methods take `&self`; share the service across threads with `Arc`.
/// Queries read an immutable [`RoutingSnapshot`] and never block on a
/// running repair.
pub struct FacilityService {
    config:   ServiceConfig,
    finder:   NearestFacilityFinder,
    buffer:   BufferAggregator,
    router:   Box<dyn Router>,
    /// Single-writer lock over the segment table.
    repair:   Mutex<RepairState>,
    snapshot: RwLock<Arc<RoutingSnapshot>>,
    ready:    AtomicBool,
}

impl FacilityService {
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// `true` once a topology repair has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn finder(&self) -> &NearestFacilityFinder {
        &self.finder
    }

    /// The routing snapshot queries currently run on.
    pub fn snapshot(&self) -> Arc<RoutingSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Copy of the segment table.  Blocks while a repair is running.
    pub fn segments(&self) -> Vec<RoadSegment> {
        let guard = self.repair.lock().unwrap_or_else(|p| p.into_inner());
        guard.segments.clone()
    }

    /// Link and cost unrepaired segments, persist them, and swap in a
    /// rebuilt routing snapshot.  Marks the service ready.
    ///
    /// # Errors
    ///
    /// [`ServiceError::RepairWriteConflict`] if another repair holds the
    /// writer lock.  Per-segment failures are counted in the summary.
    pub fn repair_topology(&self) -> ServiceResult<RepairSummary> {
        let mut guard = match self.repair.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => return Err(ServiceError::RepairWriteConflict),
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };
        let state = &mut *guard;

        let report = TopologyRepairer::new(self.config.max_snap_distance_m)
            .repair(&mut state.segments, &mut *state.store);

        if report.changed > 0 || !self.is_ready() {
            let snapshot = Arc::new(RoutingSnapshot::build(&state.segments, self.config.max_snap_distance_m));
            log::info!(
                "routing snapshot: {} vertices, {} arcs",
                snapshot.graph.node_count(),
                snapshot.graph.arc_count()
            );
            match self.snapshot.write() {
                Ok(mut slot) => *slot = snapshot,
                Err(poisoned) => *poisoned.into_inner() = snapshot,
            }
        }
        self.ready.store(true, Ordering::Release);

        Ok(RepairSummary::from(&report))
    }

    /// The `k` facilities nearest `(lat, lon)` (default `default_k`), each
    /// with a road route or the unreachable marker.
    pub fn get_nearest(&self, lat: f64, lon: f64, k: Option<usize>) -> ServiceResult<Vec<NearestFacility>> {
        if !self.is_ready() {
            return Err(ServiceError::NotReady);
        }
        let point = GeoPoint::new(lat, lon);
        let k = k.unwrap_or(self.config.default_k);
        let snapshot = self.snapshot();

        let results = self.finder.find_nearest(&snapshot, &*self.router, point, k)?;
        log::debug!(
            "nearest {point} k={k}: {} results, {} unreachable",
            results.len(),
            results.iter().filter(|r| r.route.is_unreachable()).count()
        );
        Ok(results)
    }

    /// Facility count and population within `radius_m` (default
    /// `default_buffer_radius_m`) of `(lat, lon)`.  Does not need the road
    /// graph, so it works before the service is ready.
    pub fn get_population_in_buffer(&self, lat: f64, lon: f64, radius_m: Option<f64>) -> ServiceResult<BufferSummary> {
        let radius_m = radius_m.unwrap_or(self.config.default_buffer_radius_m);
        if radius_m.is_nan() || radius_m < 0.0 {
            return Err(ServiceError::InvalidRadius(radius_m));
        }
        Ok(self.buffer.summarise(self.finder.index(), GeoPoint::new(lat, lon), radius_m)?)
    }
}
