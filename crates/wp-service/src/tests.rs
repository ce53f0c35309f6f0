//! Unit tests for wp-service.
//!
//! Fixtures: four vertices on the parallel at 13.25°S, 0.01° of longitude
//! (~1.08 km) apart, and five facilities, four next to a vertex and one far
//! off the road network.

#[cfg(test)]
mod fixtures {
    use std::sync::Arc;

    use wp_core::{EdgeId, Facility, FacilityId, FacilityStatus, GeoPoint, ServiceConfig, VertexId};
    use wp_spatial::RoadSegment;

    use crate::{FacilityService, FacilityServiceBuilder, RasterGrid};

    pub fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    pub const LONS: [f64; 4] = [34.00, 34.01, 34.02, 34.03];

    pub fn config() -> ServiceConfig {
        ServiceConfig { route_workers: Some(2), ..ServiceConfig::default() }
    }

    /// Linked but uncosted: `1 ─1─ 2 ─2─ 3 ─3─ 4`.
    pub fn roads() -> Vec<RoadSegment> {
        (0..3)
            .map(|i| {
                RoadSegment::new(EdgeId(i as u32 + 1), vec![p(-13.25, LONS[i]), p(-13.25, LONS[i + 1])])
                    .linked(VertexId(i as u32 + 1), VertexId(i as u32 + 2))
            })
            .collect()
    }

    /// An unlinked segment nowhere near the network.
    pub fn stray_road() -> RoadSegment {
        RoadSegment::new(EdgeId(9), vec![p(-13.50, 34.50), p(-13.51, 34.50)])
    }

    pub fn facilities() -> Vec<Facility> {
        let mut out: Vec<Facility> = LONS
            .iter()
            .enumerate()
            .map(|(i, &lon)| {
                Facility::new(FacilityId(i as u32 + 1), format!("Borehole {}", i + 1), FacilityStatus::Functional, p(-13.25, lon + 0.0005))
            })
            .collect();
        out.push(Facility::new(FacilityId(5), "Remote well", FacilityStatus::NonFunctional, p(-13.40, 34.50)));
        out
    }

    /// 10 × 10 cells of 0.01°, 100 people each, north-west corner at
    /// (-13.20, 33.95).  (-13.25, 34.0) is a cell corner in the middle.
    pub fn raster() -> RasterGrid {
        RasterGrid {
            origin_lat:    -13.20,
            origin_lon:    33.95,
            cell_size_deg: 0.01,
            rows:          10,
            cols:          10,
            values:        vec![100.0; 100],
            nodata:        None,
        }
    }

    pub fn builder() -> FacilityServiceBuilder {
        FacilityServiceBuilder::new(config())
            .facilities(facilities())
            .roads(roads())
            .population(Arc::new(raster()))
    }

    pub fn started() -> FacilityService {
        builder().start().unwrap()
    }
}

// ── Nearest facilities ────────────────────────────────────────────────────────

#[cfg(test)]
mod nearest {
    use std::collections::HashSet;

    use wp_core::{EdgeId, FacilityId};

    use super::fixtures::{p, started};
    use crate::RouteOutcome;

    #[test]
    fn five_results_sorted_and_unique() {
        let service = started();
        let results = service.get_nearest(-13.25, 34.0, Some(5)).unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));
        let ids: HashSet<FacilityId> = results.iter().map(|r| r.facility.id).collect();
        assert_eq!(ids.len(), 5);
        let order: Vec<u32> = results.iter().map(|r| r.facility.id.0).collect();
        assert_eq!(order, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn default_k_from_config() {
        let service = started();
        assert_eq!(service.get_nearest(-13.25, 34.0, None).unwrap().len(), 5);
        assert_eq!(service.get_nearest(-13.25, 34.0, Some(2)).unwrap().len(), 2);
        assert!(service.get_nearest(-13.25, 34.0, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn oversized_k_returns_every_facility() {
        let service = started();
        let results = service.get_nearest(-13.25, 34.0, Some(usize::MAX)).unwrap();
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn routes_follow_the_road() {
        let service = started();
        let results = service.get_nearest(-13.25, 34.0, Some(5)).unwrap();

        // Facility 1 snaps to the origin vertex itself.
        let first = results[0].route.route().unwrap();
        assert!(first.is_trivial());
        assert_eq!(first.coordinates, [p(-13.25, 34.00)]);

        let third = results[2].route.route().unwrap();
        assert_eq!(third.edges, [EdgeId(1), EdgeId(2)]);
        assert_eq!(third.coordinates, [p(-13.25, 34.00), p(-13.25, 34.01), p(-13.25, 34.02)]);
        let expected = p(-13.25, 34.00).distance_m(p(-13.25, 34.02));
        assert!((third.cost - expected).abs() < 1.0, "{} vs {expected}", third.cost);
    }

    #[test]
    fn unreachable_candidate_keeps_rank() {
        let service = started();
        let results = service.get_nearest(-13.25, 34.0, Some(5)).unwrap();
        assert_eq!(results[4].facility.id, FacilityId(5));
        assert_eq!(results[4].route, RouteOutcome::Unreachable);
        assert!(results[..4].iter().all(|r| !r.route.is_unreachable()));
    }

    #[test]
    fn origin_off_network_reports_all_unreachable() {
        let service = started();
        let results = service.get_nearest(-13.60, 34.0, Some(3)).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.route.is_unreachable()));
    }

    #[test]
    fn json_shape() {
        let service = started();
        let results = service.get_nearest(-13.25, 34.0, Some(5)).unwrap();
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json[2]["route"][1], serde_json::json!([34.01, -13.25]));
        assert!(json[4]["route"].is_null());
        assert_eq!(json[4]["facility"]["status"], "non-functional");
    }

    #[test]
    fn invalid_point_is_an_error() {
        let service = started();
        assert!(service.get_nearest(95.0, 34.0, Some(1)).is_err());
    }
}

// ── Buffer aggregation ────────────────────────────────────────────────────────

#[cfg(test)]
mod buffer {
    use std::f64::consts::PI;
    use std::sync::Arc;

    use wp_core::FacilityId;
    use wp_core::geo::EARTH_RADIUS_M;
    use wp_spatial::SpatialIndex;

    use super::fixtures::{builder, config, facilities, p, raster};
    use crate::{BufferAggregator, FacilityServiceBuilder, PopulationSource, RasterGrid, ServiceError};

    fn aggregator() -> BufferAggregator {
        BufferAggregator::new(Some(Arc::new(raster())), 8, 250.0)
    }

    #[test]
    fn zero_radius_is_empty() {
        let service = builder().build().unwrap();
        let summary = service.get_population_in_buffer(-13.25, 34.0, Some(0.0)).unwrap();
        assert_eq!(summary.facility_count, 0);
        assert_eq!(summary.population, 0.0);
    }

    #[test]
    fn negative_radius_rejected() {
        let service = builder().build().unwrap();
        assert!(matches!(
            service.get_population_in_buffer(-13.25, 34.0, Some(-1.0)),
            Err(ServiceError::InvalidRadius(_))
        ));
    }

    #[test]
    fn monotone_in_radius() {
        let agg = aggregator();
        let center = p(-13.25, 34.0);
        let mut last = 0.0;
        for r in [50.0, 200.0, 500.0, 800.0, 1_500.0, 3_000.0, 6_000.0, 20_000.0] {
            let pop = agg.population_within(center, r);
            assert!(pop >= last, "r={r}: {pop} < {last}");
            last = pop;
        }
    }

    #[test]
    fn whole_raster_inside() {
        let pop = aggregator().population_within(p(-13.25, 34.0), 100_000.0);
        assert!((pop - 10_000.0).abs() < 1e-6, "{pop}");
    }

    #[test]
    fn partial_cells_are_clipped() {
        // A 500 m disk is about 0.65 of one cell's area, split over four.
        let pop = aggregator().population_within(p(-13.25, 34.0), 500.0);
        assert!(pop > 40.0 && pop < 90.0, "{pop}");
    }

    #[test]
    fn nodata_counts_as_zero() {
        let grid = RasterGrid {
            origin_lat:    -13.0,
            origin_lon:    34.0,
            cell_size_deg: 0.01,
            rows:          1,
            cols:          2,
            values:        vec![-9999.0, 50.0],
            nodata:        Some(-9999.0),
        };
        let agg = BufferAggregator::new(Some(Arc::new(grid)), 4, 250.0);
        let pop = agg.population_within(p(-13.005, 34.01), 50_000.0);
        assert!((pop - 50.0).abs() < 1e-9, "{pop}");
    }

    /// One 0.1° cell at the equator holding 1000 people.
    fn single_cell() -> BufferAggregator {
        let grid = RasterGrid {
            origin_lat:    0.1,
            origin_lon:    0.0,
            cell_size_deg: 0.1,
            rows:          1,
            cols:          1,
            values:        vec![1000.0],
            nodata:        None,
        };
        BufferAggregator::new(Some(Arc::new(grid)), 8, 250.0)
    }

    /// Share of a `cell_deg` square at the equator covered by a cap of
    /// radius `r`, times `value`.
    fn cap_share(r: f64, cell_deg: f64, value: f64) -> f64 {
        let cap = 2.0 * PI * EARTH_RADIUS_M * EARTH_RADIUS_M * (1.0 - (r / EARTH_RADIUS_M).cos());
        let cell = EARTH_RADIUS_M * EARTH_RADIUS_M * cell_deg.to_radians() * cell_deg.to_radians().sin();
        value * cap / cell
    }

    #[test]
    fn small_disk_inside_large_cell() {
        let agg = single_cell();
        for r in [500.0, 900.0, 1_000.0, 3_000.0] {
            let pop = agg.population_within(p(0.05, 0.05), r);
            let expected = cap_share(r, 0.1, 1000.0);
            assert!((pop - expected).abs() / expected < 0.03, "r={r}: {pop} vs {expected}");
        }
    }

    #[test]
    fn monotone_inside_one_cell() {
        let agg = single_cell();
        let mut last = 0.0;
        for i in 1..=80 {
            let r = i as f64 * 100.0;
            let pop = agg.population_within(p(0.05, 0.05), r);
            assert!(pop >= last, "r={r}: {pop} < {last}");
            last = pop;
        }
    }

    #[test]
    fn disk_across_antimeridian() {
        // Global 0.1° band around the equator, one person per cell.
        let grid = RasterGrid {
            origin_lat:    0.1,
            origin_lon:    -180.0,
            cell_size_deg: 0.1,
            rows:          2,
            cols:          3600,
            values:        vec![1.0; 7200],
            nodata:        None,
        };
        let agg = BufferAggregator::new(Some(Arc::new(grid)), 8, 250.0);
        let across = agg.population_within(p(0.0, 179.99), 5_000.0);
        let inland = agg.population_within(p(0.0, 0.01), 5_000.0);
        assert!((across - inland).abs() < 1e-6, "{across} vs {inland}");
        let expected = cap_share(5_000.0, 0.1, 1.0);
        assert!((across - expected).abs() / expected < 0.03, "{across} vs {expected}");
    }

    #[test]
    fn counts_facilities_in_disk() {
        let service = builder().build().unwrap();
        // Facilities 1 and 2 sit ~54 m and ~1.14 km east of the centre.
        let summary = service.get_population_in_buffer(-13.25, 34.0, Some(1_500.0)).unwrap();
        assert_eq!(summary.facility_count, 2);
        assert_eq!(summary.source, PopulationSource::Raster);
        assert!(summary.population > 0.0);
    }

    #[test]
    fn proxy_without_raster() {
        let service = FacilityServiceBuilder::new(config()).facilities(facilities()).build().unwrap();
        let summary = service.get_population_in_buffer(-13.25, 34.0, Some(1_500.0)).unwrap();
        assert_eq!(summary.source, PopulationSource::FacilityProxy);
        assert_eq!(summary.facility_count, 2);
        assert_eq!(summary.population, 500.0);
    }

    #[test]
    fn default_radius_used() {
        let service = builder().build().unwrap();
        let default = service.get_population_in_buffer(-13.25, 34.0, None).unwrap();
        let explicit = service.get_population_in_buffer(-13.25, 34.0, Some(5_000.0)).unwrap();
        assert_eq!(default, explicit);
        // 5 km reaches facility 4 (~3.3 km) but not facility 5.
        assert_eq!(default.facility_count, 4);
    }

    #[test]
    fn summarise_directly() {
        let index = SpatialIndex::build(facilities().into_iter().map(|f| (f.id, f.position)));
        let summary = aggregator().summarise(&index, p(-13.25, 34.0), 100.0).unwrap();
        assert_eq!(summary.facility_count, 1);
        let hits = index.within(p(-13.25, 34.0), 100.0).unwrap();
        assert_eq!(hits[0].id, FacilityId(1));
    }
}

// ── Service lifecycle ─────────────────────────────────────────────────────────

#[cfg(test)]
mod lifecycle {
    use std::sync::{Arc, mpsc};
    use std::thread;

    use wp_core::EdgeId;
    use wp_spatial::{RoadSegment, SpatialResult, TopologyStore};

    use super::fixtures::{builder, roads, stray_road};
    use crate::ServiceError;

    #[test]
    fn not_ready_before_repair() {
        let service = builder().build().unwrap();
        assert!(!service.is_ready());
        assert!(matches!(service.get_nearest(-13.25, 34.0, None), Err(ServiceError::NotReady)));
        // Buffer queries do not touch the road graph.
        assert!(service.get_population_in_buffer(-13.25, 34.0, None).is_ok());

        service.repair_topology().unwrap();
        assert!(service.is_ready());
        assert!(service.get_nearest(-13.25, 34.0, None).is_ok());
    }

    #[test]
    fn repair_is_idempotent() {
        let mut segments = roads();
        segments.push(stray_road());
        let service = builder().roads(segments).build().unwrap();

        let first = service.repair_topology().unwrap();
        assert_eq!(first.unlinked_edges_found, 1);
        assert_eq!(first.edges_excluded, 1);
        assert_eq!(first.excluded_ids, [EdgeId(9)]);
        assert_eq!(first.costs_repaired, 3);
        assert_eq!(first.writes, 4);
        let after_first = service.segments();

        let second = service.repair_topology().unwrap();
        assert_eq!(second.writes, 0);
        assert_eq!(second.unlinked_edges_found, 1);
        assert_eq!(second.excluded_ids, [EdgeId(9)]);
        assert_eq!(service.segments(), after_first);
    }

    #[test]
    fn snapshot_swapped_after_repair() {
        let service = builder().build().unwrap();
        let before = service.snapshot();
        assert!(before.graph.is_empty());
        service.repair_topology().unwrap();
        let after = service.snapshot();
        assert_eq!(after.graph.node_count(), 4);
        // The old snapshot is still usable by whoever holds it.
        assert!(before.graph.is_empty());

        // No changes: the current snapshot is kept.
        service.repair_topology().unwrap();
        assert!(Arc::ptr_eq(&after, &service.snapshot()));
    }

    /// Blocks inside `persist` until the test releases it.
    struct GateStore {
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl TopologyStore for GateStore {
        fn persist(&mut self, _segment: &RoadSegment) -> SpatialResult<()> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Ok(())
        }
    }

    #[test]
    fn concurrent_repair_conflicts() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let store = GateStore { entered: entered_tx, release: release_rx };
        let service = Arc::new(builder().store(Box::new(store)).build().unwrap());

        let worker = {
            let service = Arc::clone(&service);
            thread::spawn(move || service.repair_topology())
        };
        entered_rx.recv().unwrap();
        assert!(matches!(service.repair_topology(), Err(ServiceError::RepairWriteConflict)));

        drop(release_tx);
        let summary = worker.join().unwrap().unwrap();
        assert_eq!(summary.writes, 3);
        assert!(service.is_ready());
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = super::fixtures::config();
        config.samples_per_axis = 0;
        let result = crate::FacilityServiceBuilder::new(config).build();
        assert!(matches!(result, Err(ServiceError::Core(_))));
    }
}

// ── Loaders ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod loader {
    use std::io::Cursor;

    use wp_core::{EdgeId, FacilityId, FacilityStatus, VertexId};
    use wp_spatial::OneWay;

    use crate::{LoadError, load_facilities_reader, load_raster_reader, load_roads_reader};

    #[test]
    fn facilities_csv() {
        let csv = "id,name,name_en,amenity,man_made,status,lat,lon,region\n\
                   1,Chitsime cha Mwale,Mwale Borehole,water_point,water_well,Non Functional,-13.25,34.0,Central\n\
                   2,Mpopi,,,,,-13.30,34.1,\n";
        let facilities = load_facilities_reader(Cursor::new(csv)).unwrap();
        assert_eq!(facilities.len(), 2);

        let first = &facilities[0];
        assert_eq!(first.id, FacilityId(1));
        assert_eq!(first.status, FacilityStatus::NonFunctional);
        assert_eq!(first.display_name(), "Mwale Borehole");
        assert_eq!(first.man_made.as_deref(), Some("water_well"));
        assert_eq!(first.region.as_deref(), Some("Central"));

        let second = &facilities[1];
        assert_eq!(second.status, FacilityStatus::Unknown);
        assert_eq!(second.name_en, None);
        assert_eq!(second.region, None);
    }

    #[test]
    fn facility_out_of_range() {
        let csv = "id,name,name_en,amenity,man_made,status,lat,lon,region\n\
                   1,Bad,,,,,-113.25,34.0,\n";
        assert!(matches!(
            load_facilities_reader(Cursor::new(csv)),
            Err(LoadError::Invalid { record: 1, .. })
        ));
    }

    #[test]
    fn roads_csv() {
        let csv = r#"id,source,target,cost,reverse_cost,oneway,name,fclass,excluded,geometry
7,10,11,1090.5,inf,F,M1,primary,0,"[[34.0,-13.25],[34.01,-13.25]]"
8,,,,,B,,track,,"[[34.01,-13.25],[34.02,-13.26]]"
"#;
        let roads = load_roads_reader(Cursor::new(csv)).unwrap();
        assert_eq!(roads.len(), 2);

        let linked = &roads[0];
        assert_eq!(linked.id, EdgeId(7));
        assert_eq!(linked.source, Some(VertexId(10)));
        assert_eq!(linked.cost, Some(1090.5));
        assert_eq!(linked.reverse_cost, Some(f64::INFINITY));
        assert_eq!(linked.oneway, OneWay::Forward);
        assert_eq!(linked.name.as_deref(), Some("M1"));
        assert_eq!(linked.geometry[1].lon, 34.01);

        let unlinked = &roads[1];
        assert!(!unlinked.is_linked());
        assert!(!unlinked.is_costed());
        assert!(!unlinked.excluded);
        assert_eq!(unlinked.name, None);
        assert_eq!(unlinked.fclass.as_deref(), Some("track"));
    }

    #[test]
    fn bad_geometry() {
        let csv = "id,source,target,cost,reverse_cost,oneway,name,fclass,excluded,geometry\n\
                   3,,,,,B,,,,not-json\n";
        assert!(matches!(load_roads_reader(Cursor::new(csv)), Err(LoadError::Invalid { record: 1, .. })));
    }

    #[test]
    fn raster_json() {
        let json = r#"{"origin_lat":-13.2,"origin_lon":33.95,"cell_size_deg":0.01,"rows":1,"cols":2,"values":[1.0,2.0]}"#;
        let grid = load_raster_reader(Cursor::new(json)).unwrap();
        assert_eq!(grid.cols, 2);
        assert_eq!(grid.nodata, None);

        let short = r#"{"origin_lat":-13.2,"origin_lon":33.95,"cell_size_deg":0.01,"rows":2,"cols":2,"values":[1.0]}"#;
        assert!(matches!(load_raster_reader(Cursor::new(short)), Err(LoadError::Invalid { .. })));
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod store {
    use std::fs::File;
    use std::io::Cursor;

    use wp_core::{EdgeId, VertexId};
    use wp_spatial::{OneWay, RoadSegment, TopologyStore};

    use super::fixtures::{builder, p, roads, stray_road};
    use crate::{CsvTopologyStore, apply_repair_journal, load_roads_reader, write_roads_csv};

    #[test]
    fn roads_csv_round_trip() {
        let segments = vec![
            RoadSegment::new(EdgeId(1), vec![p(-13.25, 34.0), p(-13.2512, 34.0123)])
                .linked(VertexId(1), VertexId(2))
                .costed(1234.5, f64::INFINITY)
                .with_oneway(OneWay::Forward),
            RoadSegment::new(EdgeId(2), vec![p(-13.26, 34.1), p(-13.27, 34.2)]),
        ];
        let mut buf = Vec::new();
        write_roads_csv(&mut buf, &segments).unwrap();
        let loaded = load_roads_reader(Cursor::new(buf)).unwrap();
        assert_eq!(loaded, segments);
    }

    #[test]
    fn journal_makes_restart_write_free() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repairs.csv");

        let mut segments = roads();
        segments.push(stray_road());
        let first = builder()
            .roads(segments.clone())
            .store(Box::new(CsvTopologyStore::open(&path).unwrap()))
            .start()
            .unwrap();
        let repaired = first.segments();

        // Next start: unrepaired table plus the journal.
        let mut restored = segments;
        let applied = apply_repair_journal(&mut restored, File::open(&path).unwrap()).unwrap();
        assert_eq!(applied, 4);
        assert_eq!(restored, repaired);

        let second = builder()
            .roads(restored)
            .store(Box::new(CsvTopologyStore::open(&path).unwrap()))
            .build()
            .unwrap();
        let summary = second.repair_topology().unwrap();
        assert_eq!(summary.writes, 0);
        assert_eq!(summary.excluded_ids, [EdgeId(9)]);

        // Header plus four rows; the reopen appended nothing.
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn store_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.csv");
        let mut store = CsvTopologyStore::open(&path).unwrap();
        for seg in roads() {
            store.persist(&seg).unwrap();
        }
        assert_eq!(store.rows_written(), 3);
        assert_eq!(store.path(), path.as_path());
        assert_eq!(load_roads_reader(File::open(&path).unwrap()).unwrap(), roads());
    }
}
