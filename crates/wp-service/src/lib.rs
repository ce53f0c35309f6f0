//! `wp-service` — the query side of the water point routing core.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`snapshot`] | `RoutingSnapshot` (immutable graph + vertex locator)       |
//! | [`nearest`]  | `NearestFacilityFinder`, `NearestFacility`, `RouteOutcome` |
//! | [`buffer`]   | `BufferAggregator`, `PopulationGrid`, `RasterGrid`         |
//! | [`loader`]   | CSV / JSON loaders for facilities, roads, rasters          |
//! | [`store`]    | `CsvTopologyStore` (repair journal), `write_roads_csv`     |
//! | [`service`]  | `FacilityService`, `FacilityServiceBuilder`                |
//! | [`error`]    | `ServiceError`, `LoadError`                                |
//!
//! # Lifecycle
//!
//! ```rust,ignore
//! let service = FacilityServiceBuilder::new(config)
//!     .facilities(load_facilities_csv(&facilities_path)?)
//!     .roads(load_roads_csv(&roads_path)?)
//!     .population(Arc::new(load_raster_json(&raster_path)?))
//!     .start()?;                     // repairs topology, then marks ready
//! let nearest = service.get_nearest(-13.25, 34.0, None)?;
//! ```

pub mod buffer;
pub mod error;
pub mod loader;
pub mod nearest;
pub mod service;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod tests;

pub use buffer::{BufferAggregator, BufferSummary, GridCell, PopulationGrid, PopulationSource, RasterGrid};
pub use error::{LoadError, LoadResult, ServiceError, ServiceResult};
pub use loader::{
    apply_repair_journal, load_facilities_csv, load_facilities_reader, load_raster_json,
    load_raster_reader, load_roads_csv, load_roads_reader,
};
pub use nearest::{NearestFacility, NearestFacilityFinder, RouteOutcome};
pub use service::{FacilityService, FacilityServiceBuilder, RepairSummary};
pub use snapshot::RoutingSnapshot;
pub use store::{CsvTopologyStore, write_roads_csv};
