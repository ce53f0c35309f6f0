//! `wp-spatial` — spatial indexing, road graph, topology repair, and routing.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                    |
//! |-------------|-------------------------------------------------------------|
//! | [`index`]   | `SpatialIndex<I>` (R-tree over ECEF points), `Neighbor`    |
//! | [`network`] | `RoadSegment`, `OneWay`, `RoadGraph` (CSR), `Vertex`       |
//! | [`locator`] | `VertexLocator` (coordinate → nearest vertex)              |
//! | [`repair`]  | `TopologyRepairer`, `RepairReport`, `TopologyStore`        |
//! | [`router`]  | `Router` trait, `Route`, `DijkstraRouter`                  |
//! | [`error`]   | `SpatialError`, `SpatialResult<T>`                         |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on public types.           |

pub mod error;
pub mod index;
pub mod locator;
pub mod network;
pub mod repair;
pub mod router;


pub use error::{SpatialError, SpatialResult};
pub use index::{Neighbor, SpatialIndex};
pub use locator::VertexLocator;
pub use network::{OneWay, RoadGraph, RoadSegment, Vertex, collect_vertices};
pub use repair::{
    Endpoint, MemoryTopologyStore, NullTopologyStore, RepairIssue, RepairReport, TopologyRepairer,
    TopologyStore,
};
pub use router::{DijkstraRouter, Route, Router};
