//! `wp-core` — foundational types for the water point routing core.
//!
//! This crate is a dependency of every other `wp-*` crate.  It has no `wp-*`
//! dependencies and minimal external ones (only `thiserror`, plus optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `FacilityId`, `VertexId`, `EdgeId`, `NodeIdx`, `ArcId` |
//! | [`geo`]         | `GeoPoint`, haversine distance, polyline length, `BBox` |
//! | [`facility`]    | `Facility`, `FacilityStatus`                          |
//! | [`config`]      | `ServiceConfig`                                       |
//! | [`error`]       | `CoreError`, `CoreResult`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod config;
pub mod error;
pub mod facility;
pub mod geo;
pub mod ids;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::ServiceConfig;
pub use error::{CoreError, CoreResult};
pub use facility::{Facility, FacilityStatus};
pub use geo::{BBox, GeoPoint, polyline_length_m};
pub use ids::{ArcId, EdgeId, FacilityId, NodeIdx, VertexId};
