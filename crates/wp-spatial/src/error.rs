//! Spatial-subsystem error type.

use thiserror::Error;

use wp_core::{CoreError, EdgeId, VertexId};

/// Errors produced by `wp-spatial`.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The index was queried before any data was loaded.
    #[error("spatial index is empty")]
    IndexEmpty,

    /// No vertex lies within the snap radius of the coordinate.
    #[error("nearest vertex is {distance_m:.1} m away (max {max_m:.1} m)")]
    VertexSnapFailed { distance_m: f64, max_m: f64 },

    /// Both vertices exist but no arc sequence connects them.
    #[error("no path from {from} to {to}")]
    PathNotFound { from: VertexId, to: VertexId },

    /// The search settled `explored` vertices without reaching the target.
    #[error("search from {from} to {to} gave up after {explored} vertices")]
    SearchLimitExceeded { from: VertexId, to: VertexId, explored: usize },

    #[error("vertex {0} not found in graph")]
    VertexNotFound(VertexId),

    #[error("edge {edge} is not routable: {reason}")]
    InvalidEdge { edge: EdgeId, reason: &'static str },

    #[error("topology store error: {0}")]
    Store(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SpatialError {
    /// `true` for the outcomes a caller reports as "unreachable" rather than
    /// as a failure of the request.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound { .. }
                | Self::SearchLimitExceeded { .. }
                | Self::VertexSnapFailed { .. }
                | Self::VertexNotFound(_)
        )
    }
}

pub type SpatialResult<T> = Result<T, SpatialError>;
