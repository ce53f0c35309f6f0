//! Error types for wp-service.

use thiserror::Error;

use wp_core::CoreError;
use wp_spatial::SpatialError;

/// Errors surfaced by [`FacilityService`](crate::FacilityService) queries.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A routing query arrived before the first topology repair finished.
    #[error("service is not ready: topology repair has not completed")]
    NotReady,

    /// Another topology repair is already running.
    #[error("topology repair already in progress")]
    RepairWriteConflict,

    #[error("invalid buffer radius {0} m")]
    InvalidRadius(f64),

    #[error("could not start route worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from reading or writing import files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record {record}: {message}")]
    Invalid { record: u64, message: String },
}

pub type LoadResult<T> = Result<T, LoadError>;
