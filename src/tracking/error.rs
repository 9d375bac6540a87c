//! Tracking error taxonomy.

use thiserror::Error;

/// Errors surfaced by source acquisition and marker tracking.
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("failed to load camera calibration: {0}")]
    CalibrationLoadFailed(String),
    #[error("failed to load marker pattern model: {0}")]
    PatternLoadFailed(String),
    #[error("tracking initialization failed: {0}")]
    TrackingInitFailed(String),
    #[error("tracking update failed: {0}")]
    UpdateFailed(String),
}
