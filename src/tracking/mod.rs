//! Marker tracking session
//!
//! Narrow interface over the marker tracker plus the `TrackingSession`
//! constructed once both the video source and the tracking context have
//! initialized. The session is passed explicitly to the per-tick pipeline;
//! there is no ambient tracking state.

pub mod calibration;
mod detector;
mod error;

pub use calibration::CameraIntrinsics;
pub use detector::OnnxTracker;
pub use error::TrackingError;

use glam::Mat4;

use crate::config::StageConfig;
use crate::source::{resolve_orientation, Orientation, SourceFrame};

/// Result of one tracking update.
#[derive(Clone, Copy, Debug)]
pub struct MarkerState {
    /// True when the marker is currently detected.
    pub visible: bool,
    /// Camera transform relative to the marker, valid when `visible`.
    pub pose: Mat4,
}

impl Default for MarkerState {
    fn default() -> Self {
        Self {
            visible: false,
            pose: Mat4::IDENTITY,
        }
    }
}

/// Exactly the tracker operations the demo uses, so tests can substitute
/// a mock.
pub trait TrackingContext {
    /// Feed one frame to the tracker.
    fn update(&mut self, frame: &SourceFrame) -> Result<MarkerState, TrackingError>;

    /// Projection matrix derived from the camera calibration.
    fn projection_matrix(&self) -> Mat4;

    /// Set the processing orientation of incoming frames.
    fn set_orientation(&mut self, orientation: Orientation);

    /// Keep the tracker's processing extents matched to the source.
    fn set_processing_size(&mut self, width: u32, height: u32);
}

/// Owns the tracking context for the lifetime of the demo.
pub struct TrackingSession {
    context: Box<dyn TrackingContext>,
}

impl TrackingSession {
    /// Initialize tracking from the calibration and pattern resources,
    /// orienting the context from the actual source dimensions.
    pub fn init(
        config: &StageConfig,
        source_width: u32,
        source_height: u32,
    ) -> Result<Self, TrackingError> {
        let intrinsics = CameraIntrinsics::load(&config.calibration_path)?;
        let mut tracker = OnnxTracker::new(
            &config.pattern_path,
            intrinsics,
            config.confidence_threshold,
        )?;

        let orientation = resolve_orientation(source_width, source_height);
        log::info!("Source orientation: {:?}", orientation);
        tracker.set_orientation(orientation);
        tracker.set_processing_size(source_width, source_height);

        Ok(Self {
            context: Box::new(tracker),
        })
    }

    /// Wrap an existing context (used by tests).
    pub fn from_context(context: Box<dyn TrackingContext>) -> Self {
        Self { context }
    }

    pub fn update(&mut self, frame: &SourceFrame) -> Result<MarkerState, TrackingError> {
        self.context.update(frame)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.context.projection_matrix()
    }

    pub fn set_processing_size(&mut self, width: u32, height: u32) {
        self.context.set_processing_size(width, height);
    }
}
