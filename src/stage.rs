//! Per-tick demo state
//!
//! The GPU-free part of the tick pipeline: tracking update, visibility
//! sync, and animation. The render callback lives with the GPU context in
//! `app`.

use std::f32::consts::PI;

use crate::scene::SceneState;
use crate::source::VideoSource;
use crate::tracking::{TrackingError, TrackingSession};

/// Everything the per-tick callbacks mutate, passed explicitly to the
/// scheduler rather than captured as ambient state.
pub struct Stage {
    /// Video source; `None` when the camera failed to open.
    pub source: Option<Box<dyn VideoSource>>,
    /// Tracking session; `None` until bootstrap completes.
    pub session: Option<TrackingSession>,
    pub scene: SceneState,
}

impl Stage {
    pub fn new(source: Option<Box<dyn VideoSource>>) -> Self {
        Self {
            source,
            session: None,
            scene: SceneState::new(),
        }
    }

    /// Tracking-update callback body. No-ops until both the source and the
    /// tracking session are ready.
    pub fn update_tracking(&mut self) -> Result<(), TrackingError> {
        let Some(source) = &self.source else {
            return Ok(());
        };
        let Some(session) = &mut self.session else {
            return Ok(());
        };
        if !source.ready() {
            return Ok(());
        }
        let Some(frame) = source.latest_frame() else {
            return Ok(());
        };

        let state = session.update(&frame)?;
        self.scene.camera_visible = state.visible;
        if state.visible {
            self.scene.marker_pose = state.pose;
        }
        Ok(())
    }

    /// Forward the source dimensions to the tracker. No-ops until a
    /// session exists, so a resize that arrives before bootstrap only
    /// touches the render surface.
    pub fn sync_processing_size(&mut self) {
        let Some(session) = &mut self.session else {
            return;
        };
        if let Some((width, height)) = self.source.as_ref().and_then(|source| source.dimensions())
        {
            session.set_processing_size(width, height);
        }
    }

    /// Visibility-sync callback body: mirrors, never inverts.
    pub fn sync_visibility(&mut self) {
        self.scene.scene_visible = self.scene.camera_visible;
    }

    /// Animation callback body: half a turn per second.
    pub fn advance_animation(&mut self, delta_seconds: f32) {
        self.scene.knot_rotation_x += PI * delta_seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Orientation, SourceFrame};
    use crate::tracking::{MarkerState, TrackingContext};
    use glam::Mat4;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    struct FakeSource {
        ready: bool,
        frame: Option<SourceFrame>,
    }

    impl FakeSource {
        fn ready_with_frame() -> Self {
            Self {
                ready: true,
                frame: Some(SourceFrame {
                    data: vec![0; 4],
                    width: 1,
                    height: 1,
                    frame_number: 0,
                    timestamp: Instant::now(),
                }),
            }
        }

        fn pending() -> Self {
            Self {
                ready: false,
                frame: None,
            }
        }

        fn ready_with_dimensions(width: u32, height: u32) -> Self {
            Self {
                ready: true,
                frame: Some(SourceFrame {
                    data: vec![0; (width * height * 4) as usize],
                    width,
                    height,
                    frame_number: 0,
                    timestamp: Instant::now(),
                }),
            }
        }
    }

    impl VideoSource for FakeSource {
        fn ready(&self) -> bool {
            self.ready
        }
        fn dimensions(&self) -> Option<(u32, u32)> {
            self.frame.as_ref().map(|f| (f.width, f.height))
        }
        fn latest_frame(&self) -> Option<SourceFrame> {
            self.frame.clone()
        }
    }

    struct FakeTracker {
        state: MarkerState,
        fail: bool,
        sizes: Rc<RefCell<Vec<(u32, u32)>>>,
    }

    impl FakeTracker {
        fn seeing(pose: Mat4) -> Self {
            Self {
                state: MarkerState {
                    visible: true,
                    pose,
                },
                fail: false,
                sizes: Rc::default(),
            }
        }

        fn blind() -> Self {
            Self {
                state: MarkerState::default(),
                fail: false,
                sizes: Rc::default(),
            }
        }
    }

    impl TrackingContext for FakeTracker {
        fn update(&mut self, _frame: &SourceFrame) -> Result<MarkerState, TrackingError> {
            if self.fail {
                return Err(TrackingError::UpdateFailed("boom".into()));
            }
            Ok(self.state)
        }
        fn projection_matrix(&self) -> Mat4 {
            Mat4::IDENTITY
        }
        fn set_orientation(&mut self, _orientation: Orientation) {}
        fn set_processing_size(&mut self, width: u32, height: u32) {
            self.sizes.borrow_mut().push((width, height));
        }
    }

    #[test]
    fn test_update_is_noop_without_session() {
        let mut stage = Stage::new(Some(Box::new(FakeSource::ready_with_frame())));
        stage.update_tracking().unwrap();
        assert!(!stage.scene.camera_visible);
        assert_eq!(stage.scene.marker_pose, Mat4::IDENTITY);
    }

    #[test]
    fn test_update_is_noop_until_source_ready() {
        let mut stage = Stage::new(Some(Box::new(FakeSource::pending())));
        stage.session = Some(TrackingSession::from_context(Box::new(
            FakeTracker::seeing(Mat4::IDENTITY),
        )));
        stage.update_tracking().unwrap();
        assert!(!stage.scene.camera_visible);
    }

    #[test]
    fn test_update_stores_pose_when_marker_visible() {
        let pose = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, -2.0));
        let mut stage = Stage::new(Some(Box::new(FakeSource::ready_with_frame())));
        stage.session = Some(TrackingSession::from_context(Box::new(
            FakeTracker::seeing(pose),
        )));

        stage.update_tracking().unwrap();
        assert!(stage.scene.camera_visible);
        assert_eq!(stage.scene.marker_pose, pose);
    }

    #[test]
    fn test_lost_marker_keeps_last_pose() {
        let pose = Mat4::from_translation(glam::Vec3::new(1.0, 0.0, 0.0));
        let mut stage = Stage::new(Some(Box::new(FakeSource::ready_with_frame())));
        stage.session = Some(TrackingSession::from_context(Box::new(
            FakeTracker::seeing(pose),
        )));
        stage.update_tracking().unwrap();

        stage.session = Some(TrackingSession::from_context(Box::new(FakeTracker::blind())));
        stage.update_tracking().unwrap();

        assert!(!stage.scene.camera_visible);
        assert_eq!(stage.scene.marker_pose, pose);
    }

    #[test]
    fn test_processing_size_sync_is_noop_without_session() {
        let mut stage = Stage::new(Some(Box::new(FakeSource::ready_with_frame())));
        stage.sync_processing_size();
        assert!(stage.session.is_none());
    }

    #[test]
    fn test_processing_size_sync_waits_for_source_dimensions() {
        let tracker = FakeTracker::blind();
        let sizes = Rc::clone(&tracker.sizes);
        let mut stage = Stage::new(Some(Box::new(FakeSource::pending())));
        stage.session = Some(TrackingSession::from_context(Box::new(tracker)));

        stage.sync_processing_size();
        assert!(sizes.borrow().is_empty());
    }

    #[test]
    fn test_processing_size_sync_forwards_source_dimensions() {
        let tracker = FakeTracker::blind();
        let sizes = Rc::clone(&tracker.sizes);
        let mut stage = Stage::new(Some(Box::new(FakeSource::ready_with_dimensions(640, 480))));
        stage.session = Some(TrackingSession::from_context(Box::new(tracker)));

        stage.sync_processing_size();
        assert_eq!(sizes.borrow().as_slice(), &[(640, 480)]);
    }

    #[test]
    fn test_visibility_mirrors_camera_flag() {
        let mut stage = Stage::new(None);

        stage.scene.camera_visible = true;
        stage.sync_visibility();
        assert!(stage.scene.scene_visible);

        stage.scene.camera_visible = false;
        stage.sync_visibility();
        assert!(!stage.scene.scene_visible);
    }

    #[test]
    fn test_animation_advances_half_turn_per_second() {
        let mut stage = Stage::new(None);
        stage.advance_animation(1.0);
        assert!((stage.scene.knot_rotation_x - PI).abs() < 1e-6);
        stage.advance_animation(0.5);
        assert!((stage.scene.knot_rotation_x - 1.5 * PI).abs() < 1e-6);
    }

    #[test]
    fn test_update_error_propagates() {
        let mut tracker = FakeTracker::blind();
        tracker.fail = true;
        let mut stage = Stage::new(Some(Box::new(FakeSource::ready_with_frame())));
        stage.session = Some(TrackingSession::from_context(Box::new(tracker)));

        let err = stage.update_tracking().unwrap_err();
        assert!(matches!(err, TrackingError::UpdateFailed(_)));
    }
}
