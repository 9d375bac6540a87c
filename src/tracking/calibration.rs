//! Camera calibration loading.
//!
//! Pinhole intrinsics loaded from a JSON file, turned into the projection
//! matrix the tracking context hands to the scene camera.

use std::path::Path;

use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};

use super::TrackingError;

fn default_near() -> f32 {
    0.1
}

fn default_far() -> f32 {
    100.0
}

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Calibrated image width in pixels.
    pub image_width: u32,
    /// Calibrated image height in pixels.
    pub image_height: u32,
    /// Focal length, x, in pixels.
    pub fx: f32,
    /// Focal length, y, in pixels.
    pub fy: f32,
    /// Principal point x.
    pub cx: f32,
    /// Principal point y.
    pub cy: f32,
    /// Near clipping plane.
    #[serde(default = "default_near")]
    pub near: f32,
    /// Far clipping plane.
    #[serde(default = "default_far")]
    pub far: f32,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            image_width: 640,
            image_height: 480,
            fx: 600.0,
            fy: 600.0,
            cx: 320.0,
            cy: 240.0,
            near: default_near(),
            far: default_far(),
        }
    }
}

impl CameraIntrinsics {
    /// Load intrinsics from a JSON file.
    pub fn load(path: &Path) -> Result<Self, TrackingError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrackingError::CalibrationLoadFailed(format!("{}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            TrackingError::CalibrationLoadFailed(format!("{}: {e}", path.display()))
        })
    }

    /// Projection matrix for a right-handed camera looking down -Z, with
    /// wgpu's 0..1 clip-space depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        let w = self.image_width as f32;
        let h = self.image_height as f32;
        let r = self.far / (self.near - self.far);

        Mat4::from_cols(
            Vec4::new(2.0 * self.fx / w, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * self.fy / h, 0.0, 0.0),
            Vec4::new(2.0 * self.cx / w - 1.0, 2.0 * self.cy / h - 1.0, r, -1.0),
            Vec4::new(0.0, 0.0, r * self.near, 0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let intrinsics = CameraIntrinsics::default();
        let text = serde_json::to_string(&intrinsics).unwrap();
        let back: CameraIntrinsics = serde_json::from_str(&text).unwrap();
        assert_eq!(back.image_width, 640);
        assert_eq!(back.fx, 600.0);
        assert_eq!(back.near, 0.1);
    }

    #[test]
    fn test_near_far_default_when_omitted() {
        let json = r#"{
            "image_width": 640, "image_height": 480,
            "fx": 600.0, "fy": 600.0, "cx": 320.0, "cy": 240.0
        }"#;
        let intrinsics: CameraIntrinsics = serde_json::from_str(json).unwrap();
        assert_eq!(intrinsics.near, 0.1);
        assert_eq!(intrinsics.far, 100.0);
    }

    #[test]
    fn test_projection_focal_scaling() {
        let intrinsics = CameraIntrinsics::default();
        let m = intrinsics.projection_matrix();
        assert!((m.col(0).x - 2.0 * 600.0 / 640.0).abs() < 1e-6);
        assert!((m.col(1).y - 2.0 * 600.0 / 480.0).abs() < 1e-6);
        // Perspective divide by -z.
        assert_eq!(m.col(2).w, -1.0);
        // Centered principal point has no off-axis shear.
        assert_eq!(m.col(2).x, 0.0);
        assert_eq!(m.col(2).y, 0.0);
    }

    #[test]
    fn test_projection_depth_range() {
        let intrinsics = CameraIntrinsics::default();
        let m = intrinsics.projection_matrix();

        // A point on the near plane maps to depth 0.
        let near = m * Vec4::new(0.0, 0.0, -intrinsics.near, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);

        // A point on the far plane maps to depth 1.
        let far = m * Vec4::new(0.0, 0.0, -intrinsics.far, 1.0);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_load_missing_file_is_calibration_error() {
        let err = CameraIntrinsics::load(Path::new("/nonexistent/camera.json")).unwrap_err();
        assert!(matches!(err, TrackingError::CalibrationLoadFailed(_)));
    }
}
