//! Scene state and geometry
//!
//! The scene graph is static: a camera whose projection comes from the
//! tracking context, a translated unit cube, and a torus knot. Only the
//! state mutated per tick lives in `SceneState`.

pub mod mesh;

use glam::{Mat4, Vec3};
use std::f32::consts::TAU;

/// Cube edge length.
pub const CUBE_SIZE: f32 = 1.0;
/// Cube material opacity (semi-transparent, double-sided).
pub const CUBE_OPACITY: f32 = 0.5;
/// Torus knot major radius.
pub const KNOT_RADIUS: f32 = 0.3;
/// Torus knot tube radius.
pub const KNOT_TUBE: f32 = 0.1;
pub const KNOT_TUBULAR_SEGMENTS: u32 = 64;
pub const KNOT_RADIAL_SEGMENTS: u32 = 16;
/// Height of the knot above the marker plane.
pub const KNOT_HEIGHT: f32 = 0.5;

/// Per-tick mutable scene state.
///
/// Written by the tracking-update and animation callbacks, read by the
/// render callback later in the same tick.
#[derive(Clone, Copy, Debug)]
pub struct SceneState {
    /// Projection matrix, overwritten by the tracking context once ready.
    pub projection: Mat4,
    /// Camera transform relative to the marker, from the last detection.
    pub marker_pose: Mat4,
    /// Whether the tracker currently sees the marker.
    pub camera_visible: bool,
    /// Top-level scene visibility, mirrored from `camera_visible`.
    pub scene_visible: bool,
    /// Torus knot rotation about X, advanced every tick.
    pub knot_rotation_x: f32,
}

impl SceneState {
    pub fn new() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            marker_pose: Mat4::IDENTITY,
            camera_visible: false,
            scene_visible: false,
            knot_rotation_x: 0.0,
        }
    }

    /// Model matrix for the cube: resting on the marker plane.
    pub fn cube_model(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, CUBE_SIZE / 2.0, 0.0))
    }

    /// Model matrix for the torus knot: raised and spinning about X.
    pub fn knot_model(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, KNOT_HEIGHT, 0.0))
            * Mat4::from_rotation_x(self.knot_rotation_x % TAU)
    }

    /// Combined view-projection for the current marker pose.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.marker_pose.inverse()
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_initial_scene_is_hidden() {
        let scene = SceneState::new();
        assert!(!scene.camera_visible);
        assert!(!scene.scene_visible);
    }

    #[test]
    fn test_cube_rests_on_marker_plane() {
        let scene = SceneState::new();
        // The cube's bottom face (y = -0.5 in model space) lands at y = 0.
        let bottom = scene.cube_model() * Vec4::new(0.0, -CUBE_SIZE / 2.0, 0.0, 1.0);
        assert!(bottom.y.abs() < 1e-6);
    }

    #[test]
    fn test_knot_model_tracks_rotation() {
        let mut scene = SceneState::new();
        scene.knot_rotation_x = std::f32::consts::FRAC_PI_2;
        // A point along +Y rotates onto +Z after a quarter turn about X.
        let p = scene.knot_model() * Vec4::new(0.0, 1.0, 0.0, 0.0);
        assert!(p.y.abs() < 1e-6);
        assert!((p.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_identity_pose_view_projection_is_projection() {
        let mut scene = SceneState::new();
        scene.projection = Mat4::perspective_rh(1.0, 4.0 / 3.0, 0.1, 100.0);
        assert!(scene.view_projection().abs_diff_eq(scene.projection, 1e-6));
    }
}
