//! ONNX-backed marker pose tracker
//!
//! Marker detection itself is delegated to an ONNX model via ONNX Runtime;
//! this module only adapts frames in and poses out. The model contract:
//! input is a 1x256x256x3 NHWC RGB float tensor in [0, 1]; output is at
//! least 17 floats, the first 16 a column-major camera transform relative
//! to the marker, the 17th a detection confidence in [0, 1].

use std::path::Path;

use glam::Mat4;
use ndarray::Array4;

use super::{CameraIntrinsics, MarkerState, TrackingContext, TrackingError};
use crate::source::{Orientation, SourceFrame};

/// Side length of the model's square input, in pixels.
const INPUT_SIZE: u32 = 256;

/// Marker tracker backed by an ONNX Runtime session.
pub struct OnnxTracker {
    session: ort::session::Session,
    intrinsics: CameraIntrinsics,
    confidence_threshold: f32,
    orientation: Orientation,
}

impl OnnxTracker {
    /// Load the pose model and initialize the runtime.
    pub fn new(
        model_path: &Path,
        intrinsics: CameraIntrinsics,
        confidence_threshold: f32,
    ) -> Result<Self, TrackingError> {
        if !model_path.exists() {
            return Err(TrackingError::PatternLoadFailed(format!(
                "model not found: {}",
                model_path.display()
            )));
        }

        ort::init()
            .with_name("MarkerStage")
            .commit()
            .map_err(|e| TrackingError::TrackingInitFailed(format!("ORT init: {e}")))?;

        let session = ort::session::Session::builder()
            .map_err(|e| TrackingError::TrackingInitFailed(format!("session builder: {e}")))?
            .with_intra_threads(2)
            .map_err(|e| TrackingError::TrackingInitFailed(format!("session threads: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                TrackingError::PatternLoadFailed(format!("{}: {e}", model_path.display()))
            })?;

        log::info!("Loaded marker pose model from {:?}", model_path);

        Ok(Self {
            session,
            intrinsics,
            confidence_threshold,
            orientation: Orientation::Landscape,
        })
    }

    /// Resample an RGBA frame into the model's NHWC float input, rotating
    /// the sampling pattern for portrait sources.
    fn preprocess_nhwc(frame: &SourceFrame, orientation: Orientation) -> Vec<f32> {
        let mut output = vec![0.0f32; (INPUT_SIZE * INPUT_SIZE * 3) as usize];

        for y in 0..INPUT_SIZE {
            for x in 0..INPUT_SIZE {
                let u = x as f32 / INPUT_SIZE as f32;
                let v = y as f32 / INPUT_SIZE as f32;
                let (su, sv) = match orientation {
                    Orientation::Landscape => (u, v),
                    Orientation::Portrait => (v, 1.0 - u),
                };

                let src_x = ((su * frame.width as f32) as u32).min(frame.width.saturating_sub(1));
                let src_y = ((sv * frame.height as f32) as u32).min(frame.height.saturating_sub(1));
                let src_idx = ((src_y * frame.width + src_x) * 4) as usize;

                if src_idx + 2 < frame.data.len() {
                    let out_idx = ((y * INPUT_SIZE + x) * 3) as usize;
                    output[out_idx] = frame.data[src_idx] as f32 / 255.0;
                    output[out_idx + 1] = frame.data[src_idx + 1] as f32 / 255.0;
                    output[out_idx + 2] = frame.data[src_idx + 2] as f32 / 255.0;
                }
            }
        }

        output
    }
}

impl TrackingContext for OnnxTracker {
    fn update(&mut self, frame: &SourceFrame) -> Result<MarkerState, TrackingError> {
        let input = Self::preprocess_nhwc(frame, self.orientation);

        let input_array = Array4::from_shape_vec(
            (1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
            input,
        )
        .map_err(|e| TrackingError::UpdateFailed(format!("input shape: {e}")))?;

        let input_tensor = ort::value::Tensor::from_array(input_array)
            .map_err(|e| TrackingError::UpdateFailed(format!("input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| TrackingError::UpdateFailed(format!("inference: {e}")))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| TrackingError::UpdateFailed("no output from pose model".into()))?;

        let (_shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| TrackingError::UpdateFailed(format!("output tensor: {e}")))?;

        if data.len() < 17 {
            return Err(TrackingError::UpdateFailed(format!(
                "pose output too short: {} values",
                data.len()
            )));
        }

        let mut pose_values = [0.0f32; 16];
        pose_values.copy_from_slice(&data[..16]);
        let confidence = data[16];

        Ok(MarkerState {
            visible: confidence >= self.confidence_threshold,
            pose: Mat4::from_cols_array(&pose_values),
        })
    }

    fn projection_matrix(&self) -> Mat4 {
        self.intrinsics.projection_matrix()
    }

    fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// The model samples at a fixed 256x256, so the source size is only
    /// logged for diagnostics.
    fn set_processing_size(&mut self, width: u32, height: u32) {
        log::debug!("Source size for tracking: {}x{}", width, height);
    }
}
