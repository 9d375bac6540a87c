//! Video source module
//!
//! Cross-platform webcam capture using the nokhwa crate. Frames are
//! captured on a background thread and the latest frame is exposed to the
//! main render loop through a triple buffer. Also hosts the orientation
//! rules that map viewport and source dimensions to capture resolution and
//! tracker processing orientation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use parking_lot::Mutex;

use crate::tracking::TrackingError;

/// Capture resolution requested for landscape viewports.
pub const LANDSCAPE_CAPTURE: (u32, u32) = (640, 480);
/// Capture resolution requested for portrait (and square) viewports.
pub const PORTRAIT_CAPTURE: (u32, u32) = (480, 640);

/// Processing orientation of a video frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

/// Landscape iff width > height; equal dimensions resolve to portrait.
///
/// Used both to size the requested capture resolution and to set the
/// tracker's processing orientation, so every call site must go through
/// this one rule.
pub fn resolve_orientation(width: u32, height: u32) -> Orientation {
    if width > height {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    }
}

/// Capture resolution to request for a viewport of the given size.
pub fn capture_resolution(viewport_width: u32, viewport_height: u32) -> (u32, u32) {
    match resolve_orientation(viewport_width, viewport_height) {
        Orientation::Landscape => LANDSCAPE_CAPTURE,
        Orientation::Portrait => PORTRAIT_CAPTURE,
    }
}

/// One decoded camera frame, RGBA8.
#[derive(Clone)]
pub struct SourceFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
    pub timestamp: Instant,
}

/// The narrow view of a video source the demo actually uses.
///
/// `CameraSource` is the production implementation; tests substitute their
/// own.
pub trait VideoSource {
    /// True once at least one frame has been decoded.
    fn ready(&self) -> bool;

    /// Actual source dimensions, known only after the first decoded frame.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Latest decoded frame, if any.
    fn latest_frame(&self) -> Option<SourceFrame>;

    /// Orientation of the actual source, `None` until dimensions are known.
    fn orientation(&self) -> Option<Orientation> {
        self.dimensions().map(|(w, h)| resolve_orientation(w, h))
    }
}

/// Webcam capture running on a background thread.
pub struct CameraSource {
    /// Triple-buffered latest frames.
    frames: [Arc<Mutex<Option<SourceFrame>>>; 3],
    /// Index of the latest complete frame.
    latest_frame_idx: Arc<AtomicU64>,
    /// Set once the first frame has been decoded.
    ready: Arc<AtomicBool>,
    /// Actual frame dimensions, filled in by the capture thread.
    dimensions: Arc<Mutex<Option<(u32, u32)>>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl CameraSource {
    /// Open camera `camera_index`, requesting `width`x`height`.
    ///
    /// The camera may deliver a different resolution; the actual dimensions
    /// become available through [`VideoSource::dimensions`] once the first
    /// frame decodes.
    pub fn new(camera_index: u32, width: u32, height: u32) -> Result<Self, TrackingError> {
        let frames: [Arc<Mutex<Option<SourceFrame>>>; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let latest_frame_idx = Arc::new(AtomicU64::new(0));
        let ready = Arc::new(AtomicBool::new(false));
        let dimensions = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));

        let frames_clone = frames.clone();
        let latest_frame_idx_clone = latest_frame_idx.clone();
        let ready_clone = ready.clone();
        let dimensions_clone = dimensions.clone();
        let running_clone = running.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    camera_index,
                    width,
                    height,
                    frames_clone,
                    latest_frame_idx_clone,
                    ready_clone,
                    dimensions_clone,
                    running_clone,
                );
            })
            .map_err(|e| {
                TrackingError::SourceUnavailable(format!("failed to spawn capture thread: {e}"))
            })?;

        Ok(Self {
            frames,
            latest_frame_idx,
            ready,
            dimensions,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn capture_thread(
        camera_index: u32,
        width: u32,
        height: u32,
        frames: [Arc<Mutex<Option<SourceFrame>>>; 3],
        latest_frame_idx: Arc<AtomicU64>,
        ready: Arc<AtomicBool>,
        dimensions: Arc<Mutex<Option<(u32, u32)>>>,
        running: Arc<AtomicBool>,
    ) {
        log::info!(
            "Starting camera capture thread (camera {}, requested {}x{})",
            camera_index,
            width,
            height
        );

        let index = CameraIndex::Index(camera_index);
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::HighestResolution(
            Resolution::new(width, height),
        ));

        let mut camera = match Camera::new(index.clone(), requested) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to open camera at requested resolution: {:?}", e);
                let fallback = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::None);
                match Camera::new(index, fallback) {
                    Ok(c) => c,
                    Err(e2) => {
                        log::error!("Failed to open camera: {:?}", e2);
                        running.store(false, Ordering::Release);
                        return;
                    }
                }
            }
        };

        if let Err(e) = camera.open_stream() {
            log::error!("Failed to open camera stream: {:?}", e);
            running.store(false, Ordering::Release);
            return;
        }

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        let mut write_idx: u64 = 0;

        while running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        let frame_width = frame.resolution().width();
                        let frame_height = frame.resolution().height();

                        if !ready.load(Ordering::Acquire) {
                            *dimensions.lock() = Some((frame_width, frame_height));
                            ready.store(true, Ordering::Release);
                            log::info!(
                                "Actual source dimensions: {}x{}",
                                frame_width,
                                frame_height
                            );
                        }

                        let source_frame = SourceFrame {
                            data: image.into_raw(),
                            width: frame_width,
                            height: frame_height,
                            frame_number: write_idx,
                            timestamp: Instant::now(),
                        };

                        let slot = (write_idx % 3) as usize;
                        *frames[slot].lock() = Some(source_frame);
                        latest_frame_idx.store(write_idx, Ordering::Release);
                        write_idx = write_idx.wrapping_add(1);
                    }
                    Err(e) => {
                        log::warn!("Failed to decode frame: {:?}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }

        log::info!("Camera capture thread stopped");
    }

    /// Stop capturing and join the capture thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl VideoSource for CameraSource {
    fn ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        *self.dimensions.lock()
    }

    fn latest_frame(&self) -> Option<SourceFrame> {
        let idx = self.latest_frame_idx.load(Ordering::Acquire);
        let slot = (idx % 3) as usize;
        self.frames[slot].lock().clone()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_iff_wider_than_tall() {
        assert_eq!(resolve_orientation(640, 480), Orientation::Landscape);
        assert_eq!(resolve_orientation(480, 640), Orientation::Portrait);
        assert_eq!(resolve_orientation(2, 1), Orientation::Landscape);
        assert_eq!(resolve_orientation(1, 2), Orientation::Portrait);
    }

    #[test]
    fn test_equal_dimensions_resolve_to_portrait() {
        assert_eq!(resolve_orientation(512, 512), Orientation::Portrait);
        assert_eq!(resolve_orientation(0, 0), Orientation::Portrait);
    }

    #[test]
    fn test_capture_resolution_landscape_viewport() {
        // 1920x1080 desktop viewport requests a 640x480 capture.
        assert_eq!(capture_resolution(1920, 1080), (640, 480));
    }

    #[test]
    fn test_capture_resolution_portrait_viewport() {
        // 800x1200 portrait viewport requests a 480x640 capture.
        assert_eq!(capture_resolution(800, 1200), (480, 640));
    }

    #[test]
    fn test_orientation_uses_same_rule_as_capture_resolution() {
        for (w, h) in [(1920, 1080), (800, 1200), (640, 640), (1, 0)] {
            let expected = match resolve_orientation(w, h) {
                Orientation::Landscape => LANDSCAPE_CAPTURE,
                Orientation::Portrait => PORTRAIT_CAPTURE,
            };
            assert_eq!(capture_resolution(w, h), expected);
        }
    }

    struct PendingSource;

    impl VideoSource for PendingSource {
        fn ready(&self) -> bool {
            false
        }
        fn dimensions(&self) -> Option<(u32, u32)> {
            None
        }
        fn latest_frame(&self) -> Option<SourceFrame> {
            None
        }
    }

    #[test]
    fn test_orientation_sentinel_before_source_ready() {
        assert_eq!(PendingSource.orientation(), None);
    }
}
