//! marker-stage - webcam fiducial-marker AR demo
//!
//! Captures a camera stream, feeds frames to a marker pose tracker, and
//! renders a cube and a torus knot anchored to the tracked marker over the
//! live camera feed.

pub mod app;
pub mod config;
pub mod render;
pub mod scene;
pub mod scheduler;
pub mod source;
pub mod stage;
pub mod tracking;

pub use app::App;
