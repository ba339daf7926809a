//! roomdet-hw: webcam capture hardware layer.
//!
//! Provides V4L2-based camera access producing RGB frames, plus the
//! `FrameSource` seam the preview loop consumes.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameSource, PixelFormat};
pub use frame::{Frame, FrameError};
