//! V4L2 webcam capture via the `v4l` crate.

use crate::frame::{self, Frame, FrameError};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("capture session is closed")]
    Closed,
}

impl CameraError {
    /// True when the device could not be opened at all (as opposed to a
    /// failure mid-session).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CameraError::DeviceNotFound(_)
                | CameraError::DeviceBusy
                | CameraError::StreamingNotSupported
                | CameraError::FormatNegotiationFailed(_)
        )
    }
}

impl From<FrameError> for CameraError {
    fn from(e: FrameError) -> Self {
        CameraError::CaptureFailed(e.to_string())
    }
}

/// Anything the preview loop can pull frames from.
///
/// `close` must be idempotent, and `read_frame` after `close` must return
/// an error rather than panic.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
    /// Negotiated (width, height), which may differ from what was requested.
    fn resolution(&self) -> (u32, u32);
    fn close(&mut self);
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Motion-JPEG, one JPEG image per buffer.
    Mjpg,
    /// Packed 24-bit RGB.
    Rgb3,
}

impl PixelFormat {
    /// Map a driver-negotiated FourCC to a supported format.
    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"MJPG" => Some(PixelFormat::Mjpg),
            b"RGB3" => Some(PixelFormat::Rgb3),
            _ => None,
        }
    }
}

/// V4L2 camera capture session.
///
/// Owns the device handle exclusively; `close` (or drop) releases it.
pub struct Camera {
    stream: Option<MmapStream<'static>>,
    device: Option<Device>,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0") and request
    /// the given capture resolution.
    ///
    /// The driver may clamp the resolution; the negotiated values are
    /// stored in `width`/`height`.
    pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; webcams that only stream compressed frames will
        // answer with MJPG instead.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = width;
        fmt.height = height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = PixelFormat::from_fourcc(fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, MJPG, or RGB3)"
            ))
        })?;

        if negotiated.width != width || negotiated.height != height {
            tracing::warn!(
                requested_width = width,
                requested_height = height,
                width = negotiated.width,
                height = negotiated.height,
                "driver adjusted capture resolution"
            );
        }

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            stream: None,
            device: Some(device),
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
        })
    }

    /// Negotiated pixel format.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Capture a single frame, converting to RGB.
    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        if self.stream.is_none() {
            let device = self.device.as_ref().ok_or(CameraError::Closed)?;
            let stream = MmapStream::with_buffers(device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;
            self.stream = Some(stream);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CameraError::Closed);
        };

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let payload = if used > 0 { &buf[..used] } else { buf };
        let sequence = meta.sequence;

        let (pixel_format, width, height) = (self.pixel_format, self.width, self.height);
        buf_to_frame(pixel_format, payload, width, height, sequence)
    }

    /// Release the device. Safe to call more than once.
    pub fn close(&mut self) {
        // Stream buffers are unmapped before the device fd is closed.
        let had_stream = self.stream.take().is_some();
        if self.device.take().is_some() {
            tracing::info!(device = %self.device_path, had_stream, "camera released");
        }
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn close(&mut self) {
        Camera::close(self);
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.close();
    }
}

/// Convert a raw buffer to an RGB frame based on the negotiated format.
fn buf_to_frame(
    pixel_format: PixelFormat,
    buf: &[u8],
    width: u32,
    height: u32,
    sequence: u32,
) -> Result<Frame, CameraError> {
    let data = match pixel_format {
        PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, width, height)?,
        PixelFormat::Rgb3 => {
            let expected = (width * height * 3) as usize;
            if buf.len() < expected {
                return Err(CameraError::CaptureFailed(format!(
                    "RGB3 buffer too short: expected {expected}, got {}",
                    buf.len()
                )));
            }
            buf[..expected].to_vec()
        }
        PixelFormat::Mjpg => {
            let decoded = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
                .map_err(|e| FrameError::Decode(format!("MJPG: {e}")))?;
            return Ok(Frame::from_rgb_image(decoded.to_rgb8(), sequence));
        }
    };

    Ok(Frame {
        data,
        width,
        height,
        timestamp: std::time::Instant::now(),
        sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let result = Camera::open("/dev/roomdet-no-such-camera", 320, 240);
        match result {
            Err(e @ CameraError::DeviceNotFound(_)) => assert!(e.is_unavailable()),
            Err(other) => panic!("expected DeviceNotFound, got {other}"),
            Ok(_) => panic!("opening a missing device must fail"),
        }
    }

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(
            PixelFormat::from_fourcc(FourCC::new(b"YUYV")),
            Some(PixelFormat::Yuyv)
        );
        assert_eq!(
            PixelFormat::from_fourcc(FourCC::new(b"MJPG")),
            Some(PixelFormat::Mjpg)
        );
        assert_eq!(
            PixelFormat::from_fourcc(FourCC::new(b"RGB3")),
            Some(PixelFormat::Rgb3)
        );
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"GREY")), None);
    }

    #[test]
    fn test_capture_failure_is_not_unavailable() {
        assert!(!CameraError::CaptureFailed("gone".into()).is_unavailable());
        assert!(!CameraError::Closed.is_unavailable());
    }

    #[test]
    fn test_buf_to_frame_rgb3() {
        let buf = vec![10u8; 2 * 2 * 3];
        let frame = buf_to_frame(PixelFormat::Rgb3, &buf, 2, 2, 3).unwrap();
        assert_eq!(frame.data.len(), 12);
        assert_eq!(frame.sequence, 3);
    }

    #[test]
    fn test_buf_to_frame_short_rgb3() {
        let buf = vec![10u8; 5];
        assert!(buf_to_frame(PixelFormat::Rgb3, &buf, 2, 2, 0).is_err());
    }

    #[test]
    fn test_buf_to_frame_mjpg() {
        let image = image::RgbImage::from_pixel(6, 4, image::Rgb([200, 30, 30]));
        let mut jpeg = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let frame = buf_to_frame(PixelFormat::Mjpg, &jpeg, 6, 4, 1).unwrap();
        assert_eq!((frame.width, frame.height), (6, 4));
        assert_eq!(frame.data.len(), 6 * 4 * 3);
    }
}
