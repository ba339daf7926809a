//! RGB frame type and pixel format conversion.

use image::RgbImage;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB8 pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Wrap a decoded RGB image.
    pub fn from_rgb_image(image: RgbImage, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence,
        }
    }

    /// Copy the pixels into an `image::RgbImage` for encoding or resizing.
    pub fn to_rgb_image(&self) -> Result<RgbImage, FrameError> {
        let expected = (self.width * self.height * 3) as usize;
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            FrameError::InvalidLength {
                expected,
                actual: self.data.len(),
            },
        )
    }

    /// Horizontally flipped copy, for "mirror" self-view display.
    ///
    /// Metadata (timestamp, sequence) is preserved so the mirrored frame can
    /// always be matched to its unmirrored source.
    pub fn mirrored(&self) -> Frame {
        let w = self.width as usize;
        let row_bytes = w * 3;
        let mut data = Vec::with_capacity(self.data.len());

        for row in self.data.chunks_exact(row_bytes) {
            for px in row.chunks_exact(3).rev() {
                data.extend_from_slice(px);
            }
        }

        Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp: self.timestamp,
            sequence: self.sequence,
        }
    }
}

/// Convert packed YUYV (4:2:2) to packed RGB8 using BT.601 limited-range
/// coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |x: i32| (x >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e + 128),
        clamp(298 * c - 100 * d - 208 * e + 128),
        clamp(298 * c + 516 * d + 128),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("frame decode failed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from(data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame {
            data,
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence: 7,
        }
    }

    #[test]
    fn test_yuyv_white_and_black() {
        // 2x1 image: Y0=235 (white), Y1=16 (black), neutral chroma
        let yuyv = vec![235, 128, 16, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn test_yuyv_output_length() {
        let yuyv = vec![128u8; 4 * 2 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        let result = yuyv_to_rgb(&yuyv, 2, 1);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_mirrored_reverses_each_row() {
        // 3x2 image, pixels labelled by their red channel
        let data = vec![
            1, 0, 0, 2, 0, 0, 3, 0, 0, //
            4, 0, 0, 5, 0, 0, 6, 0, 0,
        ];
        let frame = frame_from(data, 3, 2);
        let mirrored = frame.mirrored();
        let reds: Vec<u8> = mirrored.data.chunks(3).map(|p| p[0]).collect();
        assert_eq!(reds, vec![3, 2, 1, 6, 5, 4]);
        assert_eq!(mirrored.sequence, frame.sequence);
    }

    #[test]
    fn test_mirrored_twice_is_identity() {
        let data: Vec<u8> = (0..(5 * 4 * 3)).map(|i| i as u8).collect();
        let frame = frame_from(data.clone(), 5, 4);
        assert_eq!(frame.mirrored().mirrored().data, data);
    }

    #[test]
    fn test_to_rgb_image_dimensions() {
        let frame = frame_from(vec![9u8; 4 * 3 * 3], 4, 3);
        let image = frame.to_rgb_image().unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(3, 2).0, [9, 9, 9]);
    }

    #[test]
    fn test_to_rgb_image_rejects_short_buffer() {
        let frame = frame_from(vec![0u8; 5], 4, 3);
        assert!(frame.to_rgb_image().is_err());
    }
}
