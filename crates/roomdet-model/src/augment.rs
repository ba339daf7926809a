//! Random training-time augmentation: horizontal flip, rotation, zoom.
//!
//! Rotation and zoom are a single inverse affine warp about the image
//! center, sampled bilinearly. Coordinates that fall outside the source are
//! reflected back in, so borders never turn black.

use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Maximum rotation as a fraction of a full turn.
const MAX_ROTATION_FRACTION: f32 = 0.1;
/// Maximum relative zoom in either direction.
const MAX_ZOOM: f32 = 0.1;

/// One draw of augmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentParams {
    pub flip: bool,
    /// Radians, counter-clockwise.
    pub angle: f32,
    /// Source sampling scale: above 1 zooms out, below 1 zooms in.
    pub zoom: f32,
}

impl AugmentParams {
    pub const IDENTITY: AugmentParams = AugmentParams {
        flip: false,
        angle: 0.0,
        zoom: 1.0,
    };
}

pub struct Augmenter {
    rng: StdRng,
}

impl Augmenter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn sample(&mut self) -> AugmentParams {
        let max_angle = MAX_ROTATION_FRACTION * TAU;
        AugmentParams {
            flip: self.rng.gen_bool(0.5),
            angle: self.rng.gen_range(-max_angle..=max_angle),
            zoom: 1.0 + self.rng.gen_range(-MAX_ZOOM..=MAX_ZOOM),
        }
    }

    /// Augmented copy of `image` with freshly drawn parameters.
    pub fn apply(&mut self, image: &RgbImage) -> RgbImage {
        let params = self.sample();
        augment(image, &params)
    }
}

/// Apply `params` to `image`. Output has the same dimensions.
pub fn augment(image: &RgbImage, params: &AugmentParams) -> RgbImage {
    let flipped;
    let source = if params.flip {
        flipped = image::imageops::flip_horizontal(image);
        &flipped
    } else {
        image
    };

    if params.angle == 0.0 && params.zoom == 1.0 {
        return source.clone();
    }
    warp_about_center(source, params.angle, params.zoom)
}

fn warp_about_center(src: &RgbImage, angle: f32, zoom: f32) -> RgbImage {
    let (w, h) = src.dimensions();
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;

    // Inverse map: src = C + zoom * R(-angle) * (dst - C)
    let (sin, cos) = angle.sin_cos();
    let (ia, ib) = (zoom * cos, zoom * sin);

    let mut out = RgbImage::new(w, h);
    for (ox, oy, px) in out.enumerate_pixels_mut() {
        let dx = ox as f32 - cx;
        let dy = oy as f32 - cy;
        let sx = cx + ia * dx + ib * dy;
        let sy = cy - ib * dx + ia * dy;
        px.0 = bilinear(src, sx, sy);
    }
    out
}

fn bilinear(src: &RgbImage, sx: f32, sy: f32) -> [u8; 3] {
    let (w, h) = src.dimensions();
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let sample = |x: i64, y: i64| src.get_pixel(reflect(x, w), reflect(y, h)).0;
    let p00 = sample(x0, y0);
    let p10 = sample(x0 + 1, y0);
    let p01 = sample(x0, y0 + 1);
    let p11 = sample(x0 + 1, y0 + 1);

    let mut rgb = [0u8; 3];
    for c in 0..3 {
        let val = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        rgb[c] = val.round().clamp(0.0, 255.0) as u8;
    }
    rgb
}

/// Fold `i` into `0..len` by mirroring at the edges (`d c b a | a b c d | d c b a`).
fn reflect(i: i64, len: u32) -> u32 {
    let len = len as i64;
    if len <= 1 {
        return 0;
    }
    let period = 2 * len;
    let m = i.rem_euclid(period);
    let folded = if m < len { m } else { period - 1 - m };
    folded as u32
}
