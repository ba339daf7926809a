//! Image-folder dataset: one subdirectory per class.
//!
//! ```text
//! dataset_dir/
//!   alice/  *.png|*.jpg|*.jpeg|*.bmp
//!   bob/    ...
//! ```
//!
//! Class ids follow the sorted subdirectory names. Every image is decoded as
//! RGB and resized to the model input size when loaded.

use image::imageops::FilterType;
use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions picked up as samples (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Divisor that maps 8-bit channels into `[0, 1]`.
const RESCALE: f32 = 255.0;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A decoded, resized training image and its class id.
#[derive(Clone)]
pub struct Sample {
    pub image: RgbImage,
    pub label: usize,
}

pub struct ImageFolder {
    pub class_names: Vec<String>,
    pub samples: Vec<Sample>,
}

/// Training/validation partition of an [`ImageFolder`].
pub struct Split {
    pub train: Vec<Sample>,
    pub validation: Vec<Sample>,
}

impl ImageFolder {
    /// Load every image under `root`, resized to `width × height`.
    ///
    /// Subdirectories without images still count as classes. Files directly
    /// under `root` and files with other extensions are ignored.
    pub fn load(root: &Path, width: u32, height: u32) -> Result<Self, DataError> {
        let mut class_dirs: Vec<(String, PathBuf)> = read_dir(root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_string();
                Some((name, p))
            })
            .collect();
        class_dirs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut samples = Vec::new();
        for (label, (name, dir)) in class_dirs.iter().enumerate() {
            let mut files: Vec<PathBuf> = read_dir(dir)?
                .into_iter()
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            files.sort();

            for path in &files {
                let image = load_resized(path, width, height)?;
                samples.push(Sample { image, label });
            }
            tracing::debug!(class = %name, label, images = files.len(), "loaded class");
        }

        let class_names: Vec<String> = class_dirs.into_iter().map(|(name, _)| name).collect();
        tracing::info!(
            root = %root.display(),
            classes = class_names.len(),
            samples = samples.len(),
            "loaded image folder"
        );

        Ok(Self {
            class_names,
            samples,
        })
    }

    /// Shuffle with `seed` and keep the last `floor(n * validation_fraction)`
    /// samples for validation.
    pub fn split(self, validation_fraction: f32, seed: u64) -> Split {
        let mut samples = self.samples;
        let mut rng = StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let fraction = validation_fraction.clamp(0.0, 1.0);
        let val_len = (samples.len() as f32 * fraction).floor() as usize;
        let validation = samples.split_off(samples.len() - val_len);

        Split {
            train: samples,
            validation,
        }
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, DataError> {
    let io_err = |source| DataError::Io {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()).map_err(io_err))
        .collect()
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn load_resized(path: &Path, width: u32, height: u32) -> Result<RgbImage, DataError> {
    let decoded = image::open(path).map_err(|source| DataError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(resize_to(decoded.to_rgb8(), width, height))
}

/// Bilinear resize; a no-op when the image already has the target size.
pub fn resize_to(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    image::imageops::resize(&image, width, height, FilterType::Triangle)
}

/// Append `image` to `out` as planar CHW floats rescaled to `[0, 1]`.
pub fn push_chw(image: &RgbImage, out: &mut Vec<f32>) {
    let (w, h) = image.dimensions();
    let plane = (w * h) as usize;
    let start = out.len();
    out.resize(start + 3 * plane, 0.0);

    for (i, px) in image.pixels().enumerate() {
        for c in 0..3 {
            out[start + c * plane + i] = px.0[c] as f32 / RESCALE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32, value: u8) {
        RgbImage::from_pixel(width, height, image::Rgb([value, value, value]))
            .save(path)
            .unwrap();
    }

    fn folder(samples: usize) -> ImageFolder {
        ImageFolder {
            class_names: vec!["a".into()],
            samples: (0..samples)
                .map(|i| Sample {
                    image: RgbImage::from_pixel(1, 1, image::Rgb([i as u8, 0, 0])),
                    label: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_load_sorted_classes_and_resizes() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir(root.join("zed")).unwrap();
        std::fs::create_dir(root.join("amy")).unwrap();
        std::fs::create_dir(root.join("empty")).unwrap();
        write_png(&root.join("zed").join("1.png"), 20, 10, 10);
        write_png(&root.join("zed").join("2.PNG"), 20, 10, 20);
        write_png(&root.join("amy").join("1.png"), 5, 5, 30);
        std::fs::write(root.join("amy").join("notes.txt"), b"skip").unwrap();
        write_png(&root.join("stray.png"), 4, 4, 0);

        let folder = ImageFolder::load(root, 8, 6).unwrap();

        assert_eq!(folder.class_names, vec!["amy", "empty", "zed"]);
        assert_eq!(folder.samples.len(), 3);
        assert_eq!(folder.samples[0].label, 0);
        assert_eq!(folder.samples[1].label, 2);
        assert!(folder.samples.iter().all(|s| s.image.dimensions() == (8, 6)));
    }

    #[test]
    fn test_load_rejects_corrupt_image() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("a")).unwrap();
        std::fs::write(tmp.path().join("a").join("bad.png"), b"not a png").unwrap();

        let result = ImageFolder::load(tmp.path(), 8, 8);
        assert!(matches!(result, Err(DataError::Image { .. })));
    }

    #[test]
    fn test_split_sizes() {
        let split = folder(10).split(0.2, 123);
        assert_eq!(split.train.len(), 8);
        assert_eq!(split.validation.len(), 2);

        let split = folder(4).split(0.2, 123);
        assert_eq!(split.train.len(), 4);
        assert!(split.validation.is_empty());
    }

    #[test]
    fn test_split_is_deterministic() {
        let ids = |s: &[Sample]| s.iter().map(|x| x.image.get_pixel(0, 0).0[0]).collect::<Vec<_>>();
        let a = folder(25).split(0.2, 123);
        let b = folder(25).split(0.2, 123);
        assert_eq!(ids(&a.train), ids(&b.train));
        assert_eq!(ids(&a.validation), ids(&b.validation));
    }

    #[test]
    fn test_push_chw_layout() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([255, 0, 51]));
        image.put_pixel(1, 0, image::Rgb([0, 255, 0]));

        let mut out = vec![9.0];
        push_chw(&image, &mut out);

        assert_eq!(out.len(), 1 + 6);
        assert_eq!(&out[1..3], &[1.0, 0.0]); // R plane
        assert_eq!(&out[3..5], &[0.0, 1.0]); // G plane
        assert!((out[5] - 0.2).abs() < 1e-6); // B plane
    }
}
