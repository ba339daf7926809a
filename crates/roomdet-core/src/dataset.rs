//! Dataset directories and captured-frame persistence.
//!
//! Layout: `<parent>/<normalized_label>/<time_token><normalized_label>.png`.

use crate::prompt::Prompt;
use crate::timestamp::time_token;
use roomdet_hw::Frame;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const EXISTING_DATASET_PROMPT: &str =
    "Dataset for this name already exists, continue to add more samples? (y/n): ";
const UNKNOWN_RESPONSE_MESSAGE: &str = "\nPlease respond with \"y\" or \"n\"";

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset name is empty")]
    EmptyName,
    #[error("failed to create dataset directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write frame to {path}: {reason}")]
    Write { path: PathBuf, reason: String },
    #[error("invalid frame: {0}")]
    Frame(#[from] roomdet_hw::FrameError),
    #[error("prompt failed: {0}")]
    Prompt(#[source] std::io::Error),
}

/// Ensure `parent/name` exists as a directory.
///
/// Creates `parent` (recursively) and then `parent/name` when missing.
/// Returns `(already_existed, full_path)`; an existing directory is left
/// untouched. An empty `name` would resolve to `parent` itself and is
/// rejected before anything is created.
pub fn ensure_dir(name: &str, parent: &Path) -> Result<(bool, PathBuf), DatasetError> {
    if name.is_empty() {
        return Err(DatasetError::EmptyName);
    }
    let full_path = parent.join(name);

    if full_path.is_dir() {
        tracing::debug!(path = %full_path.display(), "dataset directory already exists");
        return Ok((true, full_path));
    }

    std::fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
        path: parent.to_path_buf(),
        source,
    })?;
    std::fs::create_dir(&full_path).map_err(|source| DatasetError::Io {
        path: full_path.clone(),
        source,
    })?;

    tracing::info!(path = %full_path.display(), "created dataset directory");
    Ok((false, full_path))
}

/// Ask whether an existing dataset should be extended.
///
/// Loops until the answer is `y` or `n` (case-insensitive, surrounding
/// whitespace ignored). End of input counts as `n`.
pub fn confirm_extend<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
) -> Result<bool, DatasetError> {
    loop {
        let Some(answer) = prompt
            .ask(EXISTING_DATASET_PROMPT)
            .map_err(DatasetError::Prompt)?
        else {
            return Ok(false);
        };

        match answer.trim().to_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => prompt
                .say(UNKNOWN_RESPONSE_MESSAGE)
                .map_err(DatasetError::Prompt)?,
        }
    }
}

/// Path a frame saved under `token` would be written to.
pub fn frame_path(label: &str, dataset_dir: &Path, token: &str) -> PathBuf {
    dataset_dir.join(format!("{token}{label}.png"))
}

/// Write `frame` as a PNG named `{time_token}{label}.png` in `dataset_dir`.
///
/// There is no overwrite protection: two saves within the same second
/// produce the same filename and the second replaces the first.
pub fn save_frame(label: &str, dataset_dir: &Path, frame: &Frame) -> Result<PathBuf, DatasetError> {
    save_frame_as(label, dataset_dir, frame, &time_token())
}

/// [`save_frame`] with an explicit timestamp token.
pub fn save_frame_as(
    label: &str,
    dataset_dir: &Path,
    frame: &Frame,
    token: &str,
) -> Result<PathBuf, DatasetError> {
    let path = frame_path(label, dataset_dir, token);
    let image = frame.to_rgb_image()?;

    image
        .save_with_format(&path, image::ImageFormat::Png)
        .map_err(|e| DatasetError::Write {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    tracing::debug!(path = %path.display(), seq = frame.sequence, "saved frame");
    Ok(path)
}

/// Saves frames for one label into its dataset directory.
pub struct FramePersister {
    label: String,
    dataset_dir: PathBuf,
    saved: usize,
}

impl FramePersister {
    /// `label` must already be normalized; it is used verbatim in filenames.
    pub fn new(label: impl Into<String>, dataset_dir: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            dataset_dir: dataset_dir.into(),
            saved: 0,
        }
    }

    pub fn save(&mut self, frame: &Frame) -> Result<PathBuf, DatasetError> {
        self.save_with_token(frame, &time_token())
    }

    pub fn save_with_token(&mut self, frame: &Frame, token: &str) -> Result<PathBuf, DatasetError> {
        let path = save_frame_as(&self.label, &self.dataset_dir, frame, token)?;
        self.saved += 1;
        Ok(path)
    }

    /// Number of successful saves (including ones that overwrote a file).
    pub fn saved(&self) -> usize {
        self.saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame {
            data: vec![value; (width * height * 3) as usize],
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        }
    }

    #[test]
    fn test_ensure_dir_created_then_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("datasets");

        let (existed, path) = ensure_dir("alice", &parent).unwrap();
        assert!(!existed);
        assert_eq!(path, parent.join("alice"));
        assert!(path.is_dir());

        let (existed, again) = ensure_dir("alice", &parent).unwrap();
        assert!(existed);
        assert_eq!(again, path);
        assert!(again.is_dir());
    }

    #[test]
    fn test_ensure_dir_keeps_existing_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, path) = ensure_dir("bob", tmp.path()).unwrap();
        std::fs::write(path.join("keep.png"), b"x").unwrap();

        let (existed, _) = ensure_dir("bob", tmp.path()).unwrap();
        assert!(existed);
        assert!(path.join("keep.png").exists());
    }

    #[test]
    fn test_ensure_dir_rejects_empty_name() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("datasets");
        std::fs::create_dir(&parent).unwrap();

        let result = ensure_dir(&crate::normalize("   "), &parent);
        assert!(matches!(result, Err(DatasetError::EmptyName)));
        assert_eq!(std::fs::read_dir(&parent).unwrap().count(), 0);

        let missing = tmp.path().join("missing");
        assert!(ensure_dir("", &missing).is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn test_ensure_dir_fails_on_file_in_the_way() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("carol"), b"not a dir").unwrap();
        let result = ensure_dir("carol", tmp.path());
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }

    #[test]
    fn test_confirm_extend_answers() {
        let mut yes = Prompt::new(Cursor::new(" Y \n"), Vec::new());
        assert!(confirm_extend(&mut yes).unwrap());

        let mut no = Prompt::new(Cursor::new("n\n"), Vec::new());
        assert!(!confirm_extend(&mut no).unwrap());
    }

    #[test]
    fn test_confirm_extend_reprompts_on_garbage() {
        let mut prompt = Prompt::new(Cursor::new("maybe\n\ny\n"), Vec::new());
        assert!(confirm_extend(&mut prompt).unwrap());
        let out = String::from_utf8(prompt.into_output()).unwrap();
        assert_eq!(out.matches("Please respond with").count(), 2);
    }

    #[test]
    fn test_confirm_extend_eof_declines() {
        let mut prompt = Prompt::new(Cursor::new(""), Vec::new());
        assert!(!confirm_extend(&mut prompt).unwrap());
    }

    #[test]
    fn test_save_frame_writes_png() {
        let tmp = tempfile::tempdir().unwrap();
        let frame = solid_frame(8, 6, 77);

        let path = save_frame("test", tmp.path(), &frame).unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("test.png"), "{name}");

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (8, 6));
        assert_eq!(decoded.get_pixel(0, 0).0, [77, 77, 77]);
    }

    #[test]
    fn test_same_token_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let mut persister = FramePersister::new("dup", tmp.path());

        persister.save_with_token(&solid_frame(4, 4, 10), "2024_1_1_0_0_0_").unwrap();
        persister.save_with_token(&solid_frame(4, 4, 200), "2024_1_1_0_0_0_").unwrap();

        let files: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(persister.saved(), 2);
        let decoded = image::open(frame_path("dup", tmp.path(), "2024_1_1_0_0_0_"))
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn test_save_into_missing_dir_is_write_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let result = save_frame("x", &missing, &solid_frame(2, 2, 0));
        assert!(matches!(result, Err(DatasetError::Write { .. })));
    }
}
