use anyhow::{Context, Result};
use roomdet_model::TrainConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read from the working directory when `ROOMDET_CONFIG` is unset.
const DEFAULT_CONFIG_FILE: &str = "roomdet.toml";

/// Application configuration.
///
/// Layered lowest to highest: built-in defaults, `roomdet.toml` (or the file
/// named by `ROOMDET_CONFIG`), `ROOMDET_*` environment variables, then
/// command-line flags (applied by the caller).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture width; also the model input width.
    pub width: u32,
    /// Requested capture height; also the model input height.
    pub height: u32,
    /// Parent directory of per-label datasets.
    pub datasets_dir: PathBuf,
    /// Where trained models and graphs are written.
    pub models_dir: PathBuf,
    /// Delay between preview ticks.
    pub frame_interval_ms: u64,
    pub epochs: usize,
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let train = TrainConfig::default();
        Self {
            camera_device: "/dev/video0".to_string(),
            width: 320,
            height: 240,
            datasets_dir: PathBuf::from("datasets"),
            models_dir: PathBuf::from("models"),
            frame_interval_ms: roomdet_core::DEFAULT_FRAME_INTERVAL.as_millis() as u64,
            epochs: train.epochs,
            batch_size: train.batch_size,
        }
    }
}

impl Config {
    /// Defaults, then the config file (if any), then the environment.
    pub fn load() -> Result<Self> {
        let base = match std::env::var("ROOMDET_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            Err(_) => return Ok(Self::from_env()),
        };
        Ok(base.with_env(|key| std::env::var(key).ok()))
    }

    /// Defaults overridden by `ROOMDET_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `ROOMDET_*` values from `lookup`. Unparseable numbers are
    /// ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ROOMDET_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("ROOMDET_DATASETS_DIR") {
            self.datasets_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROOMDET_MODELS_DIR") {
            self.models_dir = PathBuf::from(v);
        }
        self.width = parsed(&lookup, "ROOMDET_WIDTH", self.width);
        self.height = parsed(&lookup, "ROOMDET_HEIGHT", self.height);
        self.frame_interval_ms = parsed(&lookup, "ROOMDET_FRAME_INTERVAL_MS", self.frame_interval_ms);
        self.epochs = parsed(&lookup, "ROOMDET_EPOCHS", self.epochs);
        self.batch_size = parsed(&lookup, "ROOMDET_BATCH_SIZE", self.batch_size);
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            ..TrainConfig::default()
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            default
        }),
        None => default,
    }
}
