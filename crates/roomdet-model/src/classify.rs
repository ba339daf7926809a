//! Frame classification with a trained model.

use crate::artifact::{recorder, sidecar_path, ModelMetadata};
use crate::net::{RoommateNet, RoommateNetConfig};
use crate::train::images_tensor;
use crate::InferBackend;
use burn::module::Module;
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use roomdet_hw::{Frame, FrameError};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("model metadata {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },
    #[error("failed to load model weights: {0}")]
    Record(String),
    #[error(
        "input shape mismatch: model expects {expected_width}x{expected_height}, got {width}x{height}"
    )]
    InputShapeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Softmax probability of `label`, in `[0, 1]`.
    pub confidence: f32,
}

impl Prediction {
    /// Console line reported for each classified frame.
    pub fn message(&self) -> String {
        format!(
            "This image most likely belongs to {} with a {:.2} percent confidence.",
            self.label,
            self.confidence * 100.0
        )
    }
}

pub struct Classifier {
    model: RoommateNet<InferBackend>,
    metadata: ModelMetadata,
    device: <InferBackend as Backend>::Device,
}

impl Classifier {
    /// Load `{stem}_model.bin` and its `{stem}_model.json` sidecar.
    pub fn load(model_path: &Path) -> Result<Self, ClassifyError> {
        if !model_path.is_file() {
            return Err(ClassifyError::ModelNotFound(model_path.to_path_buf()));
        }

        let meta_path = sidecar_path(model_path);
        let metadata_err = |reason: String| ClassifyError::Metadata {
            path: meta_path.clone(),
            reason,
        };
        let json = std::fs::read_to_string(&meta_path).map_err(|e| metadata_err(e.to_string()))?;
        let metadata: ModelMetadata =
            serde_json::from_str(&json).map_err(|e| metadata_err(e.to_string()))?;
        if metadata.class_names.is_empty() {
            return Err(metadata_err("no class names".into()));
        }

        let device = <InferBackend as Backend>::Device::default();
        let net_config = RoommateNetConfig::new(
            metadata.img_width,
            metadata.img_height,
            metadata.class_names.len(),
        );
        let model = RoommateNet::<InferBackend>::new(net_config, &device)
            .load_file(model_path.to_path_buf(), &recorder(), &device)
            .map_err(|e| ClassifyError::Record(e.to_string()))?;

        tracing::info!(
            path = %model_path.display(),
            classes = ?metadata.class_names,
            width = metadata.img_width,
            height = metadata.img_height,
            "loaded model"
        );

        Ok(Self {
            model,
            metadata,
            device,
        })
    }

    pub fn class_names(&self) -> &[String] {
        &self.metadata.class_names
    }

    /// (width, height) the model was trained on.
    pub fn input_size(&self) -> (u32, u32) {
        (self.metadata.img_width, self.metadata.img_height)
    }

    /// Fail unless frames of `width × height` can be fed to the model.
    pub fn check_input(&self, width: u32, height: u32) -> Result<(), ClassifyError> {
        let (expected_width, expected_height) = self.input_size();
        if (width, height) != (expected_width, expected_height) {
            return Err(ClassifyError::InputShapeMismatch {
                expected_width,
                expected_height,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Classify one unmirrored frame.
    pub fn predict(&self, frame: &Frame) -> Result<Prediction, ClassifyError> {
        self.check_input(frame.width, frame.height)?;
        let image = frame.to_rgb_image()?;

        let (width, height) = self.input_size();
        let input = images_tensor::<InferBackend>(&[image], width, height, &self.device);
        let probs = softmax(self.model.forward(input), 1);
        let probs: Vec<f32> = probs
            .into_data()
            .to_vec()
            .map_err(|e| ClassifyError::Inference(format!("{e:?}")))?;

        let (best, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| ClassifyError::Inference("model produced no scores".into()))?;
        let label = self
            .metadata
            .class_names
            .get(best)
            .cloned()
            .ok_or_else(|| ClassifyError::Inference(format!("class id {best} out of range")))?;

        Ok(Prediction { label, confidence })
    }
}
