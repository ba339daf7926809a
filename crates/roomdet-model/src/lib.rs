//! roomdet-model: roommate image classifier.
//!
//! CNN definition, image-folder loading and augmentation, the training
//! orchestrator with its results graph, and frame classification for live
//! detection. Runs on the Burn ndarray (CPU) backend.

pub mod artifact;
pub mod augment;
pub mod classify;
pub mod data;
pub mod net;
pub mod plot;
pub mod train;

/// Backend used for inference and stored weights.
pub type InferBackend = burn::backend::NdArray<f32>;
/// Backend used while fitting.
pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

pub use artifact::{GraphArtifact, ModelArtifact, ModelMetadata};
pub use classify::{Classifier, ClassifyError, Prediction};
pub use data::{DataError, ImageFolder};
pub use net::{RoommateNet, RoommateNetConfig, MIN_INPUT_SIZE};
pub use train::{train, EpochMetrics, TrainConfig, TrainError, TrainOutcome, TrainRequest};
