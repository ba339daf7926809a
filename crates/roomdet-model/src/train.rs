//! Training orchestrator.
//!
//! Load the image folder, split it, fit [`RoommateNet`] with a plain
//! Adam/cross-entropy loop, then save the model and results graph through
//! the interactive save-conflict resolver.

use crate::artifact::{GraphArtifact, ModelArtifact, ModelMetadata};
use crate::augment::Augmenter;
use crate::data::{push_chw, DataError, ImageFolder, Sample, Split};
use crate::net::{RoommateNet, RoommateNetConfig, MIN_INPUT_SIZE};
use crate::{InferBackend, TrainBackend};
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use roomdet_core::{normalize, resolve_and_save, Artifact, ConflictError, Prompt};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_EPOCHS: usize = 15;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;
pub const DEFAULT_VALIDATION_SPLIT: f32 = 0.2;
pub const DEFAULT_SEED: u64 = 123;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("path \"{0}\" either could not be found or does not exist")]
    PathNotFound(PathBuf),
    #[error("input size {width}x{height} is too small (minimum {min}x{min})")]
    InvalidInputSize { width: u32, height: u32, min: u32 },
    #[error("no training images found under {0}")]
    EmptyDataset(PathBuf),
    #[error("dataset: {0}")]
    Data(#[from] DataError),
    #[error("save: {0}")]
    Conflict(#[from] ConflictError),
}

/// What to train and where to put it.
#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub dataset_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Raw name; normalized before it becomes a file stem.
    pub model_name: String,
    pub img_width: u32,
    pub img_height: u32,
}

/// Hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_split: f32,
    /// Seeds the split, the per-epoch shuffle and augmentation.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            validation_split: DEFAULT_VALIDATION_SPLIT,
            seed: DEFAULT_SEED,
        }
    }
}

/// Metrics for one epoch. Validation values are `None` when the split left
/// no validation samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

#[derive(Debug)]
pub struct TrainOutcome {
    pub class_names: Vec<String>,
    pub history: Vec<EpochMetrics>,
    pub model_path: PathBuf,
    pub graph_path: PathBuf,
}

/// Train a classifier on `request.dataset_dir` and save
/// `{stem}_model.bin` (+ sidecar) and `{stem}_graph.png` into
/// `request.output_dir`.
///
/// Both directories are checked before anything is read or written.
/// Name conflicts are resolved interactively through `prompt`; `rename`
/// supplies the replacement stem when the user picks a generated name.
pub fn train<R, W, F>(
    request: &TrainRequest,
    config: &TrainConfig,
    prompt: &mut Prompt<R, W>,
    mut rename: F,
) -> Result<TrainOutcome, TrainError>
where
    R: BufRead,
    W: Write,
    F: FnMut() -> String,
{
    check_preconditions(request)?;

    let folder = ImageFolder::load(&request.dataset_dir, request.img_width, request.img_height)?;
    if folder.samples.is_empty() {
        return Err(TrainError::EmptyDataset(request.dataset_dir.clone()));
    }
    let class_names = folder.class_names.clone();
    let split = folder.split(config.validation_split, config.seed);
    tracing::info!(
        classes = class_names.len(),
        train = split.train.len(),
        validation = split.validation.len(),
        "dataset split"
    );

    let net_config =
        RoommateNetConfig::new(request.img_width, request.img_height, class_names.len());
    let (model, history) = fit(&split, net_config, config);

    let metadata = ModelMetadata {
        class_names: class_names.clone(),
        img_width: request.img_width,
        img_height: request.img_height,
        epochs: config.epochs,
        history: history.clone(),
    };

    let stem = normalize(&request.model_name);
    let model_path = save_artifact(
        &ModelArtifact {
            model: &model,
            metadata: &metadata,
        },
        &request.output_dir,
        &stem,
        prompt,
        &mut rename,
    )?;
    let graph_path = save_artifact(
        &GraphArtifact { history: &history },
        &request.output_dir,
        &stem,
        prompt,
        &mut rename,
    )?;

    Ok(TrainOutcome {
        class_names,
        history,
        model_path,
        graph_path,
    })
}

fn check_preconditions(request: &TrainRequest) -> Result<(), TrainError> {
    for dir in [&request.dataset_dir, &request.output_dir] {
        if !dir.is_dir() {
            return Err(TrainError::PathNotFound(dir.clone()));
        }
    }
    if request.img_width < MIN_INPUT_SIZE || request.img_height < MIN_INPUT_SIZE {
        return Err(TrainError::InvalidInputSize {
            width: request.img_width,
            height: request.img_height,
            min: MIN_INPUT_SIZE,
        });
    }
    Ok(())
}

fn save_artifact<A, R, W, F>(
    artifact: &A,
    output_dir: &Path,
    stem: &str,
    prompt: &mut Prompt<R, W>,
    rename: F,
) -> Result<PathBuf, ConflictError>
where
    A: Artifact,
    R: BufRead,
    W: Write,
    F: FnMut() -> String,
{
    let destination = output_dir.join(artifact.kind().file_name(stem));
    resolve_and_save(artifact, &destination, stem, prompt, rename)
}

fn fit(
    split: &Split,
    net_config: RoommateNetConfig,
    config: &TrainConfig,
) -> (RoommateNet<InferBackend>, Vec<EpochMetrics>) {
    let device = <TrainBackend as Backend>::Device::default();
    let mut model = RoommateNet::<TrainBackend>::new(net_config, &device);
    let mut optim = AdamConfig::new().init();
    let loss_fn = CrossEntropyLossConfig::new().init::<TrainBackend>(&device);

    let (width, height) = (net_config.img_width, net_config.img_height);
    let batch_size = config.batch_size.max(1);
    let mut shuffle_rng = StdRng::seed_from_u64(config.seed);
    let mut augmenter = Augmenter::new(config.seed.wrapping_add(1));
    let mut order: Vec<usize> = (0..split.train.len()).collect();
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        order.shuffle(&mut shuffle_rng);
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;

        for chunk in order.chunks(batch_size) {
            let images: Vec<RgbImage> = chunk
                .iter()
                .map(|&i| augmenter.apply(&split.train[i].image))
                .collect();
            let labels: Vec<i64> = chunk.iter().map(|&i| split.train[i].label as i64).collect();

            let x = images_tensor::<TrainBackend>(&images, width, height, &device);
            let y = labels_tensor::<TrainBackend>(labels, &device);

            let logits = model.forward(x);
            let loss = loss_fn.forward(logits.clone(), y.clone());
            correct += count_correct(logits.detach(), y);
            loss_sum += loss.clone().detach().into_scalar().elem::<f64>() * chunk.len() as f64;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);
        }

        let seen = split.train.len().max(1) as f64;
        let validation = evaluate(&model.valid(), &split.validation, width, height, batch_size);
        let metrics = EpochMetrics {
            epoch,
            train_loss: (loss_sum / seen) as f32,
            train_accuracy: (correct as f64 / seen) as f32,
            val_loss: validation.map(|(loss, _)| loss),
            val_accuracy: validation.map(|(_, acc)| acc),
        };
        tracing::info!(
            epoch = epoch + 1,
            epochs = config.epochs,
            loss = metrics.train_loss,
            accuracy = metrics.train_accuracy,
            val_loss = ?metrics.val_loss,
            val_accuracy = ?metrics.val_accuracy,
            "epoch finished"
        );
        history.push(metrics);
    }

    (model.valid(), history)
}

/// Mean loss and accuracy over `samples`, or `None` when there are none.
fn evaluate(
    model: &RoommateNet<InferBackend>,
    samples: &[Sample],
    width: u32,
    height: u32,
    batch_size: usize,
) -> Option<(f32, f32)> {
    if samples.is_empty() {
        return None;
    }
    let device = <InferBackend as Backend>::Device::default();
    let loss_fn = CrossEntropyLossConfig::new().init::<InferBackend>(&device);

    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;
    for chunk in samples.chunks(batch_size) {
        let images: Vec<RgbImage> = chunk.iter().map(|s| s.image.clone()).collect();
        let labels: Vec<i64> = chunk.iter().map(|s| s.label as i64).collect();

        let x = images_tensor::<InferBackend>(&images, width, height, &device);
        let y = labels_tensor::<InferBackend>(labels, &device);
        let logits = model.forward(x);

        let loss = loss_fn.forward(logits.clone(), y.clone());
        loss_sum += loss.into_scalar().elem::<f64>() * chunk.len() as f64;
        correct += count_correct(logits, y);
    }

    let n = samples.len() as f64;
    Some(((loss_sum / n) as f32, (correct as f64 / n) as f32))
}

/// Stack `images` into a rescaled `[n, 3, height, width]` tensor.
pub(crate) fn images_tensor<B: Backend>(
    images: &[RgbImage],
    width: u32,
    height: u32,
    device: &B::Device,
) -> Tensor<B, 4> {
    let mut pixels = Vec::with_capacity(images.len() * 3 * (width * height) as usize);
    for image in images {
        push_chw(image, &mut pixels);
    }
    let shape = [images.len(), 3, height as usize, width as usize];
    Tensor::from_data(TensorData::new(pixels, shape), device)
}

fn labels_tensor<B: Backend>(labels: Vec<i64>, device: &B::Device) -> Tensor<B, 1, Int> {
    let len = labels.len();
    Tensor::from_data(TensorData::new(labels, [len]), device)
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted: Tensor<B, 1, Int> = logits.argmax(1).squeeze(1);
    predicted
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}
