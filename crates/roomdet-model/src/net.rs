//! Small convolutional classifier for roommate images.
//!
//! Three conv/pool stages followed by a dense head. Input is NCHW RGB,
//! already rescaled to `[0, 1]`; output is unnormalized class logits.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Each conv stage halves both spatial dimensions.
const POOL_STAGES: u32 = 3;
const LAST_CONV_CHANNELS: usize = 64;
const HIDDEN_UNITS: usize = 128;
const DROPOUT: f64 = 0.2;

/// Smallest width/height that survives all pooling stages.
pub const MIN_INPUT_SIZE: u32 = 1 << POOL_STAGES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoommateNetConfig {
    pub img_width: u32,
    pub img_height: u32,
    pub num_classes: usize,
}

impl RoommateNetConfig {
    pub fn new(img_width: u32, img_height: u32, num_classes: usize) -> Self {
        Self {
            img_width,
            img_height,
            num_classes,
        }
    }

    /// Features entering the dense head after flattening.
    pub fn flattened_len(&self) -> usize {
        let w = (self.img_width >> POOL_STAGES) as usize;
        let h = (self.img_height >> POOL_STAGES) as usize;
        LAST_CONV_CHANNELS * w * h
    }
}

#[derive(Debug, Module)]
pub struct RoommateNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    dropout: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,
}

impl<B: Backend> RoommateNet<B> {
    pub fn new(cfg: RoommateNetConfig, device: &B::Device) -> Self {
        let conv = |channels: [usize; 2]| {
            Conv2dConfig::new(channels, [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init::<B>(device)
        };
        Self {
            conv1: conv([3, 16]),
            conv2: conv([16, 32]),
            conv3: conv([32, LAST_CONV_CHANNELS]),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: DropoutConfig::new(DROPOUT).init(),
            fc1: LinearConfig::new(cfg.flattened_len(), HIDDEN_UNITS).init(device),
            fc2: LinearConfig::new(HIDDEN_UNITS, cfg.num_classes.max(1)).init(device),
        }
    }

    /// `[batch, 3, height, width]` → `[batch, num_classes]` logits.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = self.pool.forward(relu(self.conv3.forward(x)));
        let x = self.dropout.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = relu(self.fc1.forward(x));
        self.fc2.forward(x)
    }
}
