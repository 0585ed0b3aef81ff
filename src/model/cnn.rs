//! CNN Model Architecture
//!
//! A convolutional backbone with a configurable dense classification head.
//! The backbone can restore pretrained weights from a Burn record and keeps
//! its first `frozen_stages` stages non-trainable, so only the late stages
//! adapt to the target domain.
//!
//! This is the single architecture definition used by both training and
//! inference; the inference path rebuilds it from the checkpoint manifest.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig,
        PaddingConfig2d, Relu,
    },
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor},
};

use super::config::ModelConfig;
use crate::utils::error::{LungScanError, Result};

/// One backbone stage: Conv2d, BatchNorm, ReLU, MaxPool
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
    relu: Relu,
    pool: MaxPool2d,
}

impl<B: Backend> ConvStage<B> {
    /// Create a new stage halving the spatial resolution
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the stage
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Convolutional feature extractor with a frozen prefix
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    stages: Vec<ConvStage<B>>,
    frozen_stages: usize,
}

impl<B: Backend> Backbone<B> {
    /// Build the stage stack with filters doubling per stage.
    ///
    /// The first `frozen_stages` stages never receive gradients; only the
    /// remaining late stages adapt during fine-tuning.
    pub fn new(
        in_channels: usize,
        base_filters: usize,
        frozen_stages: usize,
        device: &B::Device,
    ) -> Self {
        let mut stages = Vec::with_capacity(ModelConfig::NUM_STAGES);
        let mut channels = in_channels;

        for stage_idx in 0..ModelConfig::NUM_STAGES {
            let out_channels = base_filters << stage_idx;
            stages.push(ConvStage::new(channels, out_channels, device));
            channels = out_channels;
        }

        Self {
            stages,
            frozen_stages,
        }
    }

    /// Forward pass through all stages.
    ///
    /// The activation leaving the frozen prefix is detached, so no gradient
    /// reaches the frozen stages' parameters.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = x;
        for (idx, stage) in self.stages.iter().enumerate() {
            x = stage.forward(x);
            if idx + 1 == self.frozen_stages {
                x = x.detach();
            }
        }
        x
    }
}

/// One dense head block: Linear, ReLU, BatchNorm, Dropout
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    linear: Linear<B>,
    relu: Relu,
    bn: BatchNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> DenseBlock<B> {
    /// Create a dense block
    pub fn new(d_input: usize, d_output: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(d_input, d_output).init(device),
            relu: Relu::new(),
            bn: BatchNormConfig::new(d_output).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    /// Forward pass through the block.
    ///
    /// Batch normalization expects a channel axis, so the features pass
    /// through it as [batch, features, 1].
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = self.relu.forward(x);

        let [batch_size, features] = x.dims();
        let x = self.bn.forward(x.reshape([batch_size, features, 1]));
        let x = x.reshape([batch_size, features]);

        self.dropout.forward(x)
    }
}

/// Lung condition classifier: partially frozen backbone plus trainable head
#[derive(Module, Debug)]
pub struct LungClassifier<B: Backend> {
    backbone: Backbone<B>,
    global_pool: AdaptiveAvgPool2d,
    blocks: Vec<DenseBlock<B>>,
    classifier: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> LungClassifier<B> {
    /// Build the model from configuration.
    ///
    /// Restores pretrained backbone weights when the config names a record,
    /// then applies the frozen/unfrozen split.
    pub fn new(config: &ModelConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let mut backbone = Backbone::new(
            config.in_channels,
            config.base_filters,
            config.frozen_stages,
            device,
        );

        if let Some(path) = &config.pretrained_backbone {
            let recorder = CompactRecorder::new();
            backbone = backbone
                .load_file(path.clone(), &recorder, device)
                .map_err(|e| {
                    LungScanError::ShapeMismatch(format!(
                        "pretrained backbone at '{}' does not match the configured architecture: {:?}",
                        path.display(),
                        e
                    ))
                })?;
        }

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let mut blocks = Vec::with_capacity(config.hidden_units.len());
        let mut d_input = config.feature_dim();
        for (&width, &dropout) in config.hidden_units.iter().zip(config.dropout_rates.iter()) {
            blocks.push(DenseBlock::new(d_input, width, dropout, device));
            d_input = width;
        }

        let classifier = LinearConfig::new(d_input, config.num_classes).init(device);

        Ok(Self {
            backbone,
            global_pool,
            blocks,
            classifier,
            num_classes: config.num_classes,
        })
    }

    /// Forward pass returning logits of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.backbone.forward(x);

        // Global pooling: [B, C, H, W] -> [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let mut x = x.reshape([batch_size, channels]);

        for block in &self.blocks {
            x = block.forward(x);
        }

        self.classifier.forward(x)
    }

    /// Forward pass with softmax, for inference.
    ///
    /// Each output row is a probability distribution summing to 1.
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn small_config() -> ModelConfig {
        ModelConfig {
            num_classes: 5,
            input_size: 32,
            in_channels: 3,
            base_filters: 4,
            hidden_units: vec![16, 8],
            dropout_rates: vec![0.0, 0.0],
            weight_decay: 0.0,
            frozen_stages: 0,
            pretrained_backbone: None,
        }
    }

    #[test]
    fn test_forward_output_shape() {
        let device = Default::default();
        let model = LungClassifier::<TestBackend>::new(&small_config(), &device).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 5]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let model = LungClassifier::<TestBackend>::new(&small_config(), &device).unwrap();

        let input = Tensor::<TestBackend, 4>::ones([3, 3, 32, 32], &device);
        let probs = model.forward_softmax(input);

        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_frozen_stages_keep_output_shape() {
        let device = Default::default();
        let config = ModelConfig {
            frozen_stages: 3,
            ..small_config()
        };
        let model = LungClassifier::<TestBackend>::new(&config, &device).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        assert_eq!(model.forward(input).dims(), [1, 5]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let device: <TestBackend as Backend>::Device = Default::default();
        let config = ModelConfig {
            num_classes: 0,
            ..small_config()
        };
        assert!(LungClassifier::<TestBackend>::new(&config, &device).is_err());
    }

    #[test]
    fn test_missing_pretrained_backbone_fails() {
        let device: <TestBackend as Backend>::Device = Default::default();
        let config = ModelConfig {
            pretrained_backbone: Some("/nonexistent/backbone".into()),
            ..small_config()
        };
        assert!(LungClassifier::<TestBackend>::new(&config, &device).is_err());
    }
}
