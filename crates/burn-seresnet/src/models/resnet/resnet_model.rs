//! # `ResNet` Core Model
use crate::layers::blocks::conv_norm::{
    Conv2dNormBlock, Conv2dNormBlockConfig, Conv2dNormBlockMeta,
};
use crate::models::resnet::layer_block::{LayerBlock, LayerBlockConfig};
use crate::models::resnet::presets::RESNET50_BLOCKS;
use crate::models::resnet::util::CONV_INTO_RELU_INITIALIZER;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::module::Module;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::{Backend, Config, Tensor};

/// Output planes of the stem convolution.
const STEM_PLANES: usize = 64;

/// Output planes of the final stage; the width of the classifier input.
const HEAD_PLANES: usize = 2048;

/// [`ResNet`] Meta API.
pub trait ResNetMeta {
    /// The number of input image channels.
    fn in_channels(&self) -> usize;

    /// The number of output classes.
    fn num_classes(&self) -> usize;
}

/// [`ResNet`] Config.
///
/// Implements [`ResNetMeta`].
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// The number of output classes.
    pub num_classes: usize,

    /// Bottleneck counts for the four stages.
    #[config(default = "RESNET50_BLOCKS")]
    pub blocks: [usize; 4],

    /// The number of input image channels.
    #[config(default = 3)]
    pub input_channels: usize,

    /// Whether to gate every bottleneck with a squeeze-excitation block.
    #[config(default = false)]
    pub se: bool,

    /// Reduction ratio of the squeeze-excitation gates.
    #[config(default = 16)]
    pub se_ratio: usize,
}

impl ResNetMeta for ResNetConfig {
    fn in_channels(&self) -> usize {
        self.input_channels
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl ResNetConfig {
    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.num_classes == 0 {
            return Err("num_classes must be >= 1".to_string());
        }
        if self.input_channels == 0 {
            return Err("input_channels must be >= 1".to_string());
        }
        for (idx, &count) in self.blocks.iter().enumerate() {
            if count == 0 {
                return Err(format!("blocks[{idx}] must be >= 1"));
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        match self.try_validate() {
            Ok(_) => (),
            Err(err) => panic!("{}", err),
        }
    }

    /// Initialize a [`ResNet`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ResNet<B> {
        self.expect_valid();

        // 3x3 stem conv, stride 1, valid padding
        let stem: Conv2dNormBlockConfig =
            Conv2dConfig::new([self.input_channels, STEM_PLANES], [3, 3])
                .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
                .with_bias(false)
                .into();

        // Residual stages
        let layer1 = LayerBlockConfig::build(self.blocks[0], STEM_PLANES, 64, 256, 1, self.se)
            .with_se_ratio(self.se_ratio);
        let layer2 = LayerBlockConfig::build(self.blocks[1], 256, 128, 512, 2, self.se)
            .with_se_ratio(self.se_ratio);
        let layer3 = LayerBlockConfig::build(self.blocks[2], 512, 256, 1024, 2, self.se)
            .with_se_ratio(self.se_ratio);
        let layer4 = LayerBlockConfig::build(self.blocks[3], 1024, 512, HEAD_PLANES, 2, self.se)
            .with_se_ratio(self.se_ratio);

        // Average pooling [B, 2048, H, W] -> [B, 2048, 1, 1]
        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]);

        // Output layer
        let fc = LinearConfig::new(HEAD_PLANES, self.num_classes);

        ResNet {
            stem: stem.init(device),
            act: Relu::new(),

            layer1: layer1.init(device),
            layer2: layer2.init(device),
            layer3: layer3.init(device),
            layer4: layer4.init(device),

            avgpool: avgpool.init(),
            fc: fc.init(device),
        }
    }
}

/// `ResNet` model.
///
/// Implements [`ResNetMeta`].
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// Stem conv/norm layer.
    pub stem: Conv2dNormBlock<B>,
    /// Stem activation.
    pub act: Relu,

    /// First residual stage.
    pub layer1: LayerBlock<B>,
    /// Second residual stage.
    pub layer2: LayerBlock<B>,
    /// Third residual stage.
    pub layer3: LayerBlock<B>,
    /// Fourth residual stage.
    pub layer4: LayerBlock<B>,

    /// Global average pooling.
    pub avgpool: AdaptiveAvgPool2d,
    /// Classification head.
    pub fc: Linear<B>,
}

impl<B: Backend> ResNetMeta for ResNet<B> {
    fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    fn num_classes(&self) -> usize {
        self.fc.weight.shape().dims[1]
    }
}

impl<B: Backend> ResNet<B> {
    /// `ResNet` forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_channels, height, width]`` image batch.
    ///
    /// # Returns
    ///
    /// A ``[batch, num_classes]`` tensor of raw logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())],
        );

        // Stem
        let x = self.stem.forward(input);
        let x = self.act.forward(x);

        // Residual stages
        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        let x = self.layer4.forward(x);

        // Head
        let x = self.avgpool.forward(x);
        // Reshape [B, C, 1, 1] -> [B, C]
        let x = x.flatten(1, 3);

        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())],
        );

        x
    }
}
