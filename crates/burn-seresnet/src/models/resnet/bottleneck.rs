//! # [`BottleneckBlock`] Block for `ResNet`
//!
//! [`BottleneckBlock`] is the bottleneck form of the core `ResNet`
//! convolution unit: a 1x1 channel-reducing convolution, a 3x3
//! convolution, and a 1x1 channel-expanding convolution, summed with a
//! shortcut path. The block output is not activated after the sum.
//!
//! [`BottleneckBlockMeta`] defines a common meta API for [`BottleneckBlock`]
//! and [`BottleneckBlockConfig`].
//!
//! [`BottleneckBlockConfig`] implements [`Config`], and provides
//! [`BottleneckBlockConfig::init`] to initialize a [`BottleneckBlock`].
//!
//! [`BottleneckBlock`] implements [`Module`], and provides
//! [`BottleneckBlock::forward`].

use crate::layers::attention::squeeze_excite::{SqueezeExcite, SqueezeExciteConfig};
use crate::layers::blocks::conv_norm::{Conv2dNormBlock, Conv2dNormBlockConfig, Conv2dNormBlockMeta};
use crate::models::resnet::projection::{ProjectionShortcut, ProjectionShortcutConfig};
use crate::models::resnet::util::{CONV_INTO_RELU_INITIALIZER, stride_ceil_output_resolution};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2dConfig;
use burn::nn::{Initializer, PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`BottleneckBlock`] Meta trait.
pub trait BottleneckBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of feature planes of the inner 3x3 convolution.
    fn mid_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of the first convolution.
    ///
    /// Applied identically on the shortcut path.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_ceil_output_resolution(input_resolution, self.stride())
    }
}

/// [`BottleneckBlock`] Config.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Config, Debug)]
pub struct BottleneckBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the inner channels dimension.
    pub mid_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the first convolution and the shortcut.
    #[config(default = 1)]
    pub stride: usize,

    /// Whether the shortcut path is a learned projection.
    ///
    /// When `false`, the shortcut is the identity; this requires
    /// `in_planes == out_planes` and `stride == 1`.
    #[config(default = false)]
    pub projection: bool,

    /// Whether to gate the main path with a squeeze-excitation block.
    #[config(default = false)]
    pub se: bool,

    /// Reduction ratio of the squeeze-excitation gate.
    #[config(default = 16)]
    pub se_ratio: usize,

    /// The conv initializer.
    #[config(default = "CONV_INTO_RELU_INITIALIZER.clone()")]
    pub initializer: Initializer,
}

impl BottleneckBlockMeta for BottleneckBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn mid_planes(&self) -> usize {
        self.mid_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BottleneckBlockConfig {
    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.in_planes == 0 || self.mid_planes == 0 || self.out_planes == 0 {
            return Err(format!(
                "plane counts must be >= 1: in={}, mid={}, out={}",
                self.in_planes, self.mid_planes, self.out_planes,
            ));
        }
        if self.stride == 0 {
            return Err("stride must be >= 1".to_string());
        }
        if !self.projection {
            if self.in_planes != self.out_planes {
                return Err(format!(
                    "identity shortcut requires in_planes ({}) == out_planes ({})",
                    self.in_planes, self.out_planes,
                ));
            }
            if self.stride != 1 {
                return Err(format!(
                    "identity shortcut requires stride 1, got {}",
                    self.stride,
                ));
            }
        }
        if self.se {
            SqueezeExciteConfig::new(self.out_planes)
                .with_ratio(self.se_ratio)
                .try_validate()?;
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

    /// Initialize a [`BottleneckBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BottleneckBlock<B> {
        self.expect_valid();

        let cn1: Conv2dNormBlockConfig = Conv2dConfig::new([self.in_planes, self.mid_planes], [1, 1])
            .with_stride([self.stride, self.stride])
            .with_initializer(self.initializer.clone())
            .with_bias(false)
            .into();

        let cn2: Conv2dNormBlockConfig =
            Conv2dConfig::new([self.mid_planes, self.mid_planes], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_initializer(self.initializer.clone())
                .with_bias(false)
                .into();

        let cn3: Conv2dNormBlockConfig =
            Conv2dConfig::new([self.mid_planes, self.out_planes], [1, 1])
                .with_initializer(self.initializer.clone())
                .with_bias(false)
                .into();

        let se = if self.se {
            SqueezeExciteConfig::new(self.out_planes)
                .with_ratio(self.se_ratio)
                .init(device)
                .into()
        } else {
            None
        };

        let shortcut = if self.projection {
            ProjectionShortcutConfig::new(self.in_planes, self.out_planes)
                .with_stride(self.stride)
                .with_initializer(self.initializer)
                .init(device)
                .into()
        } else {
            None
        };

        BottleneckBlock {
            cn1: cn1.init(device),
            cn2: cn2.init(device),
            cn3: cn3.init(device),
            act: Relu::new(),
            se,
            shortcut,
        }
    }
}

/// Bottleneck Block for `ResNet`.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Module, Debug)]
pub struct BottleneckBlock<B: Backend> {
    /// First conv/norm layer; 1x1, carries the stride.
    pub cn1: Conv2dNormBlock<B>,
    /// Second conv/norm layer; 3x3.
    pub cn2: Conv2dNormBlock<B>,
    /// Third conv/norm layer; 1x1, channel-expanding.
    pub cn3: Conv2dNormBlock<B>,

    /// Main path activation.
    pub act: Relu,

    /// Optional squeeze-excitation gate on the main path.
    pub se: Option<SqueezeExcite<B>>,

    /// Optional projection shortcut; identity when absent.
    pub shortcut: Option<ProjectionShortcut<B>>,
}

impl<B: Backend> BottleneckBlockMeta for BottleneckBlock<B> {
    fn in_planes(&self) -> usize {
        self.cn1.in_channels()
    }

    fn mid_planes(&self) -> usize {
        self.cn1.out_channels()
    }

    fn out_planes(&self) -> usize {
        self.cn3.out_channels()
    }

    fn stride(&self) -> usize {
        self.cn1.stride()[0]
    }
}

impl<B: Backend> BottleneckBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_planes, in_height, in_width]`` tensor.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_planes())],
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let identity = match &self.shortcut {
            Some(shortcut) => shortcut.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.act.forward(self.cn1.forward(input));
        let x = self.act.forward(self.cn2.forward(x));
        let x = self.cn3.forward(x);

        let x = match &self.se {
            Some(se) => se.forward(x),
            None => x,
        };

        let x = x + identity;

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
        );

        x
    }

    /// Zero initialize the scale of the last main-path norm layer.
    ///
    /// The main path then contributes nothing at initialization, and the
    /// block starts out as its shortcut.
    pub fn zero_init_residual(&mut self) {
        self.cn3.zero_init_norm();
    }
}
