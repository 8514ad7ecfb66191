//! # The Projection Shortcut
//!
//! A [`ProjectionShortcut`] adapts the residual shortcut path when the
//! identity mapping is not shape-compatible: a 1x1 convolution with the
//! block's stride, followed by normalization, and no activation.

use crate::layers::blocks::conv_norm::{
    Conv2dNormBlock, Conv2dNormBlockConfig, Conv2dNormBlockMeta,
};
use crate::models::resnet::util::{CONV_INTO_RELU_INITIALIZER, stride_ceil_output_resolution};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2dConfig;
use burn::nn::{Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`ProjectionShortcut`] Meta trait.
pub trait ProjectionShortcutMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_channels(&self) -> usize;

    /// The stride of the projection.
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

/// [`ProjectionShortcut`] configuration.
#[derive(Config, Debug)]
pub struct ProjectionShortcutConfig {
    /// The size of the in channels dimension.
    in_channels: usize,

    /// The size of the out channels dimension.
    out_channels: usize,

    /// The stride of the projection.
    #[config(default = 1)]
    stride: usize,

    /// The conv initializer.
    #[config(default = "CONV_INTO_RELU_INITIALIZER.clone()")]
    pub initializer: Initializer,
}

impl ProjectionShortcutMeta for ProjectionShortcutConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ProjectionShortcutConfig {
    /// Initialize a [`ProjectionShortcut`] `Module`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ProjectionShortcut<B> {
        let config: Conv2dNormBlockConfig =
            Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
                .with_stride([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Explicit(0, 0))
                .with_initializer(self.initializer.clone())
                .with_bias(false)
                .into();

        ProjectionShortcut {
            conv_norm: config.init(device),
        }
    }
}

/// Projection shortcut layer.
///
/// Maps ``[batch, in_channels, in_height, in_width]`` to
/// ``[batch, out_channels, out_height, out_width]`` tensors.
#[derive(Module, Debug)]
pub struct ProjectionShortcut<B: Backend> {
    /// Embedded conv/norm.
    pub conv_norm: Conv2dNormBlock<B>,
}

impl<B: Backend> ProjectionShortcutMeta for ProjectionShortcut<B> {
    fn in_channels(&self) -> usize {
        self.conv_norm.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.conv_norm.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv_norm.stride()[0]
    }
}

impl<B: Backend> ProjectionShortcut<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_channels, in_height, in_width]`` tensor.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let out = self.conv_norm.forward(input);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_projection_config() {
        let config = ProjectionShortcutConfig::new(2, 4);
        assert_eq!(config.in_channels(), 2);
        assert_eq!(config.out_channels(), 4);
        assert_eq!(config.stride(), 1);
        assert_eq!(config.output_resolution([8, 8]), [8, 8]);

        let config = config.with_stride(2);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([8, 8]), [4, 4]);
        assert_eq!(config.output_resolution([7, 7]), [4, 4]);
    }

    #[test]
    fn test_projection_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let batch_size = 2;
        let in_channels = 2;
        let out_channels = 4;

        let projection: ProjectionShortcut<B> =
            ProjectionShortcutConfig::new(in_channels, out_channels)
                .with_stride(2)
                .init(&device);

        assert_eq!(projection.in_channels(), in_channels);
        assert_eq!(projection.out_channels(), out_channels);
        assert_eq!(projection.stride(), 2);

        let tensor = Tensor::ones([batch_size, in_channels, 8, 8], &device);
        let out = projection.forward(tensor);

        assert_shape_contract!(
            ["batch", "out_channels", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch_size),
                ("out_channels", out_channels),
                ("out_height", 4),
                ("out_width", 4)
            ]
        );
    }

    #[test]
    fn test_projection_forward_odd_extent() {
        type B = NdArray<f32>;
        let device = Default::default();

        let projection: ProjectionShortcut<B> =
            ProjectionShortcutConfig::new(2, 4).with_stride(2).init(&device);

        let tensor = Tensor::ones([1, 2, 7, 5], &device);
        let out = projection.forward(tensor);

        assert_eq!(&out.shape().dims, &[1, 4, 4, 3]);
    }
}
