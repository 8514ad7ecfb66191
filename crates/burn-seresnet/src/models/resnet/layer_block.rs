//! # `ResNet` Layer Block
//!
//! A [`LayerBlock`] is one stage of the network: a sequence of
//! [`BottleneckBlock`]s sharing an output width, where the first unit
//! performs the stage's stride/channel transition.
//!
//! [`LayerBlockMeta`] defines a common meta API for [`LayerBlock`]
//! and [`LayerBlockConfig`].
//!
//! [`LayerBlockConfig`] implements [`Config`], and provides
//! [`LayerBlockConfig::init`] to initialize a [`LayerBlock`].
//!
//! [`LayerBlock`] implements [`Module`], and provides
//! [`LayerBlock::forward`].

use crate::models::resnet::bottleneck::{
    BottleneckBlock, BottleneckBlockConfig, BottleneckBlockMeta,
};
use crate::models::resnet::util::stride_ceil_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`LayerBlock`] Meta API.
pub trait LayerBlockMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the layers.
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

/// [`LayerBlock`] Configuration.
#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    /// The component blocks.
    pub blocks: Vec<BottleneckBlockConfig>,
}

impl From<Vec<BottleneckBlockConfig>> for LayerBlockConfig {
    fn from(blocks: Vec<BottleneckBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl LayerBlockMeta for LayerBlockConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl LayerBlockConfig {
    /// Build a config.
    ///
    /// The first unit projects from `in_planes` to `out_planes` with the
    /// given stride; the remaining `num_blocks - 1` units are
    /// identity-shortcut blocks at `out_planes`.
    pub fn build(
        num_blocks: usize,
        in_planes: usize,
        mid_planes: usize,
        out_planes: usize,
        stride: usize,
        se: bool,
    ) -> Self {
        let blocks = (0..num_blocks)
            .map(|b| {
                if b == 0 {
                    BottleneckBlockConfig::new(in_planes, mid_planes, out_planes)
                        .with_stride(stride)
                        .with_projection(true)
                        .with_se(se)
                } else {
                    BottleneckBlockConfig::new(out_planes, mid_planes, out_planes).with_se(se)
                }
            })
            .collect();

        Self { blocks }
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }

        for (idx, block) in self.blocks.iter().enumerate() {
            block
                .try_validate()
                .map_err(|err| format!("block[{idx}]: {err}"))?;
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(format!(
                    "block[{}].out_planes({}) != block[{}].in_planes({})\n{:#?}",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                    self,
                ));
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

    /// Apply a mapping over the blocks.
    pub fn map_blocks<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, BottleneckBlockConfig) -> BottleneckBlockConfig,
    {
        Self {
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| f(idx, block))
                .collect(),
        }
    }

    /// Update the squeeze-excitation ratio of every block.
    pub fn with_se_ratio(
        self,
        se_ratio: usize,
    ) -> Self {
        self.map_blocks(&mut |_, block| block.with_se_ratio(se_ratio))
    }

    /// Initialize a new [`LayerBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> LayerBlock<B> {
        self.expect_valid();

        LayerBlock {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }
}

/// Layer block.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<BottleneckBlock<B>>,
}

impl<B: Backend> LayerBlockMeta for LayerBlock<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> LayerBlock<B> {
    /// Apply the layer block.
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

        let x = self.blocks.iter().fold(input, |x, block| block.forward(x));

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_layer_block_config_build() {
        let config = LayerBlockConfig::build(3, 16, 8, 32, 2, false);
        config.expect_valid();
        assert_eq!(config.len(), 3);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([12, 24]), [6, 12]);

        let first = &config.blocks[0];
        assert_eq!(first.in_planes(), 16);
        assert_eq!(first.mid_planes(), 8);
        assert_eq!(first.out_planes(), 32);
        assert_eq!(first.stride(), 2);
        assert!(first.projection);

        for block in &config.blocks[1..] {
            assert_eq!(block.in_planes(), 32);
            assert_eq!(block.mid_planes(), 8);
            assert_eq!(block.out_planes(), 32);
            assert_eq!(block.stride(), 1);
            assert!(!block.projection);
        }
    }

    #[test]
    fn test_layer_block_config_se_threading() {
        let config = LayerBlockConfig::build(2, 16, 8, 32, 2, true).with_se_ratio(8);
        config.expect_valid();
        assert!(config.blocks.iter().all(|block| block.se));
        assert!(config.blocks.iter().all(|block| block.se_ratio == 8));
    }

    #[test]
    #[should_panic(expected = "blocks is empty")]
    fn test_empty_layer_block() {
        LayerBlockConfig::build(0, 16, 8, 32, 2, false).expect_valid();
    }

    #[test]
    fn test_chaining_mismatch() {
        let config = LayerBlockConfig::from(vec![
            BottleneckBlockConfig::new(16, 8, 32)
                .with_stride(2)
                .with_projection(true),
            BottleneckBlockConfig::new(16, 8, 16),
        ]);

        let err = config.try_validate().unwrap_err();
        assert!(err.contains("block[0].out_planes(32) != block[1].in_planes(16)"));
    }

    #[test]
    pub fn test_layer_block() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = LayerBlockConfig::build(2, 8, 4, 16, 2, false);

        let block: LayerBlock<B> = config.init(&device);

        assert_eq!(block.len(), 2);
        assert_eq!(block.in_planes(), 8);
        assert_eq!(block.out_planes(), 16);
        assert_eq!(block.stride(), 2);
        assert_eq!(block.output_resolution([12, 24]), [6, 12]);

        let batch_size = 2;
        let input = Tensor::ones([batch_size, 8, 12, 24], &device);

        let output = block.forward(input.clone());
        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", batch_size),
                ("out_planes", 16),
                ("out_height", 6),
                ("out_width", 12)
            ],
        );

        let mut expected = input;
        for block in block.blocks.iter() {
            expected = block.forward(expected);
        }
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
