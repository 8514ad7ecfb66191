//! # Squeeze-and-Excitation Gate
//!
//! [`SqueezeExcite`] rescales each channel of its input by a learned,
//! input-dependent gate derived from global spatial statistics.
//!
//! [`SqueezeExciteMeta`] defines a common meta API for [`SqueezeExcite`]
//! and [`SqueezeExciteConfig`].
//!
//! [`SqueezeExciteConfig`] implements [`Config`], and provides
//! [`SqueezeExciteConfig::init`] to initialize a [`SqueezeExcite`].
//!
//! [`SqueezeExcite`] implements [`Module`], and provides
//! [`SqueezeExcite::forward`].

use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::{Linear, LinearConfig, Relu, Sigmoid};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`SqueezeExcite`] Meta trait.
pub trait SqueezeExciteMeta {
    /// The number of channels of the input and output feature map.
    fn channels(&self) -> usize;

    /// The number of hidden units between the `down` and `up` transforms.
    fn reduction_size(&self) -> usize;
}

/// [`SqueezeExcite`] Config.
///
/// Implements [`SqueezeExciteMeta`].
#[derive(Config, Debug)]
pub struct SqueezeExciteConfig {
    /// The number of channels of the input and output feature map.
    pub channels: usize,

    /// Reduction ratio of `channels` to the number of hidden units.
    #[config(default = 16)]
    pub ratio: usize,
}

impl SqueezeExciteMeta for SqueezeExciteConfig {
    fn channels(&self) -> usize {
        self.channels
    }

    fn reduction_size(&self) -> usize {
        self.channels / self.ratio
    }
}

impl SqueezeExciteConfig {
    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.channels == 0 {
            return Err("channels must be >= 1".to_string());
        }
        if self.ratio == 0 {
            return Err("ratio must be >= 1".to_string());
        }
        if self.reduction_size() == 0 {
            return Err(format!(
                "ratio ({}) leaves no reduction units for channels ({})",
                self.ratio, self.channels,
            ));
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

    /// Initialize a [`SqueezeExcite`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> SqueezeExcite<B> {
        self.expect_valid();

        let reduction_size = self.reduction_size();

        SqueezeExcite {
            down: LinearConfig::new(self.channels, reduction_size).init(device),
            up: LinearConfig::new(reduction_size, self.channels).init(device),
            act: Relu::new(),
            gate: Sigmoid::new(),
        }
    }
}

/// Squeeze-and-Excitation gate.
///
/// Implements [`SqueezeExciteMeta`].
#[derive(Module, Debug)]
pub struct SqueezeExcite<B: Backend> {
    /// Channel-reducing linear transform.
    pub down: Linear<B>,

    /// Channel-restoring linear transform.
    pub up: Linear<B>,

    /// Activation between `down` and `up`.
    pub act: Relu,

    /// Gate activation after `up`.
    pub gate: Sigmoid,
}

impl<B: Backend> SqueezeExciteMeta for SqueezeExcite<B> {
    fn channels(&self) -> usize {
        self.down.weight.shape().dims[0]
    }

    fn reduction_size(&self) -> usize {
        self.down.weight.shape().dims[1]
    }
}

impl<B: Backend> SqueezeExcite<B> {
    /// Forward Pass.
    ///
    /// Squeezes the input to per-channel global spatial means, excites the
    /// result through the `down`/`up` transform pair into a per-channel
    /// gate in ``(0, 1)``, and rescales the input by the broadcast gate.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, channels, height, width]`` tensor.
    ///
    /// # Returns
    ///
    /// A ``[batch, channels, height, width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "channels", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("channels", self.channels())],
        );
        let channels = self.channels();

        let squeeze = input
            .clone()
            .mean_dim(3)
            .mean_dim(2)
            .reshape([batch, channels]);

        let x = self.act.forward(self.down.forward(squeeze));
        let x = self.gate.forward(self.up.forward(x));

        let x = x
            .reshape([batch, channels, 1, 1])
            .expand([batch, channels, height, width]);

        let out = input * x;

        assert_shape_contract_periodically!(
            ["batch", "channels", "height", "width"],
            &out,
            &[
                ("batch", batch),
                ("channels", channels),
                ("height", height),
                ("width", width)
            ],
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
    fn test_squeeze_excite_config() {
        let config = SqueezeExciteConfig::new(64);
        assert_eq!(config.channels(), 64);
        assert_eq!(config.ratio, 16);
        assert_eq!(config.reduction_size(), 4);

        let config = config.with_ratio(8);
        assert_eq!(config.reduction_size(), 8);

        config.expect_valid();
    }

    #[test]
    #[should_panic(expected = "leaves no reduction units")]
    fn test_ratio_too_large() {
        type B = NdArray<f32>;
        let device = Default::default();

        let _se: SqueezeExcite<B> = SqueezeExciteConfig::new(8).init(&device);
    }

    #[test]
    #[should_panic(expected = "channels must be >= 1")]
    fn test_zero_channels() {
        SqueezeExciteConfig::new(0).expect_valid();
    }

    #[test]
    fn test_forward_gates_input() {
        type B = NdArray<f32>;
        let device = Default::default();

        let batch_size = 2;
        let channels = 8;

        let se: SqueezeExcite<B> = SqueezeExciteConfig::new(channels)
            .with_ratio(4)
            .init(&device);

        assert_eq!(se.channels(), channels);
        assert_eq!(se.reduction_size(), 2);

        let input = Tensor::ones([batch_size, channels, 5, 3], &device);
        let output = se.forward(input);

        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &output,
            &[
                ("batch", batch_size),
                ("channels", channels),
                ("height", 5),
                ("width", 3)
            ],
        );

        // The input is all-ones, so the output IS the gate; sigmoid output
        // is strictly inside (0, 1).
        let values = output.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&v| v > 0.0 && v < 1.0));
    }

    /// Drives the gate pre-activation to +/-1000, where f32 sigmoid is
    /// exactly 1 or 0.
    fn saturated_se<B: Backend>(
        channels: usize,
        bias: f32,
        device: &B::Device,
    ) -> SqueezeExcite<B> {
        let mut se: SqueezeExcite<B> = SqueezeExciteConfig::new(channels)
            .with_ratio(4)
            .init(device);
        se.up.weight = se.up.weight.map(|w| w.zeros_like());
        se.up.bias = se
            .up
            .bias
            .map(|b| b.map(|t| t.zeros_like().add_scalar(bias)));
        se
    }

    #[test]
    fn test_saturated_open_gate_is_identity() {
        type B = NdArray<f32>;
        let device = Default::default();

        let se = saturated_se::<B>(8, 1000.0, &device);

        let input: Tensor<B, 4> = Tensor::random(
            [2, 8, 4, 4],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = se.forward(input.clone());

        output.to_data().assert_eq(&input.to_data(), true);
    }

    #[test]
    fn test_saturated_closed_gate_is_zero() {
        type B = NdArray<f32>;
        let device = Default::default();

        let se = saturated_se::<B>(8, -1000.0, &device);

        let input: Tensor<B, 4> = Tensor::random(
            [2, 8, 4, 4],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = se.forward(input);

        let values = output.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&v| v == 0.0));
    }
}
