//! # `ResNet` Utilities
use burn::nn::Initializer;

/// He-normal initializer for convolutions feeding into a rectifier.
pub static CONV_INTO_RELU_INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: std::f64::consts::SQRT_2,
    fan_out_only: true,
};

/// Get the output resolution for a given input resolution.
///
/// The stride rides on a 1x1 convolution with no padding, so the output
/// extent is the ceiling of the input extent over the stride; the input
/// need not be a multiple of the stride.
///
/// # Arguments
///
/// - `input_resolution`: ``[height_in, width_in]``.
/// - `stride`: the convolution stride.
///
/// # Returns
///
/// ``[height_out, width_out]``
#[inline(always)]
pub fn stride_ceil_output_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    let [height, width] = input_resolution;
    [height.div_ceil(stride), width.div_ceil(stride)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_ceil_output_resolution() {
        assert_eq!(stride_ceil_output_resolution([16, 16], 1), [16, 16]);
        assert_eq!(stride_ceil_output_resolution([16, 8], 2), [8, 4]);
        assert_eq!(stride_ceil_output_resolution([15, 7], 2), [8, 4]);
        assert_eq!(stride_ceil_output_resolution([1, 1], 2), [1, 1]);
    }
}
