//! # `ResNet` Depth Presets

use crate::models::resnet::resnet_model::ResNetConfig;
use serde::{Deserialize, Serialize};

/// Per-stage bottleneck counts of `ResNet50`.
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];

/// Per-stage bottleneck counts of `ResNet101`.
pub const RESNET101_BLOCKS: [usize; 4] = [3, 4, 23, 3];

/// Per-stage bottleneck counts of `ResNet152`.
pub const RESNET152_BLOCKS: [usize; 4] = [3, 8, 36, 3];

/// A named depth of the `ResNet` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResNetDepth {
    /// The 50-layer configuration.
    Depth50,

    /// The 101-layer configuration.
    Depth101,

    /// The 152-layer configuration.
    Depth152,
}

impl ResNetDepth {
    /// The per-stage bottleneck counts for this depth.
    pub const fn block_counts(self) -> [usize; 4] {
        match self {
            ResNetDepth::Depth50 => RESNET50_BLOCKS,
            ResNetDepth::Depth101 => RESNET101_BLOCKS,
            ResNetDepth::Depth152 => RESNET152_BLOCKS,
        }
    }

    /// Build a [`ResNetConfig`] for this depth.
    pub fn to_config(
        self,
        num_classes: usize,
    ) -> ResNetConfig {
        ResNetConfig::new(num_classes).with_blocks(self.block_counts())
    }
}

impl ResNetConfig {
    /// `ResNet50` configuration.
    pub fn resnet50(num_classes: usize) -> Self {
        ResNetDepth::Depth50.to_config(num_classes)
    }

    /// `ResNet101` configuration.
    pub fn resnet101(num_classes: usize) -> Self {
        ResNetDepth::Depth101.to_config(num_classes)
    }

    /// `ResNet152` configuration.
    pub fn resnet152(num_classes: usize) -> Self {
        ResNetDepth::Depth152.to_config(num_classes)
    }
}
