#![warn(missing_docs)]
//!# burn-seresnet - SE-ResNet Models for Burn
//!
//! ## Notable Components
//!
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::attention`] - channel-attention layers.
//!     * [`layers::attention::squeeze_excite`] - squeeze-and-excitation gate.
//!   * [`layers::blocks`] - miscellaneous blocks.
//!     * [`layers::blocks::conv_norm`] - ``Conv2d + BatchNorm2d`` block.
//! * [`models`] - complete model families.
//!   * [`models::resnet`] - the `ResNet` / SE-`ResNet` family.

pub mod layers;
pub mod models;
