//! Channel-attention layers.
pub mod squeeze_excite;
