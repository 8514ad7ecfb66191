//! Common low-level modules for adding layers and operations in Burn.
pub mod attention;
pub mod blocks;
