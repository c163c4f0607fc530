//! CLI command implementations.

pub mod bank;
pub mod render;
pub mod score;
