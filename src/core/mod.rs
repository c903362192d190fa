//! Core types and constants shared across the engine

pub mod constants;
pub mod types;

pub use constants::SPEED_OF_LIGHT;
pub use types::{PositionFix, RangingSnapshot};
