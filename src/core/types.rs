//! Core data types for the positioning engine

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Result of one localization call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// Estimated position in the local station frame (meters)
    pub position: Vector2<f64>,
    /// Magnitude of the estimation error against the simulated truth (meters)
    pub error_m: f64,
    /// Signal quality score in [0, 100]
    pub signal_quality: f64,
}

/// One epoch of synthesized ranging measurements, index-aligned with the
/// anchor layout that produced it
#[derive(Debug, Clone)]
pub struct RangingSnapshot {
    /// Noisy range to each anchor (meters, non-negative)
    pub distances: Vec<f64>,
    /// Time-of-arrival difference of each non-reference anchor against
    /// anchor 0 (seconds, length N-1)
    pub time_differences: Vec<f64>,
    /// Noisy bearing from anchor 0 to the target (radians)
    pub bearing_rad: f64,
}
