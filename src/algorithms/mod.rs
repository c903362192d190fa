//! Candidate position estimators and geometry assessment

pub mod circle_intersection;
pub mod gdop;
pub mod geometry;
pub mod least_squares;
pub mod tdoa;

use nalgebra::Vector2;

use crate::core::RangingSnapshot;

pub use circle_intersection::CircleIntersection;
pub use least_squares::WeightedLeastSquares;
pub use tdoa::TdoaPositioning;

/// A single candidate positioning strategy.
///
/// Implementations must degrade gracefully: ill-conditioned input yields
/// the anchor centroid or a closed-form result, never a panic or an
/// error. Estimators are stateless and safe to share across threads.
pub trait PositionEstimator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Produce a candidate position from the anchor layout and one
    /// measurement snapshot
    fn estimate(&self, anchors: &[Vector2<f64>], snapshot: &RangingSnapshot) -> Vector2<f64>;
}

/// The fixed-order candidate set evaluated by the engine.
///
/// Order matters: ties in the selection stage break toward earlier
/// entries, and the first entry doubles as the last-resort estimate when
/// every candidate comes back non-finite.
pub fn candidate_estimators() -> Vec<Box<dyn PositionEstimator>> {
    vec![
        Box::new(WeightedLeastSquares::default()),
        Box::new(TdoaPositioning),
        Box::new(CircleIntersection),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_order_is_stable() {
        let estimators = candidate_estimators();
        let names: Vec<&str> = estimators.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["wls", "tdoa", "circle"]);
    }
}
