//! Weighted least-squares trilateration over all anchors

use nalgebra::{Matrix2, Vector2};

use super::geometry::{centroid, closed_form_trilateration, SINGULARITY_EPS};
use super::PositionEstimator;
use crate::core::RangingSnapshot;

/// Linearized trilateration with inverse-cube range weighting.
///
/// Subtracting anchor 0's squared-range equation from every other
/// anchor's leaves an overdetermined linear system; each equation is
/// weighted `1 / (d^3 + eps)` so that near anchors, whose ranges carry
/// proportionally less noise, dominate the solution.
pub struct WeightedLeastSquares {
    /// Regularizer keeping the weight finite for zero-range measurements
    pub epsilon: f64,
}

impl Default for WeightedLeastSquares {
    fn default() -> Self {
        Self { epsilon: 1e-9 }
    }
}

impl WeightedLeastSquares {
    fn solve(&self, anchors: &[Vector2<f64>], ranges: &[f64]) -> Option<Vector2<f64>> {
        let a0 = anchors[0];
        let r0 = ranges[0];

        let mut normal = Matrix2::zeros();
        let mut rhs = Vector2::zeros();
        for i in 1..anchors.len() {
            let row = 2.0 * (anchors[i] - a0);
            let b = r0 * r0 - ranges[i] * ranges[i] + anchors[i].norm_squared()
                - a0.norm_squared();
            let weight = 1.0 / (ranges[i].powi(3) + self.epsilon);
            normal += weight * row * row.transpose();
            rhs += weight * b * row;
        }

        if normal.determinant().abs() <= SINGULARITY_EPS {
            return None;
        }
        normal
            .try_inverse()
            .map(|inverse| inverse * rhs)
            .filter(|p| p.x.is_finite() && p.y.is_finite())
    }
}

impl PositionEstimator for WeightedLeastSquares {
    fn name(&self) -> &'static str {
        "wls"
    }

    fn estimate(&self, anchors: &[Vector2<f64>], snapshot: &RangingSnapshot) -> Vector2<f64> {
        let ranges = &snapshot.distances;
        if anchors.len() < 3 || ranges.len() < anchors.len() {
            return centroid(anchors);
        }
        self.solve(anchors, ranges)
            .unwrap_or_else(|| closed_form_trilateration(anchors, ranges))
    }
}
