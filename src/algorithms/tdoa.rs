//! Time-difference-of-arrival positioning

use nalgebra::{DMatrix, DVector, Vector2};

use super::geometry::centroid;
use super::PositionEstimator;
use crate::core::{RangingSnapshot, SPEED_OF_LIGHT};

/// Linearized TDOA solve over the first up-to-3 range-difference
/// equations.
///
/// Each TDOA against anchor 0 scales to a range difference
/// `dr_i = c * tdoa_i`, and squaring the hyperbola equation leaves the
/// linear relation `2(a_i - a_0)·p + 2 dr_i r_0 = |a_i|^2 - |a_0|^2 - dr_i^2`
/// in the unknowns (x, y, r_0). The system is solved by SVD least
/// squares; anything unusable degrades to the anchor centroid.
pub struct TdoaPositioning;

impl TdoaPositioning {
    fn solve(&self, anchors: &[Vector2<f64>], time_differences: &[f64]) -> Option<Vector2<f64>> {
        let equations = time_differences
            .len()
            .min(anchors.len().saturating_sub(1))
            .min(3);
        if equations < 2 {
            return None;
        }

        let mut system = DMatrix::zeros(equations, 3);
        let mut rhs = DVector::zeros(equations);
        for i in 0..equations {
            let offset = anchors[i + 1] - anchors[0];
            let range_difference = time_differences[i] * SPEED_OF_LIGHT;
            system[(i, 0)] = 2.0 * offset.x;
            system[(i, 1)] = 2.0 * offset.y;
            system[(i, 2)] = 2.0 * range_difference;
            rhs[i] = anchors[i + 1].norm_squared()
                - anchors[0].norm_squared()
                - range_difference * range_difference;
        }

        let svd = system.svd(true, true);
        match svd.solve(&rhs, 1e-12) {
            Ok(solution) if solution[0].is_finite() && solution[1].is_finite() => {
                Some(Vector2::new(solution[0], solution[1]))
            }
            _ => None,
        }
    }
}

impl PositionEstimator for TdoaPositioning {
    fn name(&self) -> &'static str {
        "tdoa"
    }

    fn estimate(&self, anchors: &[Vector2<f64>], snapshot: &RangingSnapshot) -> Vector2<f64> {
        if anchors.len() < 3 {
            return centroid(anchors);
        }
        self.solve(anchors, &snapshot.time_differences)
            .unwrap_or_else(|| centroid(anchors))
    }
}
