//! Pairwise circle-intersection trilateration

use nalgebra::Vector2;

use super::geometry::{centroid, closed_form_trilateration};
use super::PositionEstimator;
use crate::core::RangingSnapshot;

const COLLINEARITY_EPS: f64 = 1e-9;

/// Closed-form intersection of the first two range circles,
/// disambiguated against the third.
///
/// The radical-line construction yields the two intersection points of
/// circles 0 and 1; the point whose distance to anchor 2 best matches
/// the third range wins. Collinear anchors and circles that do not
/// properly intersect degrade to the shared closed-form solve, which in
/// turn degrades to the centroid.
pub struct CircleIntersection;

impl CircleIntersection {
    fn intersect(&self, anchors: &[Vector2<f64>], ranges: &[f64]) -> Option<Vector2<f64>> {
        let (c0, c1, c2) = (anchors[0], anchors[1], anchors[2]);
        let (r0, r1, r2) = (ranges[0], ranges[1], ranges[2]);

        let cross = (c1 - c0).perp(&(c2 - c0));
        if cross.abs() < COLLINEARITY_EPS {
            return None;
        }

        let separation = (c1 - c0).norm();
        if separation < COLLINEARITY_EPS {
            return None;
        }
        if separation > r0 + r1 || separation < (r0 - r1).abs() {
            return None;
        }

        let along = (r0 * r0 - r1 * r1 + separation * separation) / (2.0 * separation);
        let height_squared = r0 * r0 - along * along;
        if height_squared < 0.0 {
            return None;
        }
        let height = height_squared.sqrt();

        let direction = (c1 - c0) / separation;
        let base = c0 + along * direction;
        let normal = Vector2::new(-direction.y, direction.x);
        let upper = base + height * normal;
        let lower = base - height * normal;

        let upper_misfit = ((upper - c2).norm() - r2).abs();
        let lower_misfit = ((lower - c2).norm() - r2).abs();
        Some(if upper_misfit <= lower_misfit {
            upper
        } else {
            lower
        })
    }
}

impl PositionEstimator for CircleIntersection {
    fn name(&self) -> &'static str {
        "circle"
    }

    fn estimate(&self, anchors: &[Vector2<f64>], snapshot: &RangingSnapshot) -> Vector2<f64> {
        let ranges = &snapshot.distances;
        if anchors.len() < 3 || ranges.len() < 3 {
            return centroid(anchors);
        }
        self.intersect(anchors, ranges)
            .unwrap_or_else(|| closed_form_trilateration(anchors, ranges))
    }
}
