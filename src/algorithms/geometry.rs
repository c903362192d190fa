//! Shared geometry helpers for the candidate estimators

use nalgebra::{Matrix2, Vector2};

/// Determinant below which a 2x2 system is treated as singular
pub(crate) const SINGULARITY_EPS: f64 = 1e-12;

/// Arithmetic centroid of the anchor layout
pub fn centroid(anchors: &[Vector2<f64>]) -> Vector2<f64> {
    if anchors.is_empty() {
        return Vector2::zeros();
    }
    anchors.iter().fold(Vector2::zeros(), |acc, a| acc + a) / anchors.len() as f64
}

/// Distance from a candidate point to every anchor
pub fn implied_distances(point: &Vector2<f64>, anchors: &[Vector2<f64>]) -> Vec<f64> {
    anchors.iter().map(|a| (point - a).norm()).collect()
}

/// L2 norm of the difference between implied and measured ranges
pub fn range_deviation(point: &Vector2<f64>, anchors: &[Vector2<f64>], measured: &[f64]) -> f64 {
    implied_distances(point, anchors)
        .iter()
        .zip(measured)
        .map(|(implied, d)| (implied - d).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Mean absolute difference between implied and measured ranges
pub fn mean_range_deviation(
    point: &Vector2<f64>,
    anchors: &[Vector2<f64>],
    measured: &[f64],
) -> f64 {
    let n = anchors.len().min(measured.len());
    if n == 0 {
        return 0.0;
    }
    implied_distances(point, anchors)
        .iter()
        .zip(measured)
        .map(|(implied, d)| (implied - d).abs())
        .sum::<f64>()
        / n as f64
}

/// Closed-form trilateration from the first three anchor/range pairs.
///
/// Subtracting anchor 0's squared-range equation from the other two leaves
/// a 2x2 linear system in the target coordinates. Singular geometry
/// degrades to the anchor centroid.
pub fn closed_form_trilateration(anchors: &[Vector2<f64>], ranges: &[f64]) -> Vector2<f64> {
    if anchors.len() < 3 || ranges.len() < 3 {
        return centroid(anchors);
    }

    let (a0, a1, a2) = (anchors[0], anchors[1], anchors[2]);
    let (r0, r1, r2) = (ranges[0], ranges[1], ranges[2]);

    let row1 = 2.0 * (a1 - a0);
    let row2 = 2.0 * (a2 - a0);
    let system = Matrix2::new(row1.x, row1.y, row2.x, row2.y);
    let rhs = Vector2::new(
        r0 * r0 - r1 * r1 + a1.norm_squared() - a0.norm_squared(),
        r0 * r0 - r2 * r2 + a2.norm_squared() - a0.norm_squared(),
    );

    if system.determinant().abs() <= SINGULARITY_EPS {
        return centroid(anchors);
    }
    match system.try_inverse() {
        Some(inverse) => inverse * rhs,
        None => centroid(anchors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> Vec<Vector2<f64>> {
        vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(8.0, 0.0),
            Vector2::new(4.0, 6.0),
        ]
    }

    #[test]
    fn closed_form_recovers_exact_position() {
        let anchors = triangle();
        let target = Vector2::new(3.0, 2.0);
        let ranges: Vec<f64> = anchors.iter().map(|a| (target - a).norm()).collect();

        let solution = closed_form_trilateration(&anchors, &ranges);

        assert_relative_eq!(solution.x, target.x, epsilon = 1e-9);
        assert_relative_eq!(solution.y, target.y, epsilon = 1e-9);
    }

    #[test]
    fn collinear_anchors_fall_back_to_centroid() {
        let anchors = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(5.0, 0.0),
            Vector2::new(10.0, 0.0),
        ];
        let ranges = vec![1.0, 2.0, 3.0];

        let solution = closed_form_trilateration(&anchors, &ranges);

        assert_relative_eq!(solution.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(solution.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn centroid_of_empty_layout_is_origin() {
        assert_eq!(centroid(&[]), Vector2::zeros());
    }

    #[test]
    fn range_deviation_is_zero_at_true_position() {
        let anchors = triangle();
        let target = Vector2::new(2.0, 1.0);
        let ranges: Vec<f64> = anchors.iter().map(|a| (target - a).norm()).collect();

        assert_relative_eq!(range_deviation(&target, &anchors, &ranges), 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            mean_range_deviation(&target, &anchors, &ranges),
            0.0,
            epsilon = 1e-12
        );
    }
}
