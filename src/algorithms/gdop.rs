//! Geometric dilution-of-precision weighting
//!
//! Condenses the anchor layout's conditioning into a confidence weight in
//! [0.7, 1.0]. The weight feeds the centroid-blending stage and the
//! reported signal quality.

use nalgebra::{DMatrix, Vector2};

/// Weight reported for degenerate layouts (fewer than 3 anchors or a
/// numerically singular geometry matrix)
pub const DEGENERATE_GEOMETRY_WEIGHT: f64 = 0.8;

/// Lower clamp of the geometry weight
pub const GEOMETRY_WEIGHT_FLOOR: f64 = 0.7;

const DETERMINANT_EPS: f64 = 1e-12;

/// Confidence weight for the anchor layout.
///
/// Builds the (N-1)x2 matrix of anchor offsets against anchor 0 and maps
/// `gdop = sqrt(trace((G'G)^-1))` through `1 / (1 + 0.01 * gdop)`. The
/// offset matrix depends only on the anchors, so no target point is
/// taken. Any linear-algebra failure resolves to the fixed 0.8 fallback.
pub fn gdop_weight(anchors: &[Vector2<f64>]) -> f64 {
    if anchors.len() < 3 {
        return DEGENERATE_GEOMETRY_WEIGHT;
    }

    let rows = anchors.len() - 1;
    let mut geometry = DMatrix::zeros(rows, 2);
    for (i, anchor) in anchors.iter().skip(1).enumerate() {
        let offset = anchor - anchors[0];
        geometry[(i, 0)] = offset.x;
        geometry[(i, 1)] = offset.y;
    }

    let gram = geometry.transpose() * &geometry;
    let determinant = gram[(0, 0)] * gram[(1, 1)] - gram[(0, 1)] * gram[(1, 0)];
    if determinant <= DETERMINANT_EPS {
        return DEGENERATE_GEOMETRY_WEIGHT;
    }

    let weight = match gram.try_inverse() {
        Some(inverse) => {
            let gdop = inverse.trace().sqrt();
            1.0 / (1.0 + 0.01 * gdop)
        }
        None => DEGENERATE_GEOMETRY_WEIGHT,
    };

    weight.clamp(GEOMETRY_WEIGHT_FLOOR, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_anchors_use_fixed_fallback() {
        let anchors = vec![Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0)];
        assert_eq!(gdop_weight(&anchors), DEGENERATE_GEOMETRY_WEIGHT);
    }

    #[test]
    fn collinear_layout_uses_fixed_fallback() {
        let anchors = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(5.0, 0.0),
            Vector2::new(10.0, 0.0),
        ];
        assert_eq!(gdop_weight(&anchors), DEGENERATE_GEOMETRY_WEIGHT);
    }

    #[test]
    fn weight_is_always_within_clamp_band() {
        let layouts: Vec<Vec<Vector2<f64>>> = vec![
            vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(0.001, 0.0),
                Vector2::new(0.0, 0.001),
            ],
            vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1000.0, 0.0),
                Vector2::new(0.0, 1000.0),
                Vector2::new(1000.0, 1000.0),
            ],
        ];
        for anchors in layouts {
            let weight = gdop_weight(&anchors);
            assert!((GEOMETRY_WEIGHT_FLOOR..=1.0).contains(&weight));
        }
    }

    #[test]
    fn square_layout_outranks_near_collinear_layout() {
        let square = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(0.0, 10.0),
        ];
        let near_collinear = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(5.0, 0.1),
            Vector2::new(10.0, 0.2),
            Vector2::new(15.0, 0.05),
        ];

        assert!(gdop_weight(&square) >= gdop_weight(&near_collinear));
    }
}
