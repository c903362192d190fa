//! Nonlinear range-residual refinement
//!
//! Damped Gauss-Newton minimization of the squared range residuals
//! `sum((|p - a_i| - d_i)^2)`, seeded at the blended pipeline estimate.
//! Every failure path hands the seed back unchanged; the caller decides
//! how much of the refined point to keep.

use nalgebra::{Matrix2, Vector2};

use crate::utils::config::EngineConfig;

const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e8;

/// Range-residual refiner with a hard iteration cap
pub struct RangeRefiner {
    /// Iteration cap for the damped Gauss-Newton loop
    pub max_iterations: usize,
    /// Cost decrease below which the loop stops
    pub cost_tolerance: f64,
    /// Componentwise slack around the anchor bounding box (meters)
    pub bounds_margin_m: f64,
    /// Share of the refined point kept in the final blend
    pub refined_share: f64,
}

impl Default for RangeRefiner {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            cost_tolerance: 1e-15,
            bounds_margin_m: 2.0,
            refined_share: 0.8,
        }
    }
}

impl RangeRefiner {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_iterations: config.refinement_max_iterations,
            cost_tolerance: config.refinement_cost_tolerance,
            bounds_margin_m: config.refinement_bounds_margin_m,
            ..Self::default()
        }
    }

    /// Refine `seed` against the measured ranges.
    ///
    /// The minimizer result is clamped componentwise to the anchor
    /// bounding box plus the configured margin, then blended with the
    /// seed (refined_share refined, remainder seed).
    pub fn refine(
        &self,
        seed: Vector2<f64>,
        anchors: &[Vector2<f64>],
        ranges: &[f64],
    ) -> Vector2<f64> {
        let refined = self.minimize(seed, anchors, ranges).unwrap_or(seed);
        let clamped = self.clamp_to_bounds(refined, anchors);
        self.refined_share * clamped + (1.0 - self.refined_share) * seed
    }

    fn minimize(
        &self,
        seed: Vector2<f64>,
        anchors: &[Vector2<f64>],
        ranges: &[f64],
    ) -> Option<Vector2<f64>> {
        if anchors.is_empty() || ranges.len() < anchors.len() {
            return None;
        }

        let mut estimate = seed;
        let mut cost = residual_cost(&estimate, anchors, ranges);
        if !cost.is_finite() {
            return None;
        }

        let mut damping = 1e-3;
        for _ in 0..self.max_iterations {
            let (gram, gradient) = normal_system(&estimate, anchors, ranges);

            let mut damped = gram;
            damped[(0, 0)] += damping * (1.0 + gram[(0, 0)]);
            damped[(1, 1)] += damping * (1.0 + gram[(1, 1)]);

            let step = damped.try_inverse().map(|inverse| inverse * gradient)?;
            let trial = estimate - step;
            let trial_cost = residual_cost(&trial, anchors, ranges);
            if !trial_cost.is_finite() {
                return None;
            }

            if trial_cost < cost {
                let improvement = cost - trial_cost;
                estimate = trial;
                cost = trial_cost;
                damping = (damping * 0.5).max(MIN_DAMPING);
                if improvement < self.cost_tolerance {
                    break;
                }
            } else {
                damping *= 4.0;
                if damping > MAX_DAMPING {
                    break;
                }
            }
        }

        Some(estimate)
    }

    fn clamp_to_bounds(&self, point: Vector2<f64>, anchors: &[Vector2<f64>]) -> Vector2<f64> {
        if anchors.is_empty() {
            return point;
        }
        let min_x = anchors.iter().map(|a| a.x).fold(f64::INFINITY, f64::min);
        let max_x = anchors.iter().map(|a| a.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = anchors.iter().map(|a| a.y).fold(f64::INFINITY, f64::min);
        let max_y = anchors.iter().map(|a| a.y).fold(f64::NEG_INFINITY, f64::max);

        Vector2::new(
            point
                .x
                .clamp(min_x - self.bounds_margin_m, max_x + self.bounds_margin_m),
            point
                .y
                .clamp(min_y - self.bounds_margin_m, max_y + self.bounds_margin_m),
        )
    }
}

fn residual_cost(point: &Vector2<f64>, anchors: &[Vector2<f64>], ranges: &[f64]) -> f64 {
    anchors
        .iter()
        .zip(ranges)
        .map(|(a, d)| ((point - a).norm() - d).powi(2))
        .sum()
}

/// Gauss-Newton normal equations for the range residuals at `point`
fn normal_system(
    point: &Vector2<f64>,
    anchors: &[Vector2<f64>],
    ranges: &[f64],
) -> (Matrix2<f64>, Vector2<f64>) {
    let mut gram = Matrix2::zeros();
    let mut gradient = Vector2::zeros();
    for (anchor, range) in anchors.iter().zip(ranges) {
        let offset = point - anchor;
        let distance = offset.norm();
        if distance < 1e-12 {
            continue;
        }
        let direction = offset / distance;
        let residual = distance - range;
        gram += direction * direction.transpose();
        gradient += direction * residual;
    }
    (gram, gradient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square_anchors() -> Vec<Vector2<f64>> {
        vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(0.0, 10.0),
        ]
    }

    #[test]
    fn refinement_pulls_a_perturbed_seed_toward_the_target() {
        let anchors = square_anchors();
        let target = Vector2::new(3.0, 4.0);
        let ranges: Vec<f64> = anchors.iter().map(|a| (target - a).norm()).collect();
        let seed = target + Vector2::new(0.4, -0.3);
        let refiner = RangeRefiner::default();

        let refined = refiner.refine(seed, &anchors, &ranges);

        let before = (seed - target).norm();
        let after = (refined - target).norm();
        assert!(after < before);
        // 80/20 blend leaves at most a fifth of the seed offset
        assert!(after <= 0.2 * before + 1e-6);
    }

    #[test]
    fn result_stays_inside_the_anchor_box_margin() {
        let anchors = square_anchors();
        let ranges = vec![500.0; 4];
        let seed = Vector2::new(400.0, -400.0);
        let refiner = RangeRefiner::default();

        let refined = refiner.refine(seed, &anchors, &ranges);

        // The clamp bounds the refined share; the seed share can still
        // carry the point outside, so check against the blended bound.
        let margin = refiner.bounds_margin_m;
        let max_reach = 0.8 * (10.0 + margin) + 0.2 * 400.0;
        assert!(refined.x.abs() <= max_reach + 1e-9);
        assert!(refined.y.abs() <= max_reach + 1e-9);
    }

    #[test]
    fn empty_anchor_set_returns_the_seed() {
        let refiner = RangeRefiner::default();
        let seed = Vector2::new(1.0, 2.0);

        let refined = refiner.refine(seed, &[], &[]);

        assert_relative_eq!(refined.x, seed.x, epsilon = 1e-12);
        assert_relative_eq!(refined.y, seed.y, epsilon = 1e-12);
    }

    #[test]
    fn seed_at_the_optimum_is_a_fixed_point() {
        let anchors = square_anchors();
        let target = Vector2::new(5.0, 5.0);
        let ranges: Vec<f64> = anchors.iter().map(|a| (target - a).norm()).collect();
        let refiner = RangeRefiner::default();

        let refined = refiner.refine(target, &anchors, &ranges);

        assert_relative_eq!(refined.x, target.x, epsilon = 1e-9);
        assert_relative_eq!(refined.y, target.y, epsilon = 1e-9);
    }
}
