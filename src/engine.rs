//! Localization pipeline: candidate selection, geometric blending, and
//! consistency filtering

use nalgebra::Vector2;
use rand::Rng;
use tracing::{debug, warn};

use crate::algorithms::geometry::{centroid, mean_range_deviation, range_deviation};
use crate::algorithms::{candidate_estimators, gdop, PositionEstimator};
use crate::core::{PositionFix, RangingSnapshot};
use crate::measurement::{synthesize_snapshot, NoiseProfile};
use crate::refinement::RangeRefiner;
use crate::utils::config::{EngineConfig, RefinementTrigger};

/// Signal quality reported when fewer than three anchors are available
pub const DEGRADED_SIGNAL_QUALITY: f64 = 50.0;

/// Share of the winning candidate kept at the worst geometry weight;
/// the blend trusts the winner at least this much
const BLEND_WEIGHT_SCALE: f64 = 0.98;
const BLEND_WEIGHT_OFFSET: f64 = 0.02;

/// Divisor mapping the mean range deviation to a centroid pull factor
const CONSISTENCY_PULL_SCALE: f64 = 0.5;
/// Upper bound on the centroid pull factor
const CONSISTENCY_PULL_CAP: f64 = 0.1;

/// Stateless localization engine.
///
/// One call simulates a full UWB measurement epoch for a passenger at a
/// known position: noisy ranging synthesis, three candidate estimates,
/// residual-based selection, geometry-weighted blending, optional
/// nonlinear refinement, and a final range-consistency filter. The
/// engine holds no per-call state and is safe to share across threads;
/// the caller owns the random stream.
pub struct LocalizationEngine {
    config: EngineConfig,
    estimators: Vec<Box<dyn PositionEstimator>>,
    refiner: RangeRefiner,
}

impl Default for LocalizationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl LocalizationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            refiner: RangeRefiner::from_config(&config),
            estimators: candidate_estimators(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Localize a target against the anchor layout.
    ///
    /// Never fails: fewer than three anchors degrade to the layout
    /// centroid with a fixed low-confidence quality, and every numerical
    /// failure further down resolves to a deterministic fallback. With
    /// `force_high_precision` enabled (the default) the `noise_level`
    /// and `multipath_factor` arguments are ignored; see
    /// [`NoiseProfile::resolve`].
    pub fn localize(
        &self,
        rng: &mut impl Rng,
        true_position: Vector2<f64>,
        anchors: &[Vector2<f64>],
        noise_level: f64,
        multipath_factor: f64,
    ) -> PositionFix {
        if anchors.len() < 3 {
            warn!(
                anchor_count = anchors.len(),
                "insufficient anchors, reporting layout centroid"
            );
            let fallback = centroid(anchors);
            return PositionFix {
                position: fallback,
                error_m: (fallback - true_position).norm(),
                signal_quality: DEGRADED_SIGNAL_QUALITY,
            };
        }

        let profile = NoiseProfile::resolve(&self.config, noise_level, multipath_factor);
        let snapshot = synthesize_snapshot(rng, &true_position, anchors, &profile);
        let weight = gdop::gdop_weight(anchors);

        let candidates: Vec<Vector2<f64>> = self
            .estimators
            .iter()
            .map(|estimator| estimator.estimate(anchors, &snapshot))
            .collect();

        let selected = self.select_candidate(&candidates, anchors, &snapshot.distances);
        let blended = blend_toward_centroid(selected, anchors, weight);
        let refined = self.maybe_refine(blended, &true_position, anchors, &snapshot);
        let filtered = self.consistency_filter(refined, anchors, &snapshot.distances);

        PositionFix {
            position: filtered,
            error_m: (filtered - true_position).norm(),
            signal_quality: signal_quality(weight),
        }
    }

    /// Pick the candidate whose implied ranges deviate least from the
    /// measured ones. Non-finite candidates are skipped; ties keep the
    /// earliest candidate; if nothing is finite the raw output of the
    /// first (least-squares) estimator is passed through as a last
    /// resort.
    fn select_candidate(
        &self,
        candidates: &[Vector2<f64>],
        anchors: &[Vector2<f64>],
        measured: &[f64],
    ) -> Vector2<f64> {
        let mut best: Option<(f64, Vector2<f64>)> = None;
        for (estimator, candidate) in self.estimators.iter().zip(candidates) {
            if !(candidate.x.is_finite() && candidate.y.is_finite()) {
                debug!(estimator = estimator.name(), "skipping non-finite candidate");
                continue;
            }
            let deviation = range_deviation(candidate, anchors, measured);
            if best.map_or(true, |(lowest, _)| deviation < lowest) {
                best = Some((deviation, *candidate));
            }
        }

        match best {
            Some((_, winner)) => winner,
            None => {
                warn!("no finite candidate, passing through raw least-squares output");
                candidates[0]
            }
        }
    }

    fn maybe_refine(
        &self,
        blended: Vector2<f64>,
        true_position: &Vector2<f64>,
        anchors: &[Vector2<f64>],
        snapshot: &RangingSnapshot,
    ) -> Vector2<f64> {
        let threshold = self.config.refinement_threshold_m;
        let armed = match self.config.refinement_trigger {
            RefinementTrigger::GroundTruth => (blended - true_position).norm() > threshold,
            RefinementTrigger::ResidualConsistency => {
                mean_range_deviation(&blended, anchors, &snapshot.distances) > threshold
            }
        };
        if !armed {
            return blended;
        }
        debug!("residual refinement armed");
        self.refiner.refine(blended, anchors, &snapshot.distances)
    }

    /// Pull range-inconsistent estimates toward the centroid, then bound
    /// the result to the anchor field. Already-consistent estimates pass
    /// through untouched, so the filter is a fixed point on its own
    /// output.
    fn consistency_filter(
        &self,
        point: Vector2<f64>,
        anchors: &[Vector2<f64>],
        measured: &[f64],
    ) -> Vector2<f64> {
        let center = centroid(anchors);
        let mut corrected = point;

        let deviation = mean_range_deviation(&corrected, anchors, measured);
        if deviation > self.config.consistency_threshold_m {
            let pull = (deviation / CONSISTENCY_PULL_SCALE).min(CONSISTENCY_PULL_CAP);
            corrected += (center - corrected) * pull;
            debug!(deviation, pull, "range consistency pull toward centroid");
        }

        let max_radius = anchors
            .iter()
            .map(|a| (a - center).norm())
            .fold(0.0, f64::max)
            + self.config.max_radius_margin_m;
        let offset = corrected - center;
        let distance = offset.norm();
        if distance > max_radius {
            debug!(distance, max_radius, "projecting estimate back into the anchor field");
            corrected = center + offset * (max_radius / distance);
        }

        corrected
    }
}

/// Shrink the winning candidate toward the anchor centroid in proportion
/// to the geometry weight
fn blend_toward_centroid(
    winner: Vector2<f64>,
    anchors: &[Vector2<f64>],
    weight: f64,
) -> Vector2<f64> {
    let alpha = BLEND_WEIGHT_SCALE * weight + BLEND_WEIGHT_OFFSET;
    winner * alpha + centroid(anchors) * (1.0 - alpha)
}

/// Reported quality is an affine map of the geometry weight. With the
/// weight clamped to [0.7, 1.0] this never drops below 97; it mirrors
/// the layout conditioning, not any received-signal metric.
fn signal_quality(weight: f64) -> f64 {
    90.0 + 10.0 * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn hall_anchors() -> Vec<Vector2<f64>> {
        vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(15.0, 0.0),
            Vector2::new(15.0, 10.0),
            Vector2::new(0.0, 10.0),
            Vector2::new(7.5, 5.0),
        ]
    }

    fn square_anchors() -> Vec<Vector2<f64>> {
        vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(0.0, 10.0),
        ]
    }

    #[test]
    fn two_anchors_degrade_to_centroid_with_low_quality() {
        let engine = LocalizationEngine::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let anchors = vec![Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0)];

        let fix = engine.localize(&mut rng, Vector2::new(3.0, 1.0), &anchors, 0.1, 0.1);

        assert!(fix.position.x.is_finite() && fix.position.y.is_finite());
        assert_eq!(fix.position, Vector2::new(5.0, 0.0));
        assert_eq!(fix.signal_quality, DEGRADED_SIGNAL_QUALITY);
    }

    #[test]
    fn collinear_anchors_stay_finite() {
        let engine = LocalizationEngine::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let anchors = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(5.0, 0.0),
            Vector2::new(10.0, 0.0),
        ];

        let fix = engine.localize(&mut rng, Vector2::new(4.0, 2.0), &anchors, 0.1, 0.1);

        assert!(fix.position.x.is_finite() && fix.position.y.is_finite());
        assert!(fix.error_m.is_finite());
    }

    #[test]
    fn estimate_is_bounded_under_extreme_noise() {
        let config = EngineConfig {
            force_high_precision: false,
            ..EngineConfig::default()
        };
        let engine = LocalizationEngine::new(config);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let anchors = square_anchors();
        let center = centroid(&anchors);
        let max_radius = anchors
            .iter()
            .map(|a| (a - center).norm())
            .fold(0.0, f64::max)
            + engine.config().max_radius_margin_m;

        for _ in 0..50 {
            let fix = engine.localize(&mut rng, Vector2::new(5.0, 5.0), &anchors, 1000.0, 10.0);
            assert!((fix.position - center).norm() <= max_radius + 1e-9);
        }
    }

    #[test]
    fn implied_ranges_stay_consistent_on_a_square_layout() {
        let engine = LocalizationEngine::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let anchors = square_anchors();
        let target = Vector2::new(3.0, 4.0);
        let threshold = engine.config().consistency_threshold_m;

        for _ in 0..20 {
            let fix = engine.localize(&mut rng, target, &anchors, 0.0, 0.0);
            let true_ranges: Vec<f64> = anchors.iter().map(|a| (target - a).norm()).collect();
            // Default noise is sub-centimeter, so the estimate's implied
            // ranges sit well within the consistency band
            let deviation = mean_range_deviation(&fix.position, &anchors, &true_ranges);
            assert!(deviation <= threshold);
        }
    }

    #[test]
    fn consistency_filter_is_idempotent_on_consistent_estimates() {
        let engine = LocalizationEngine::default();
        let anchors = square_anchors();
        let target = Vector2::new(4.0, 6.0);
        let ranges: Vec<f64> = anchors.iter().map(|a| (target - a).norm()).collect();

        let once = engine.consistency_filter(target, &anchors, &ranges);
        let twice = engine.consistency_filter(once, &anchors, &ranges);

        assert_eq!(once, twice);
    }

    #[test]
    fn quality_tracks_geometry_weight() {
        assert_eq!(signal_quality(1.0), 100.0);
        assert_eq!(signal_quality(0.7), 97.0);
    }

    #[test]
    fn hall_layout_reports_quality_in_band() {
        let engine = LocalizationEngine::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let anchors = hall_anchors();

        for _ in 0..20 {
            let fix = engine.localize(&mut rng, Vector2::new(5.0, 3.0), &anchors, 0.0, 0.0);
            assert!((90.0..=100.0).contains(&fix.signal_quality));
        }
    }

    #[test]
    fn residual_trigger_matches_ground_truth_trigger_on_clean_data() {
        let config = EngineConfig {
            refinement_trigger: RefinementTrigger::ResidualConsistency,
            ..EngineConfig::default()
        };
        let engine = LocalizationEngine::new(config);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let anchors = hall_anchors();

        let fix = engine.localize(&mut rng, Vector2::new(5.0, 3.0), &anchors, 0.0, 0.0);

        assert!(fix.error_m < 0.05);
    }
}
