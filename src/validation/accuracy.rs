//! Monte-Carlo accuracy validation
//!
//! Repeatedly drives the full localization pipeline against a fixed
//! layout/target pair and condenses the per-trial errors into summary
//! statistics for reports and dashboards.

use std::collections::VecDeque;

use nalgebra::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::algorithms::gdop;
use crate::engine::LocalizationEngine;

/// One recorded localization outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRecord {
    /// Error magnitude against the simulated truth (meters)
    pub error_m: f64,
    /// Reported signal quality
    pub signal_quality: f64,
}

/// Summary statistics over the recorded trials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyStatistics {
    /// Mean position error (meters)
    pub mean_error_m: f64,
    /// Standard deviation of the position error (meters)
    pub std_dev_error_m: f64,
    /// Root mean square error (meters)
    pub rmse_m: f64,
    /// 95th percentile error (meters)
    pub error_95_percentile_m: f64,
    /// Largest observed error (meters)
    pub max_error_m: f64,
    /// Smallest observed error (meters)
    pub min_error_m: f64,
    /// Share of trials at or under the accuracy target
    pub within_target_rate: f64,
    /// Mean reported signal quality
    pub mean_signal_quality: f64,
    /// Number of trials summarized
    pub sample_count: usize,
}

impl AccuracyStatistics {
    fn empty() -> Self {
        Self {
            mean_error_m: 0.0,
            std_dev_error_m: 0.0,
            rmse_m: 0.0,
            error_95_percentile_m: 0.0,
            max_error_m: 0.0,
            min_error_m: 0.0,
            within_target_rate: 0.0,
            mean_signal_quality: 0.0,
            sample_count: 0,
        }
    }
}

/// Validation verdict with the factors limiting accuracy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub statistics: AccuracyStatistics,
    /// Whether the within-target rate reached the required share
    pub meets_target: bool,
    /// Factors limiting accuracy for this layout
    pub limiting_factors: Vec<String>,
}

/// Monte-Carlo driver accumulating localization outcomes
pub struct AccuracyValidator {
    engine: LocalizationEngine,
    records: VecDeque<FixRecord>,
    max_history_size: usize,
    /// Error level a trial must stay under to count as a success (meters)
    pub target_accuracy_m: f64,
    /// Share of trials that must hit the target (0-1)
    pub required_success_rate: f64,
}

impl AccuracyValidator {
    pub fn new(engine: LocalizationEngine) -> Self {
        Self {
            engine,
            records: VecDeque::new(),
            max_history_size: 10_000,
            target_accuracy_m: 0.05,
            required_success_rate: 0.95,
        }
    }

    pub fn engine(&self) -> &LocalizationEngine {
        &self.engine
    }

    /// Record one pre-computed outcome
    pub fn record(&mut self, record: FixRecord) {
        self.records.push_back(record);
        while self.records.len() > self.max_history_size {
            self.records.pop_front();
        }
    }

    /// Run `trials` localization calls for a fixed target and layout,
    /// replacing any previously recorded history
    pub fn run_trials(
        &mut self,
        rng: &mut impl Rng,
        anchors: &[Vector2<f64>],
        true_position: Vector2<f64>,
        trials: usize,
    ) -> ValidationReport {
        self.records.clear();
        for _ in 0..trials {
            let fix = self.engine.localize(rng, true_position, anchors, 0.0, 0.0);
            self.record(FixRecord {
                error_m: fix.error_m,
                signal_quality: fix.signal_quality,
            });
        }
        self.report(anchors)
    }

    /// Summarize the recorded history
    pub fn statistics(&self) -> AccuracyStatistics {
        if self.records.is_empty() {
            return AccuracyStatistics::empty();
        }
        let n = self.records.len();

        let mean_error_m: f64 =
            self.records.iter().map(|r| r.error_m).sum::<f64>() / n as f64;
        let rmse_m = (self
            .records
            .iter()
            .map(|r| r.error_m.powi(2))
            .sum::<f64>()
            / n as f64)
            .sqrt();
        let variance = self
            .records
            .iter()
            .map(|r| (r.error_m - mean_error_m).powi(2))
            .sum::<f64>()
            / n as f64;

        let mut sorted_errors: Vec<f64> = self.records.iter().map(|r| r.error_m).collect();
        sorted_errors.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let index_95 = ((n as f64 * 0.95).ceil() as usize).saturating_sub(1);
        let error_95_percentile_m = sorted_errors[index_95.min(n - 1)];

        let within_target = self
            .records
            .iter()
            .filter(|r| r.error_m <= self.target_accuracy_m)
            .count();
        let mean_signal_quality =
            self.records.iter().map(|r| r.signal_quality).sum::<f64>() / n as f64;

        AccuracyStatistics {
            mean_error_m,
            std_dev_error_m: variance.sqrt(),
            rmse_m,
            error_95_percentile_m,
            max_error_m: sorted_errors[n - 1],
            min_error_m: sorted_errors[0],
            within_target_rate: within_target as f64 / n as f64,
            mean_signal_quality,
            sample_count: n,
        }
    }

    fn report(&self, anchors: &[Vector2<f64>]) -> ValidationReport {
        let statistics = self.statistics();
        let mut limiting_factors = Vec::new();

        if anchors.len() < 4 {
            limiting_factors
                .push("fewer than 4 anchors, geometry weighting runs without margin".to_string());
        }
        let weight = gdop::gdop_weight(anchors);
        if weight <= gdop::DEGENERATE_GEOMETRY_WEIGHT {
            limiting_factors.push(format!(
                "anchor geometry weight {weight:.2} at or below the degenerate fallback"
            ));
        }
        if statistics.error_95_percentile_m > self.target_accuracy_m {
            limiting_factors.push(format!(
                "95th percentile error {:.3} m above the {:.3} m target",
                statistics.error_95_percentile_m, self.target_accuracy_m
            ));
        }

        ValidationReport {
            meets_target: statistics.within_target_rate >= self.required_success_rate,
            statistics,
            limiting_factors,
        }
    }
}
