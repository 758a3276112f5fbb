//! Dual-pool recursive estimators
//!
//! Each learned statistic (one scanner's absolute RSSI in a room, or one
//! scanner pair's RSSI delta) keeps two independent estimates:
//!
//! - **auto**: fed continuously by the decision loop, small process noise so
//!   it can follow slow drift.
//! - **trained**: fed only by explicit calibration, no process noise.
//!
//! ## Fusion on Read
//!
//! ```text
//! w_i   = 1 / max(σ²_i, MIN_VARIANCE)
//! share = w_auto / (w_auto + w_trained)
//!
//! if trained converged (σ²_t < TRAINED_CONVERGED_VARIANCE) and share > cap:
//!     σ²_auto ← σ²_t,eff · (1 - cap) / cap        (share becomes exactly cap)
//!
//! μ  = Σ w_i μ_i / Σ w_i
//! σ² = max(1 / Σ w_i, MIN_VARIANCE)
//! ```
//!
//! Inverse-variance weighting rewards sample count, so without the cap ten
//! thousand automatic samples would erase a handful of calibration samples.

use serde::{Deserialize, Serialize};

use crate::{
    config::ResetScope,
    constants::learning::{
        AUTO_PROCESS_NOISE, ESTIMATOR_MEASUREMENT_NOISE, MIN_NOISE_CONFIDENCE, MIN_VARIANCE, TRAINED_CONVERGED_VARIANCE,
        TRAINED_PROCESS_NOISE,
    },
};

/// Recursive mean/variance estimate of one quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunningEstimate {
    /// Current mean
    pub mean: f64,
    /// Variance of the mean
    pub variance: f64,
    /// Samples folded in
    pub sample_count: u32,
}

impl RunningEstimate {
    /// Start from a first sample
    pub fn first(value: f64, measurement_noise: f64) -> Self {
        Self {
            mean: value,
            variance: measurement_noise,
            sample_count: 1,
        }
    }

    /// Scalar Kalman step
    ///
    /// ```text
    /// K = P / (P + R)
    /// μ = μ + K(x - μ)
    /// P = (1 - K)P + Q
    /// ```
    pub fn update(&mut self, value: f64, measurement_noise: f64, process_noise: f64) {
        let gain = self.variance / (self.variance + measurement_noise);
        self.mean += gain * (value - self.mean);
        self.variance = (1.0 - gain) * self.variance + process_noise;
        self.sample_count = self.sample_count.saturating_add(1);
    }
}

/// Fused read of a dual-pool estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedEstimate {
    /// Fused mean
    pub mean: f64,
    /// Fused variance, never below [`MIN_VARIANCE`]
    pub variance: f64,
    /// Fraction of the fused weight held by the auto pool
    pub auto_weight: f64,
    /// Total samples across both pools
    pub sample_count: u32,
}

/// Auto and trained estimates of one statistic
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DualPoolEstimate {
    /// Continuous automatic learning
    pub auto: Option<RunningEstimate>,
    /// Explicit calibration
    pub trained: Option<RunningEstimate>,
}

impl DualPoolEstimate {
    /// Fold an automatic sample in
    ///
    /// Low confidence inflates the effective measurement noise:
    /// `R_eff = R / max(confidence, 0.1)`.
    pub fn update_auto(&mut self, value: f64, confidence: f64) {
        if !value.is_finite() {
            return;
        }
        let confidence = if confidence.is_finite() { confidence } else { 0.0 };
        let noise = ESTIMATOR_MEASUREMENT_NOISE / confidence.clamp(MIN_NOISE_CONFIDENCE, 1.0);
        match &mut self.auto {
            Some(estimate) => estimate.update(value, noise, AUTO_PROCESS_NOISE),
            None => self.auto = Some(RunningEstimate::first(value, ESTIMATOR_MEASUREMENT_NOISE)),
        }
    }

    /// Fold a calibration sample in
    pub fn update_trained(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        match &mut self.trained {
            Some(estimate) => estimate.update(value, ESTIMATOR_MEASUREMENT_NOISE, TRAINED_PROCESS_NOISE),
            None => self.trained = Some(RunningEstimate::first(value, ESTIMATOR_MEASUREMENT_NOISE)),
        }
    }

    /// Trained pool exists and is converged
    pub fn trained_converged(&self) -> bool {
        self.trained
            .map(|t| t.variance < TRAINED_CONVERGED_VARIANCE)
            .unwrap_or(false)
    }

    /// Neither pool has data
    pub fn is_empty(&self) -> bool {
        self.auto.is_none() && self.trained.is_none()
    }

    /// Clear pools according to `scope`
    pub fn reset(&mut self, scope: ResetScope) {
        self.trained = None;
        if scope == ResetScope::TrainedAndAuto {
            self.auto = None;
        }
    }

    /// Fuse both pools, capping the auto share against a converged trained pool
    pub fn fused(&self, auto_weight_cap: f64) -> Option<FusedEstimate> {
        match (self.auto, self.trained) {
            (None, None) => None,
            (Some(only), None) => Some(single(only, 1.0)),
            (None, Some(only)) => Some(single(only, 0.0)),
            (Some(auto), Some(trained)) => {
                let trained_var = trained.variance.max(MIN_VARIANCE);
                let mut auto_var = auto.variance.max(MIN_VARIANCE);

                let w_trained = 1.0 / trained_var;
                let natural_share = (1.0 / auto_var) / (1.0 / auto_var + w_trained);
                if self.trained_converged() && natural_share > auto_weight_cap {
                    let cap = auto_weight_cap.clamp(f64::EPSILON, 1.0);
                    auto_var = trained_var * (1.0 - cap) / cap;
                }

                let w_auto = if auto_var > 0.0 { 1.0 / auto_var } else { 0.0 };
                let total = w_auto + w_trained;
                Some(FusedEstimate {
                    mean: (w_auto * auto.mean + w_trained * trained.mean) / total,
                    variance: (1.0 / total).max(MIN_VARIANCE),
                    auto_weight: w_auto / total,
                    sample_count: auto.sample_count.saturating_add(trained.sample_count),
                })
            }
        }
    }
}

fn single(estimate: RunningEstimate, auto_weight: f64) -> FusedEstimate {
    FusedEstimate {
        mean: estimate.mean,
        variance: estimate.variance.max(MIN_VARIANCE),
        auto_weight,
        sample_count: estimate.sample_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::learning::DEFAULT_AUTO_WEIGHT_CAP;

    #[test]
    fn first_sample_has_measurement_noise() {
        let mut pool = DualPoolEstimate::default();
        pool.update_trained(-55.0);
        let trained = pool.trained.unwrap();
        assert_eq!(trained.mean, -55.0);
        assert_eq!(trained.variance, ESTIMATOR_MEASUREMENT_NOISE);
        assert!(!pool.trained_converged());
    }

    #[test]
    fn trained_pool_converges() {
        let mut pool = DualPoolEstimate::default();
        for _ in 0..5 {
            pool.update_trained(-55.0);
        }
        assert!(pool.trained_converged());
    }

    #[test]
    fn auto_share_is_capped() {
        let mut pool = DualPoolEstimate::default();
        for _ in 0..10 {
            pool.update_trained(-55.0);
        }
        for _ in 0..10_000 {
            pool.update_auto(-80.0, 1.0);
        }

        let fused = pool.fused(DEFAULT_AUTO_WEIGHT_CAP).unwrap();
        assert!(fused.auto_weight <= DEFAULT_AUTO_WEIGHT_CAP + 1e-9);
        let bound = -55.0 + DEFAULT_AUTO_WEIGHT_CAP * (-80.0 + 55.0);
        assert!(fused.mean >= bound - 1e-6, "mean {} bound {}", fused.mean, bound);
    }

    #[test]
    fn unconverged_trained_is_not_protected() {
        let mut pool = DualPoolEstimate::default();
        pool.update_trained(-55.0);
        for _ in 0..100 {
            pool.update_auto(-80.0, 1.0);
        }
        let fused = pool.fused(DEFAULT_AUTO_WEIGHT_CAP).unwrap();
        assert!(fused.auto_weight > 0.5);
    }

    #[test]
    fn low_confidence_learns_slower() {
        let mut confident = DualPoolEstimate::default();
        let mut doubtful = DualPoolEstimate::default();
        confident.update_auto(-60.0, 1.0);
        doubtful.update_auto(-60.0, 1.0);

        confident.update_auto(-70.0, 1.0);
        doubtful.update_auto(-70.0, 0.1);

        let c = confident.auto.unwrap().mean;
        let d = doubtful.auto.unwrap().mean;
        assert!((d + 60.0).abs() < (c + 60.0).abs());
    }

    #[test]
    fn reset_scope_is_honoured() {
        let mut pool = DualPoolEstimate::default();
        pool.update_auto(-60.0, 1.0);
        pool.update_trained(-58.0);

        let mut trained_only = pool;
        trained_only.reset(ResetScope::TrainedOnly);
        assert!(trained_only.trained.is_none());
        assert!(trained_only.auto.is_some());

        pool.reset(ResetScope::TrainedAndAuto);
        assert!(pool.is_empty());
    }

    #[test]
    fn fused_variance_is_floored() {
        let mut pool = DualPoolEstimate::default();
        for _ in 0..1000 {
            pool.update_trained(-60.0);
            pool.update_auto(-60.0, 1.0);
        }
        let fused = pool.fused(DEFAULT_AUTO_WEIGHT_CAP).unwrap();
        assert!(fused.variance >= MIN_VARIANCE);
    }
}
