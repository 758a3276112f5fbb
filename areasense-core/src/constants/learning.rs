//! Fingerprint Learning Constants
//!
//! Dual-pool (auto + trained) estimators and the quality gates guarding
//! automatic learning.

// ===== ESTIMATOR =====

/// Variance floor applied to every estimator read (dB²).
///
/// After thousands of samples an estimator's variance approaches zero and
/// ordinary multipath noise would look like a many-sigma outlier. Two dB² keeps
/// one standard deviation at ~1.4 dB.
pub const MIN_VARIANCE: f64 = 2.0;

/// Per-sample measurement noise fed to the recursive estimators (dB²).
pub const ESTIMATOR_MEASUREMENT_NOISE: f64 = 16.0;

/// Process noise added per auto update (dB²).
///
/// Lets the automatic pool follow slow changes such as moved furniture.
pub const AUTO_PROCESS_NOISE: f64 = 0.01;

/// Process noise added per trained update (dB²).
///
/// Calibration is treated as ground truth and does not drift.
pub const TRAINED_PROCESS_NOISE: f64 = 0.0;

/// Trained pool counts as converged below this variance (dB²).
///
/// With 16 dB² measurement noise this is reached after four samples.
pub const TRAINED_CONVERGED_VARIANCE: f64 = 5.0;

/// Default cap on the auto pool's share of the fused weight.
///
/// Source: Calibration must keep at least 70% of the fused weight so that
/// automatic learning can refine, never replace, a deliberate training.
pub const DEFAULT_AUTO_WEIGHT_CAP: f64 = 0.30;

/// Auto updates scale measurement noise by `1 / confidence`; this is the
/// lowest confidence used in that division.
pub const MIN_NOISE_CONFIDENCE: f64 = 0.1;

// ===== QUALITY GATES =====

/// Minimum learning confidence for an auto update.
pub const DEFAULT_MIN_LEARNING_CONFIDENCE: f64 = 0.5;

/// Minimum time in the current area before auto-learning (seconds).
///
/// Matches the STATIONARY movement threshold.
pub const DEFAULT_MIN_DWELL_SECS: f64 = 300.0;

/// Maximum recent raw RSSI variance of a contributing link (dB²).
///
/// σ = 5 dB; steadier than a walking person, noisier than a phone on a desk.
pub const DEFAULT_MAX_RSSI_VARIANCE: f64 = 25.0;

/// Maximum implied velocity from distance change (m/s).
///
/// Slow walking is ~1 m/s.
pub const DEFAULT_MAX_VELOCITY_MPS: f64 = 0.5;

/// Minimum interval between auto updates of one room (seconds).
pub const DEFAULT_MIN_UPDATE_INTERVAL_SECS: f64 = 10.0;

/// Minimum scanners in a learning update.
///
/// One scanner gives no pairwise delta and little discrimination.
pub const MIN_LEARNING_SCANNERS: usize = 2;

/// Minimum raw samples in a link's history before its variance is trusted.
pub const MIN_HISTORY_FOR_VARIANCE: usize = 3;

// ===== TRAINING =====

/// Minimum fresh scanners required to accept a training sample.
pub const MIN_TRAINING_SCANNERS: usize = 2;

/// Link variance mapped to zero training quality (dB²).
pub const TRAINING_QUALITY_VARIANCE_SCALE: f64 = 50.0;
