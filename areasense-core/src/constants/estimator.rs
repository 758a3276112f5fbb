//! Multi-Scanner Estimator Constants
//!
//! Unscented Kalman filter over the RSSI of all visible scanners and the
//! fingerprint matcher built on top of it.

// ===== DIMENSIONS =====

/// Maximum simultaneous scanner dimensions per device.
///
/// Sized for a large house. New scanners are admitted strongest first within
/// a tick; once full, further scanners are ignored.
pub const MAX_DIMENSIONS: usize = 12;

/// Sigma point count for [`MAX_DIMENSIONS`].
pub const MAX_SIGMA_POINTS: usize = 2 * MAX_DIMENSIONS + 1;

/// Seconds without observation before a dimension is dropped.
pub const DIMENSION_TIMEOUT_SECS: f64 = 120.0;

// ===== NOISE =====

/// Random-walk drift of the joint RSSI state (dB² / s).
///
/// Smaller than the per-link filter: the joint state follows the room, not
/// the individual advertisement.
pub const UKF_PROCESS_NOISE: f64 = 0.1;

/// Variance given to a newly added dimension (dB²).
pub const UKF_INITIAL_VARIANCE: f64 = 16.0;

/// Ceiling for unobserved dimension variance (dB²).
pub const UKF_MAX_VARIANCE: f64 = 400.0;

/// Floor for every diagonal entry of the state covariance (dB²).
pub const UKF_MIN_VARIANCE: f64 = 0.01;

/// Floor for observation noise taken from the link filter (dB²).
pub const UKF_MIN_MEASUREMENT_NOISE: f64 = 1.0;

/// Diagonal jitter for positive definiteness.
pub const COVARIANCE_JITTER: f64 = 1e-6;

// ===== UNSCENTED TRANSFORM =====

/// Sigma point spread.
///
/// α = 1 keeps sigma points at one standard deviation; the process is a
/// clamped random walk so tighter spreads add nothing.
pub const UKF_ALPHA: f64 = 1.0;

/// Prior distribution knowledge; 2 is optimal for Gaussian.
///
/// Source: Wan & van der Merwe, "The Unscented Kalman Filter for Nonlinear
/// Estimation", 2000
pub const UKF_BETA: f64 = 2.0;

/// Secondary scaling parameter.
pub const UKF_KAPPA: f64 = 0.0;

// ===== MATCHING =====

/// Minimum overlapping scanners between device state and profile.
pub const MIN_MATCH_SCANNERS: usize = 2;

/// Pivot magnitude below which Gauss-Jordan treats a matrix as singular.
pub const SINGULAR_PIVOT: f64 = 1e-12;

/// Default minimum match score to accept a fingerprint.
pub const DEFAULT_MIN_MATCH_SCORE: f64 = 0.30;

/// Default score required when the margin is uncertain.
pub const DEFAULT_UNCERTAIN_THRESHOLD: f64 = 0.50;

/// Default relative margin between best and runner-up.
pub const DEFAULT_DECISION_MARGIN: f64 = 0.15;
