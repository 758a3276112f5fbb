//! Constants for AreaSense Core
//!
//! Centralized, documented constants used throughout the pipeline. Values
//! that a deployment may reasonably tune are mirrored as defaults in
//! [`crate::config`]; everything else lives here only.
//!
//! ## Organization
//!
//! - **Filter**: per-link RSSI smoothing and path-loss conversion
//! - **Learning**: dual-pool fingerprint estimators and quality gates
//! - **Estimator**: multi-scanner UKF and fingerprint matching
//! - **Decision**: stability margins, streaks and movement states
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Include units in names (`_DBM`, `_SECS`, `_M`)
//! 3. State where the value comes from

/// Per-link RSSI filter constants.
pub mod filter;

/// Fingerprint learning and fusion constants.
pub mod learning;

/// Multi-scanner estimator constants.
pub mod estimator;

/// Area decision constants.
pub mod decision;

pub use filter::{DEFAULT_REF_POWER_DBM, RSSI_MAX_DBM, RSSI_MIN_DBM};
pub use learning::{DEFAULT_AUTO_WEIGHT_CAP, MIN_VARIANCE, TRAINED_CONVERGED_VARIANCE};
pub use estimator::MAX_DIMENSIONS;
