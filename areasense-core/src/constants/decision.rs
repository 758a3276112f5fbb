//! Area Decision Constants
//!
//! Stability margins, streak thresholds and movement-state timing.

// ===== PHYSICAL COMPETITION =====

/// Default maximum radius for a scanner to compete (metres).
pub const DEFAULT_MAX_RADIUS_M: f64 = 20.0;

/// Default relative margin floor (fraction of incumbent distance).
pub const DEFAULT_STABILITY_MARGIN_PERCENT: f64 = 0.10;

/// Default absolute margin floor (metres).
pub const DEFAULT_STABILITY_MARGIN_M: f64 = 0.5;

/// Default consecutive wins for a same-floor switch.
pub const DEFAULT_SAME_FLOOR_STREAK: u32 = 4;

/// Default consecutive wins for a cross-floor switch.
///
/// Floors attenuate 10-20 dB but a phone on a staircase still flickers
/// between them; double the same-floor requirement.
pub const DEFAULT_CROSS_FLOOR_STREAK: u32 = 8;

/// Minimum link samples on the challenger before a cross-floor switch.
pub const DEFAULT_CROSS_FLOOR_MIN_HISTORY: u32 = 10;

/// Incumbent-to-challenger distance ratio treated as overwhelming.
///
/// A ratio of 2 with exponent 3 is ~9 dB; the received amplitude has more
/// than doubled.
pub const ESCAPE_DISTANCE_RATIO: f64 = 2.0;

/// Sigma multiplier while MOVING.
pub const SIGMA_MULT_MOVING: f64 = 1.0;

/// Sigma multiplier while SETTLING.
pub const SIGMA_MULT_SETTLING: f64 = 1.5;

/// Sigma multiplier while STATIONARY.
///
/// A device that has not moved for minutes needs the strongest evidence.
pub const SIGMA_MULT_STATIONARY: f64 = 2.0;

// ===== MOVEMENT STATE =====

/// Seconds after an area change during which the device is MOVING.
pub const MOVING_SECS: f64 = 120.0;

/// Seconds after an area change after which the device is STATIONARY.
pub const STATIONARY_SECS: f64 = 300.0;

// ===== VIRTUAL DISTANCE =====

/// Distance variance assigned to fingerprint candidates (m²).
pub const VIRTUAL_DISTANCE_VARIANCE: f64 = 1.0;

// ===== RSSI FALLBACK =====

/// RSSI advantage a challenger needs when no distance is valid (dB).
pub const RSSI_FALLBACK_MARGIN_DB: f64 = 3.0;

// ===== SOFT INCUMBENT PROTECTION =====

/// RMS z-score up to which secondary scanners "still match" the room.
pub const SOFT_PROTECTION_MAX_Z: f64 = 2.0;

/// Secondary scanners required for soft protection.
pub const SOFT_PROTECTION_MIN_SCANNERS: usize = 1;

// ===== TRACE =====

/// Candidates kept in a decision trace.
pub const MAX_TRACE_CANDIDATES: usize = 8;
