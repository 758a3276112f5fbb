//! Signal Filter Constants
//!
//! Per-link RSSI smoothing, plausibility bounds and the log-distance
//! path-loss model.

// ===== PLAUSIBILITY BOUNDS =====

/// Weakest RSSI accepted as a real measurement.
///
/// BLE receivers report a noise floor around -100 dBm; readings below
/// -120 dBm are firmware artefacts.
///
/// Source: Bluetooth Core Spec receiver sensitivity (-70 dBm minimum,
/// typical radios reach -97 dBm)
pub const RSSI_MIN_DBM: f64 = -120.0;

/// Strongest RSSI accepted as a real measurement.
///
/// Positive dBm at a receiver means the transmitter is touching the antenna
/// or the report is corrupt.
pub const RSSI_MAX_DBM: f64 = 0.0;

// ===== REFERENCE POWER =====

/// Default RSSI at one metre.
///
/// Source: iBeacon "measured power" default for phones and tags
pub const DEFAULT_REF_POWER_DBM: f64 = -59.0;

/// Lowest plausible reference power.
///
/// A one-metre reading weaker than this means the value was entered in the
/// wrong unit or sign.
pub const REF_POWER_MIN_DBM: f64 = -100.0;

/// Highest plausible reference power.
pub const REF_POWER_MAX_DBM: f64 = -20.0;

// ===== PATH LOSS =====

/// Default path-loss exponent for indoor propagation.
///
/// Free space is 2.0; furnished rooms with walls range 2.7-3.5.
///
/// Source: Rappaport, Wireless Communications, Table 4.2
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 3.0;

/// Smallest accepted path-loss exponent.
pub const PATH_LOSS_EXPONENT_MIN: f64 = 1.5;

/// Largest accepted path-loss exponent.
pub const PATH_LOSS_EXPONENT_MAX: f64 = 6.0;

/// Distance reported for readings weaker than the model can express.
pub const MAX_MODEL_DISTANCE_M: f64 = 100.0;

/// Closest distance the model reports.
pub const MIN_MODEL_DISTANCE_M: f64 = 0.1;

// ===== KALMAN TUNING =====

/// RSSI drift per second (dB² / s).
///
/// A person carrying a phone changes RSSI by a few dB per second while
/// walking; scaled down to the drift of the underlying mean.
pub const DEFAULT_PROCESS_NOISE: f64 = 0.8;

/// Measurement noise of a single advertisement (dB²).
///
/// Multipath fading gives ±4 dB scatter on a static link.
///
/// Source: Empirical spread of ESP32 BLE proxies at 1-5 m
pub const DEFAULT_MEASUREMENT_NOISE: f64 = 16.0;

/// Variance of the reset prior (dB²).
///
/// Wide enough that the first measurement dominates completely.
pub const WIDE_PRIOR_VARIANCE: f64 = 400.0;

/// Ceiling for estimate variance (dB²).
pub const MAX_FILTER_VARIANCE: f64 = 400.0;

/// Floor for estimate variance (dB²).
pub const MIN_FILTER_VARIANCE: f64 = 0.25;

// ===== ADAPTIVE MODE =====

/// dB of attenuation below reference power per decade of noise scaling.
///
/// 20 dB weaker than the one-metre power gives 10× measurement noise.
pub const ADAPTIVE_SCALE_DB: f64 = 20.0;

/// Lower clamp of the adaptive noise factor.
pub const ADAPTIVE_MIN_SCALE: f64 = 1.0;

/// Upper clamp of the adaptive noise factor.
pub const ADAPTIVE_MAX_SCALE: f64 = 10.0;

// ===== LINK HISTORY =====

/// Raw samples retained per link for the stability gate.
///
/// Power of two so the ring index is a mask.
pub const RSSI_HISTORY_LEN: usize = 16;

/// Default freshness window (seconds).
///
/// Scanners report every 1-2 s; twenty seconds tolerates a missed burst
/// without keeping a departed device on the map.
pub const DEFAULT_EVIDENCE_WINDOW_SECS: f64 = 20.0;
