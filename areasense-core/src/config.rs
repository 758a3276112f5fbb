//! Tracker configuration
//!
//! Configuration arrives from the host as serde data (any format). Every
//! section uses `#[serde(default)]`, so a partial document only overrides
//! what it names. [`TrackerConfig::validated`] replaces out-of-range values
//! with defaults and reports each substitution as a [`ConfigWarning`]; a bad
//! value never reaches the numeric pipeline.
//!
//! ```rust
//! use areasense_core::TrackerConfig;
//!
//! let mut config = TrackerConfig::default();
//! config.filter.ref_power_dbm = 40.0; // wrong sign
//! let (config, warnings) = config.validated();
//! assert_eq!(warnings.len(), 1);
//! assert_eq!(config.filter.ref_power_dbm, -59.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    constants::{decision, estimator, filter, learning},
    errors::ConfigWarning,
};

/// Which pools a training reset clears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    /// Clear only the calibration pool; automatic learning survives
    #[default]
    TrainedOnly,
    /// Clear calibration and automatic learning for the affected rooms
    TrainedAndAuto,
}

/// Per-link filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// RSSI at one metre (dBm)
    pub ref_power_dbm: f64,
    /// Log-distance path-loss exponent
    pub path_loss_exponent: f64,
    /// RSSI drift per second (dB² / s)
    pub process_noise: f64,
    /// Single-sample measurement noise (dB²)
    pub measurement_noise: f64,
    /// Scale measurement noise with signal weakness
    pub adaptive: bool,
    /// Freshness window for link evidence (seconds)
    pub evidence_window_secs: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ref_power_dbm: filter::DEFAULT_REF_POWER_DBM,
            path_loss_exponent: filter::DEFAULT_PATH_LOSS_EXPONENT,
            process_noise: filter::DEFAULT_PROCESS_NOISE,
            measurement_noise: filter::DEFAULT_MEASUREMENT_NOISE,
            adaptive: true,
            evidence_window_secs: filter::DEFAULT_EVIDENCE_WINDOW_SECS,
        }
    }
}

/// Fingerprint learning settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Largest share of fused weight the auto pool may hold over a converged trained pool
    pub auto_weight_cap: f64,
    /// Minimum learning confidence
    pub min_confidence: f64,
    /// Time in area before auto-learning (seconds)
    pub min_dwell_secs: f64,
    /// Maximum recent raw RSSI variance (dB²)
    pub max_rssi_variance: f64,
    /// Maximum implied velocity (m/s)
    pub max_velocity_mps: f64,
    /// Minimum interval between auto updates of one room (seconds)
    pub min_update_interval_secs: f64,
    /// Pools cleared by `reset_training`
    pub reset_scope: ResetScope,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            auto_weight_cap: learning::DEFAULT_AUTO_WEIGHT_CAP,
            min_confidence: learning::DEFAULT_MIN_LEARNING_CONFIDENCE,
            min_dwell_secs: learning::DEFAULT_MIN_DWELL_SECS,
            max_rssi_variance: learning::DEFAULT_MAX_RSSI_VARIANCE,
            max_velocity_mps: learning::DEFAULT_MAX_VELOCITY_MPS,
            min_update_interval_secs: learning::DEFAULT_MIN_UPDATE_INTERVAL_SECS,
            reset_scope: ResetScope::default(),
        }
    }
}

/// Area decision settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Maximum competing distance (metres)
    pub max_radius: f64,
    /// Margin floor as a fraction of the incumbent distance
    pub stability_margin_percent: f64,
    /// Margin floor in metres
    pub stability_margin_meters: f64,
    /// Consecutive wins for a same-floor switch
    pub same_floor_streak: u32,
    /// Consecutive wins for a cross-floor switch
    pub cross_floor_streak: u32,
    /// Challenger link samples required for a cross-floor switch
    pub cross_floor_min_history: u32,
    /// Use the multi-scanner estimator and fingerprints
    pub ukf_enabled: bool,
    /// Minimum fingerprint score
    pub min_match_score: f64,
    /// Fingerprint score required under an uncertain margin
    pub uncertain_threshold: f64,
    /// Relative margin below which the fingerprint decision is uncertain
    pub decision_margin: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            max_radius: decision::DEFAULT_MAX_RADIUS_M,
            stability_margin_percent: decision::DEFAULT_STABILITY_MARGIN_PERCENT,
            stability_margin_meters: decision::DEFAULT_STABILITY_MARGIN_M,
            same_floor_streak: decision::DEFAULT_SAME_FLOOR_STREAK,
            cross_floor_streak: decision::DEFAULT_CROSS_FLOOR_STREAK,
            cross_floor_min_history: decision::DEFAULT_CROSS_FLOOR_MIN_HISTORY,
            ukf_enabled: true,
            min_match_score: estimator::DEFAULT_MIN_MATCH_SCORE,
            uncertain_threshold: estimator::DEFAULT_UNCERTAIN_THRESHOLD,
            decision_margin: estimator::DEFAULT_DECISION_MARGIN,
        }
    }
}

/// Complete tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TrackerConfig {
    /// Per-link filtering
    pub filter: FilterConfig,
    /// Fingerprint learning
    pub learning: LearningConfig,
    /// Area decisions
    pub decision: DecisionConfig,
}

struct Checker {
    warnings: Vec<ConfigWarning>,
}

impl Checker {
    fn range(&mut self, field: &'static str, value: f64, min: f64, max: f64, default: f64) -> f64 {
        if value.is_finite() && value >= min && value <= max {
            return value;
        }
        self.warnings.push(ConfigWarning::OutOfRange {
            field,
            value,
            min,
            max,
            substituted: default,
        });
        default
    }

    fn range_u32(&mut self, field: &'static str, value: u32, min: u32, max: u32, default: u32) -> u32 {
        self.range(field, value as f64, min as f64, max as f64, default as f64) as u32
    }
}

impl FilterConfig {
    fn validate(self, c: &mut Checker) -> Self {
        let d = Self::default();
        Self {
            ref_power_dbm: c.range(
                "filter.ref_power_dbm",
                self.ref_power_dbm,
                filter::REF_POWER_MIN_DBM,
                filter::REF_POWER_MAX_DBM,
                d.ref_power_dbm,
            ),
            path_loss_exponent: c.range(
                "filter.path_loss_exponent",
                self.path_loss_exponent,
                filter::PATH_LOSS_EXPONENT_MIN,
                filter::PATH_LOSS_EXPONENT_MAX,
                d.path_loss_exponent,
            ),
            process_noise: c.range("filter.process_noise", self.process_noise, 1e-6, 100.0, d.process_noise),
            measurement_noise: c.range(
                "filter.measurement_noise",
                self.measurement_noise,
                1e-3,
                1000.0,
                d.measurement_noise,
            ),
            adaptive: self.adaptive,
            evidence_window_secs: c.range(
                "filter.evidence_window_secs",
                self.evidence_window_secs,
                1.0,
                3600.0,
                d.evidence_window_secs,
            ),
        }
    }
}

impl LearningConfig {
    fn validate(self, c: &mut Checker) -> Self {
        let d = Self::default();
        Self {
            auto_weight_cap: c.range("learning.auto_weight_cap", self.auto_weight_cap, 0.0, 0.95, d.auto_weight_cap),
            min_confidence: c.range("learning.min_confidence", self.min_confidence, 0.0, 1.0, d.min_confidence),
            min_dwell_secs: c.range("learning.min_dwell_secs", self.min_dwell_secs, 0.0, 86_400.0, d.min_dwell_secs),
            max_rssi_variance: c.range(
                "learning.max_rssi_variance",
                self.max_rssi_variance,
                0.1,
                1000.0,
                d.max_rssi_variance,
            ),
            max_velocity_mps: c.range(
                "learning.max_velocity_mps",
                self.max_velocity_mps,
                0.01,
                100.0,
                d.max_velocity_mps,
            ),
            min_update_interval_secs: c.range(
                "learning.min_update_interval_secs",
                self.min_update_interval_secs,
                0.0,
                3600.0,
                d.min_update_interval_secs,
            ),
            reset_scope: self.reset_scope,
        }
    }
}

impl DecisionConfig {
    fn validate(self, c: &mut Checker) -> Self {
        let d = Self::default();
        let same_floor_streak = c.range_u32("decision.same_floor_streak", self.same_floor_streak, 1, 100, d.same_floor_streak);
        let mut cross_floor_streak =
            c.range_u32("decision.cross_floor_streak", self.cross_floor_streak, 1, 200, d.cross_floor_streak);
        if cross_floor_streak <= same_floor_streak {
            c.warnings.push(ConfigWarning::Inconsistent {
                field: "decision.cross_floor_streak",
                reason: "must exceed same_floor_streak, raised to same_floor_streak + 1",
            });
            cross_floor_streak = same_floor_streak + 1;
        }

        let min_match_score = c.range("decision.min_match_score", self.min_match_score, 0.0, 1.0, d.min_match_score);
        let mut uncertain_threshold = c.range(
            "decision.uncertain_threshold",
            self.uncertain_threshold,
            0.0,
            1.0,
            d.uncertain_threshold,
        );
        if uncertain_threshold < min_match_score {
            c.warnings.push(ConfigWarning::Inconsistent {
                field: "decision.uncertain_threshold",
                reason: "below min_match_score, raised to min_match_score",
            });
            uncertain_threshold = min_match_score;
        }

        Self {
            max_radius: c.range("decision.max_radius", self.max_radius, 0.1, 1000.0, d.max_radius),
            stability_margin_percent: c.range(
                "decision.stability_margin_percent",
                self.stability_margin_percent,
                0.0,
                1.0,
                d.stability_margin_percent,
            ),
            stability_margin_meters: c.range(
                "decision.stability_margin_meters",
                self.stability_margin_meters,
                0.0,
                100.0,
                d.stability_margin_meters,
            ),
            same_floor_streak,
            cross_floor_streak,
            cross_floor_min_history: c.range_u32(
                "decision.cross_floor_min_history",
                self.cross_floor_min_history,
                0,
                10_000,
                d.cross_floor_min_history,
            ),
            ukf_enabled: self.ukf_enabled,
            min_match_score,
            uncertain_threshold,
            decision_margin: c.range("decision.decision_margin", self.decision_margin, 0.0, 0.99, d.decision_margin),
        }
    }
}

impl TrackerConfig {
    /// Replace invalid values with defaults
    ///
    /// Each substitution is logged at `warn` level and returned.
    pub fn validated(self) -> (Self, Vec<ConfigWarning>) {
        let mut checker = Checker { warnings: Vec::new() };
        let config = Self {
            filter: self.filter.validate(&mut checker),
            learning: self.learning.validate(&mut checker),
            decision: self.decision.validate(&mut checker),
        };
        for warning in &checker.warnings {
            warning.log();
        }
        (config, checker.warnings)
    }
}
