//! RSSI to distance conversion
//!
//! Log-distance path loss:
//!
//! ```text
//! d  = 10^((P₁ₘ - rssi) / (10·n))
//! σ_d² = (∂d/∂rssi)² · σ_rssi² = (d · ln10 / (10·n))² · σ_rssi²
//! ```
//!
//! The variance is a first-order approximation; it grows quadratically with
//! distance, which is exactly the behaviour the decision margin relies on.

use core::f64::consts::LN_10;

use crate::{
    config::FilterConfig,
    constants::filter::{
        DEFAULT_PATH_LOSS_EXPONENT, MAX_MODEL_DISTANCE_M, MIN_MODEL_DISTANCE_M, PATH_LOSS_EXPONENT_MAX,
        PATH_LOSS_EXPONENT_MIN,
    },
};

/// Converts smoothed RSSI into a distance with uncertainty
pub trait DistanceModel {
    /// Distance in metres for `rssi`
    fn distance(&self, rssi: f64) -> f64;

    /// Distance variance (m²) given the RSSI variance (dB²)
    fn distance_variance(&self, rssi: f64, rssi_variance: f64) -> f64;
}

/// Log-distance path loss model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogDistanceModel {
    /// Received power at 1 m (dBm)
    pub ref_power: f64,
    /// Path loss exponent (2 = free space)
    pub exponent: f64,
}

impl LogDistanceModel {
    /// Model with explicit parameters
    ///
    /// A non-positive or non-finite exponent falls back to the default.
    pub fn new(ref_power: f64, exponent: f64) -> Self {
        let exponent = if exponent.is_finite() && exponent > 0.0 {
            exponent.clamp(PATH_LOSS_EXPONENT_MIN, PATH_LOSS_EXPONENT_MAX)
        } else {
            DEFAULT_PATH_LOSS_EXPONENT
        };
        Self { ref_power, exponent }
    }

    /// Model from filter configuration
    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.ref_power_dbm, config.path_loss_exponent)
    }

    fn raw_distance(&self, rssi: f64) -> f64 {
        libm::pow(10.0, (self.ref_power - rssi) / (10.0 * self.exponent))
    }
}

impl DistanceModel for LogDistanceModel {
    fn distance(&self, rssi: f64) -> f64 {
        let d = self.raw_distance(rssi);
        if d.is_finite() {
            d.clamp(MIN_MODEL_DISTANCE_M, MAX_MODEL_DISTANCE_M)
        } else {
            MAX_MODEL_DISTANCE_M
        }
    }

    fn distance_variance(&self, rssi: f64, rssi_variance: f64) -> f64 {
        let d = self.distance(rssi);
        let derivative = d * LN_10 / (10.0 * self.exponent);
        derivative * derivative * rssi_variance.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_power_is_one_metre() {
        let model = LogDistanceModel::new(-59.0, 3.0);
        assert!((model.distance(-59.0) - 1.0).abs() < 1e-9);
        assert!((model.distance(-89.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn variance_grows_with_distance() {
        let model = LogDistanceModel::new(-59.0, 3.0);
        let near = model.distance_variance(-60.0, 4.0);
        let far = model.distance_variance(-85.0, 4.0);
        assert!(far > near * 10.0);
    }

    #[test]
    fn propagation_matches_closed_form() {
        let model = LogDistanceModel::new(-59.0, 2.0);
        // d = 10 m at -79 dBm with n = 2
        let expected = (10.0 * LN_10 / 20.0) * (10.0 * LN_10 / 20.0) * 9.0;
        assert!((model.distance_variance(-79.0, 9.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn distance_is_bounded() {
        let model = LogDistanceModel::new(-59.0, 3.0);
        assert_eq!(model.distance(-400.0), MAX_MODEL_DISTANCE_M);
        assert_eq!(model.distance(40.0), MIN_MODEL_DISTANCE_M);
    }
}
