//! Signal-strength adaptive Kalman filter
//!
//! Weak signals are noisier in multipath environments. The measurement noise
//! scales with the gap between the reference power and the current signal:
//!
//! ```text
//! scale = 10^((P₁ₘ - rssi) / 20)   clamped to [1, 10]
//! R'    = R · scale
//! ```
//!
//! At 1 m (rssi ≈ P₁ₘ) the scale is 1; 20 dB weaker multiplies the noise by
//! 10, which is also the ceiling.

use crate::{
    constants::filter::{
        ADAPTIVE_MAX_SCALE, ADAPTIVE_MIN_SCALE, ADAPTIVE_SCALE_DB, DEFAULT_REF_POWER_DBM, REF_POWER_MAX_DBM,
        REF_POWER_MIN_DBM,
    },
    errors::ConfigWarning,
    time::Timestamp,
};

use super::{is_plausible_rssi, RssiKalman, SignalFilter};

/// Kalman filter whose measurement noise grows as the signal weakens
#[derive(Debug, Clone)]
pub struct AdaptiveRssiKalman {
    inner: RssiKalman,
    ref_power: f64,
}

impl AdaptiveRssiKalman {
    /// Wrap `inner` with the given reference power
    ///
    /// A reference power outside [-100, -20] dBm is replaced by -59 dBm and a
    /// warning describing the substitution is returned.
    pub fn new(inner: RssiKalman, ref_power: f64) -> (Self, Option<ConfigWarning>) {
        let mut filter = Self {
            inner,
            ref_power: DEFAULT_REF_POWER_DBM,
        };
        let warning = filter.set_ref_power(ref_power);
        (filter, warning)
    }

    /// Replace the reference power, validating it
    pub fn set_ref_power(&mut self, ref_power: f64) -> Option<ConfigWarning> {
        if ref_power.is_finite() && (REF_POWER_MIN_DBM..=REF_POWER_MAX_DBM).contains(&ref_power) {
            self.ref_power = ref_power;
            None
        } else {
            self.ref_power = DEFAULT_REF_POWER_DBM;
            Some(ConfigWarning::OutOfRange {
                field: "filter.ref_power_dbm",
                value: ref_power,
                min: REF_POWER_MIN_DBM,
                max: REF_POWER_MAX_DBM,
                substituted: DEFAULT_REF_POWER_DBM,
            })
        }
    }

    /// Reference power in effect (dBm at 1 m)
    pub fn ref_power(&self) -> f64 {
        self.ref_power
    }

    /// Noise multiplier for a measurement of `rssi`
    pub fn noise_scale(&self, rssi: f64) -> f64 {
        let scale = libm::pow(10.0, (self.ref_power - rssi) / ADAPTIVE_SCALE_DB);
        if scale.is_finite() {
            scale.clamp(ADAPTIVE_MIN_SCALE, ADAPTIVE_MAX_SCALE)
        } else {
            ADAPTIVE_MAX_SCALE
        }
    }
}

impl SignalFilter for AdaptiveRssiKalman {
    fn update(&mut self, measurement: f64, timestamp: Timestamp) -> Option<f64> {
        if !is_plausible_rssi(measurement) {
            return self.inner.estimate();
        }
        let noise = self.inner.measurement_noise() * self.noise_scale(measurement);
        self.inner.update_with_noise(measurement, timestamp, noise)
    }

    fn estimate(&self) -> Option<f64> {
        self.inner.estimate()
    }

    fn variance(&self) -> f64 {
        self.inner.variance()
    }

    fn reset(&mut self) {
        self.inner.reset()
    }

    fn last_update(&self) -> Option<Timestamp> {
        self.inner.last_update()
    }

    fn update_count(&self) -> u32 {
        self.inner.update_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adaptive(ref_power: f64) -> AdaptiveRssiKalman {
        AdaptiveRssiKalman::new(RssiKalman::new(0.8, 16.0), ref_power).0
    }

    #[test]
    fn scale_is_clamped() {
        let filter = adaptive(-59.0);
        assert_eq!(filter.noise_scale(-40.0), 1.0);
        assert!((filter.noise_scale(-79.0) - 10.0).abs() < 1e-9);
        assert_eq!(filter.noise_scale(-110.0), 10.0);

        let mid = filter.noise_scale(-69.0);
        assert!((mid - libm::pow(10.0, 0.5)).abs() < 1e-9);
    }

    #[test]
    fn weak_signal_moves_estimate_less() {
        let mut plain = RssiKalman::new(0.8, 16.0);
        let mut weak = adaptive(-59.0);

        plain.update(-59.0, 0);
        weak.update(-59.0, 0);
        assert_eq!(plain.variance(), weak.variance());

        plain.update(-95.0, 1000);
        weak.update(-95.0, 1000);

        let plain_shift = (plain.estimate().unwrap() + 59.0).abs();
        let weak_shift = (weak.estimate().unwrap() + 59.0).abs();
        assert!(weak_shift * 3.0 < plain_shift);
    }

    #[test]
    fn implausible_ref_power_is_replaced() {
        let (filter, warning) = AdaptiveRssiKalman::new(RssiKalman::new(0.8, 16.0), 5.0);
        assert_eq!(filter.ref_power(), DEFAULT_REF_POWER_DBM);
        assert!(matches!(
            warning,
            Some(ConfigWarning::OutOfRange { substituted, .. }) if substituted == DEFAULT_REF_POWER_DBM
        ));

        let (filter, warning) = AdaptiveRssiKalman::new(RssiKalman::new(0.8, 16.0), -65.0);
        assert_eq!(filter.ref_power(), -65.0);
        assert!(warning.is_none());
    }
}
