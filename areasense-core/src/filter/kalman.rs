//! Scalar Kalman filter for RSSI
//!
//! State is the mean RSSI of one link. The process model is a random walk
//! whose variance grows linearly with elapsed time, so an estimate that has
//! not been refreshed for a while is trusted less.

use crate::{
    constants::filter::{MAX_FILTER_VARIANCE, MIN_FILTER_VARIANCE, WIDE_PRIOR_VARIANCE},
    time::{elapsed_secs, Timestamp},
};

use super::{is_plausible_rssi, SignalFilter};

/// One-dimensional Kalman filter over RSSI
#[derive(Debug, Clone)]
pub struct RssiKalman {
    /// Current estimate, `None` before the first measurement
    estimate: Option<f64>,
    /// Estimate variance (dB²)
    variance: f64,
    /// Timestamp of last accepted measurement
    last_update: Option<Timestamp>,
    /// Drift per second (dB² / s)
    process_noise: f64,
    /// Base measurement noise (dB²)
    measurement_noise: f64,
    /// Accepted measurements since reset
    update_count: u32,
}

impl RssiKalman {
    /// Create a filter at the wide prior
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            estimate: None,
            variance: WIDE_PRIOR_VARIANCE,
            last_update: None,
            process_noise: process_noise.abs(),
            measurement_noise: measurement_noise.abs().max(MIN_FILTER_VARIANCE),
            update_count: 0,
        }
    }

    /// Base measurement noise (dB²)
    pub fn measurement_noise(&self) -> f64 {
        self.measurement_noise
    }

    /// Predict to `timestamp` without a measurement
    ///
    /// Variance grows by `q·Δt`, capped at the filter ceiling.
    pub fn predict(&mut self, timestamp: Timestamp) {
        if let Some(last) = self.last_update {
            let dt = elapsed_secs(last, timestamp);
            self.variance = (self.variance + self.process_noise * dt).min(MAX_FILTER_VARIANCE);
        }
    }

    /// Update with an explicit measurement noise
    ///
    /// Used by the adaptive variant; the plain [`SignalFilter::update`] passes
    /// the base noise.
    pub fn update_with_noise(&mut self, measurement: f64, timestamp: Timestamp, noise: f64) -> Option<f64> {
        if !is_plausible_rssi(measurement) || !noise.is_finite() || noise <= 0.0 {
            return self.estimate;
        }

        let estimate = match self.estimate {
            None => {
                // First measurement: adopt it with the measurement's own uncertainty
                self.variance = noise.clamp(MIN_FILTER_VARIANCE, MAX_FILTER_VARIANCE);
                measurement
            }
            Some(previous) => {
                self.predict(timestamp);
                let gain = self.variance / (self.variance + noise);
                self.variance = ((1.0 - gain) * self.variance).max(MIN_FILTER_VARIANCE);
                previous + gain * (measurement - previous)
            }
        };

        self.estimate = Some(estimate);
        self.last_update = Some(timestamp.max(self.last_update.unwrap_or(0)));
        self.update_count = self.update_count.saturating_add(1);
        self.estimate
    }
}

impl SignalFilter for RssiKalman {
    fn update(&mut self, measurement: f64, timestamp: Timestamp) -> Option<f64> {
        let noise = self.measurement_noise;
        self.update_with_noise(measurement, timestamp, noise)
    }

    fn estimate(&self) -> Option<f64> {
        self.estimate
    }

    fn variance(&self) -> f64 {
        self.variance
    }

    fn reset(&mut self) {
        self.estimate = None;
        self.variance = WIDE_PRIOR_VARIANCE;
        self.last_update = None;
        self.update_count = 0;
    }

    fn last_update(&self) -> Option<Timestamp> {
        self.last_update
    }

    fn update_count(&self) -> u32 {
        self.update_count
    }
}
