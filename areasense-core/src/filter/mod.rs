//! Per-Link RSSI Filtering
//!
//! ## Overview
//!
//! Every (device, scanner) pair is a link with its own filter. Raw RSSI is
//! noisy (±4 dB multipath scatter on a static link) and arrives irregularly,
//! so each link keeps a one-dimensional Kalman estimate with an explicit
//! variance:
//!
//! ```text
//! Predict:  P = P + q·Δt                 (RSSI drifts while we wait)
//! Update:   K = P / (P + R)
//!           x = x + K·(z - x)
//!           P = (1 - K)·P
//! ```
//!
//! ## Filter Variants
//!
//! - **Plain** ([`RssiKalman`]): fixed measurement noise `R`.
//! - **Adaptive** ([`AdaptiveRssiKalman`]): `R` grows as the signal weakens,
//!   `R' = R · 10^((P₁ₘ - rssi) / 20)` clamped to `[1, 10]`, so distant
//!   readings move the estimate less.
//!
//! Both implement [`SignalFilter`]; [`LinkFilter`] is the tagged variant
//! chosen at construction from [`FilterConfig`].
//!
//! ## Distance
//!
//! [`DistanceModel`] turns an RSSI estimate and its variance into metres and
//! metres² so distance comparisons can use propagated uncertainty instead
//! of a fixed percentage.

pub mod adaptive;
pub mod distance;
pub mod history;
pub mod kalman;
pub mod link;

pub use adaptive::AdaptiveRssiKalman;
pub use distance::{DistanceModel, LogDistanceModel};
pub use history::RssiHistory;
pub use kalman::RssiKalman;
pub use link::{LinkEstimate, LinkState};

use crate::{
    config::FilterConfig,
    constants::filter::{RSSI_MAX_DBM, RSSI_MIN_DBM},
    time::Timestamp,
};

/// Capability interface shared by all link filters
pub trait SignalFilter {
    /// Fold in one measurement; returns the new estimate
    ///
    /// Implausible measurements (non-finite, outside the physical RSSI range)
    /// are ignored and the current estimate is returned unchanged.
    fn update(&mut self, measurement: f64, timestamp: Timestamp) -> Option<f64>;

    /// Current smoothed RSSI, `None` before the first measurement
    fn estimate(&self) -> Option<f64>;

    /// Variance of the estimate (dB²)
    fn variance(&self) -> f64;

    /// Return to the wide prior
    fn reset(&mut self);

    /// Timestamp of the last accepted measurement
    fn last_update(&self) -> Option<Timestamp>;

    /// Accepted measurements since the last reset
    fn update_count(&self) -> u32;
}

/// Physically possible RSSI reading
pub fn is_plausible_rssi(rssi: f64) -> bool {
    rssi.is_finite() && (RSSI_MIN_DBM..=RSSI_MAX_DBM).contains(&rssi)
}

/// Filter variant selected at construction
#[derive(Debug, Clone)]
pub enum LinkFilter {
    /// Fixed measurement noise
    Plain(RssiKalman),
    /// Measurement noise scaled by signal weakness
    Adaptive(AdaptiveRssiKalman),
}

impl LinkFilter {
    /// Build the variant requested by `config`
    ///
    /// An implausible reference power is replaced by the default and logged.
    pub fn from_config(config: &FilterConfig) -> Self {
        let kalman = RssiKalman::new(config.process_noise, config.measurement_noise);
        if config.adaptive {
            let (filter, warning) = AdaptiveRssiKalman::new(kalman, config.ref_power_dbm);
            if let Some(warning) = warning {
                warning.log();
            }
            LinkFilter::Adaptive(filter)
        } else {
            LinkFilter::Plain(kalman)
        }
    }

    fn inner(&self) -> &dyn SignalFilter {
        match self {
            LinkFilter::Plain(f) => f,
            LinkFilter::Adaptive(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SignalFilter {
        match self {
            LinkFilter::Plain(f) => f,
            LinkFilter::Adaptive(f) => f,
        }
    }
}

impl SignalFilter for LinkFilter {
    fn update(&mut self, measurement: f64, timestamp: Timestamp) -> Option<f64> {
        self.inner_mut().update(measurement, timestamp)
    }

    fn estimate(&self) -> Option<f64> {
        self.inner().estimate()
    }

    fn variance(&self) -> f64 {
        self.inner().variance()
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn last_update(&self) -> Option<Timestamp> {
        self.inner().last_update()
    }

    fn update_count(&self) -> u32 {
        self.inner().update_count()
    }
}
