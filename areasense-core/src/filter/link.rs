//! State of one (device, scanner) link

use crate::{
    constants::filter::RSSI_HISTORY_LEN,
    constants::learning::MIN_HISTORY_FOR_VARIANCE,
    time::{elapsed_secs, Timestamp},
};

use super::{history::RawReading, is_plausible_rssi, LinkFilter, RssiHistory, SignalFilter};

/// Read-only view of a link's filtered state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkEstimate {
    /// Smoothed RSSI (dBm)
    pub smoothed_rssi: f64,
    /// Variance of the smoothed RSSI (dB²)
    pub variance: f64,
    /// Last accepted measurement
    pub last_update: Timestamp,
    /// Measurements since the filter was last reset
    pub sample_count: u32,
}

/// Filter plus raw history for one link
#[derive(Debug, Clone)]
pub struct LinkState {
    filter: LinkFilter,
    history: RssiHistory<RSSI_HISTORY_LEN>,
}

impl LinkState {
    /// New link around `filter`
    pub fn new(filter: LinkFilter) -> Self {
        Self {
            filter,
            history: RssiHistory::new(),
        }
    }

    /// Fold in a raw reading
    ///
    /// A gap longer than `evidence_window_secs` since the last accepted
    /// reading restarts the filter from the wide prior, so a stale estimate
    /// is never blended with a fresh one.
    pub fn observe(&mut self, rssi: f64, timestamp: Timestamp, evidence_window_secs: f64) -> Option<f64> {
        if !is_plausible_rssi(rssi) {
            return self.filter.estimate();
        }
        if let Some(last) = self.filter.last_update() {
            if elapsed_secs(last, timestamp) > evidence_window_secs {
                self.filter.reset();
                self.history.clear();
            }
        }

        let estimate = self.filter.update(rssi, timestamp);
        self.history.push(RawReading { rssi, timestamp });
        estimate
    }

    /// Current estimate, `None` before the first reading
    pub fn estimate(&self) -> Option<LinkEstimate> {
        let smoothed_rssi = self.filter.estimate()?;
        Some(LinkEstimate {
            smoothed_rssi,
            variance: self.filter.variance(),
            last_update: self.filter.last_update().unwrap_or(0),
            sample_count: self.filter.update_count(),
        })
    }

    /// Estimate younger than the evidence window at `now`
    pub fn fresh_estimate(&self, now: Timestamp, evidence_window_secs: f64) -> Option<LinkEstimate> {
        self.estimate()
            .filter(|e| elapsed_secs(e.last_update, now) <= evidence_window_secs)
    }

    /// Sample variance of recent raw readings (dB²)
    pub fn raw_variance(&self) -> Option<f64> {
        self.history.variance(MIN_HISTORY_FOR_VARIANCE)
    }
}
