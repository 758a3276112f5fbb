//! Per-room RSSI fingerprint
//!
//! An [`AreaProfile`] holds, for one room:
//!
//! - the absolute RSSI each scanner sees from a device in the room, and
//! - the RSSI delta `rssi_a - rssi_b` of every scanner pair (`a < b`).
//!
//! Deltas cancel device transmit-power differences, so a phone and a watch in
//! the same spot produce similar deltas even when their absolutes differ.
//!
//! Pairs are stored sorted by `(scanner_a, scanner_b)` and looked up with a
//! binary search.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::ResetScope,
    fusion::ConfidenceScore,
    model::{AreaId, ScannerId},
    time::Timestamp,
};

use super::estimator::{DualPoolEstimate, FusedEstimate};

/// Absolute RSSI statistics of one scanner in one room
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScannerAbsoluteRssi {
    /// Dual-pool estimate (dBm)
    pub estimate: DualPoolEstimate,
}

/// RSSI delta statistics of one scanner pair in one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerPairCorrelation {
    /// Lower scanner of the pair
    pub scanner_a: ScannerId,
    /// Upper scanner of the pair
    pub scanner_b: ScannerId,
    /// Dual-pool estimate of `rssi_a - rssi_b` (dB)
    pub estimate: DualPoolEstimate,
}

/// Which pool an update feeds
#[derive(Debug, Clone, Copy, PartialEq)]
enum Pool {
    Auto(f64),
    Trained,
}

/// Learned fingerprint of one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaProfile {
    area_id: AreaId,
    #[serde(default)]
    absolute: BTreeMap<ScannerId, ScannerAbsoluteRssi>,
    #[serde(default)]
    pairs: Vec<ScannerPairCorrelation>,
    #[serde(default)]
    auto_updates: u32,
    #[serde(default)]
    trained_updates: u32,
    #[serde(default)]
    last_auto_update: Option<Timestamp>,
}

impl AreaProfile {
    /// Empty profile for `area_id`
    pub fn new(area_id: AreaId) -> Self {
        Self {
            area_id,
            absolute: BTreeMap::new(),
            pairs: Vec::new(),
            auto_updates: 0,
            trained_updates: 0,
            last_auto_update: None,
        }
    }

    /// Room this profile describes
    pub fn area_id(&self) -> &AreaId {
        &self.area_id
    }

    /// One automatic learning step
    ///
    /// `readings` is the per-scanner RSSI of one (aggregated) observation.
    pub fn update_auto(&mut self, readings: &BTreeMap<ScannerId, f64>, confidence: ConfidenceScore, now: Timestamp) {
        if readings.is_empty() {
            return;
        }
        self.apply(readings, Pool::Auto(confidence.as_float()));
        self.auto_updates = self.auto_updates.saturating_add(1);
        self.last_auto_update = Some(now);
    }

    /// One calibration step
    pub fn update_trained(&mut self, readings: &BTreeMap<ScannerId, f64>) {
        if readings.is_empty() {
            return;
        }
        self.apply(readings, Pool::Trained);
        self.trained_updates = self.trained_updates.saturating_add(1);
    }

    fn apply(&mut self, readings: &BTreeMap<ScannerId, f64>, pool: Pool) {
        let finite: Vec<(&ScannerId, f64)> = readings
            .iter()
            .filter(|(_, rssi)| rssi.is_finite())
            .map(|(id, rssi)| (id, *rssi))
            .collect();

        for (scanner, rssi) in &finite {
            let entry = self.absolute.entry((*scanner).clone()).or_default();
            feed(&mut entry.estimate, *rssi, pool);
        }

        // BTreeMap iteration is ordered, so i < j gives scanner_a < scanner_b
        for i in 0..finite.len() {
            for j in (i + 1)..finite.len() {
                let (a, rssi_a) = finite[i];
                let (b, rssi_b) = finite[j];
                let pair = self.pair_entry(a, b);
                feed(&mut pair.estimate, rssi_a - rssi_b, pool);
            }
        }
    }

    fn pair_entry(&mut self, a: &ScannerId, b: &ScannerId) -> &mut ScannerPairCorrelation {
        let idx = match self.find_pair(a, b) {
            Ok(idx) => idx,
            Err(idx) => {
                self.pairs.insert(
                    idx,
                    ScannerPairCorrelation {
                        scanner_a: a.clone(),
                        scanner_b: b.clone(),
                        estimate: DualPoolEstimate::default(),
                    },
                );
                idx
            }
        };
        &mut self.pairs[idx]
    }

    fn find_pair(&self, a: &ScannerId, b: &ScannerId) -> Result<usize, usize> {
        self.pairs
            .binary_search_by(|p| (&p.scanner_a, &p.scanner_b).cmp(&(a, b)))
    }

    /// Fused absolute RSSI of `scanner`
    pub fn absolute(&self, scanner: &ScannerId, auto_weight_cap: f64) -> Option<FusedEstimate> {
        self.absolute.get(scanner)?.estimate.fused(auto_weight_cap)
    }

    /// Fused delta `rssi_first - rssi_second`, in either argument order
    pub fn pair_delta(&self, first: &ScannerId, second: &ScannerId, auto_weight_cap: f64) -> Option<FusedEstimate> {
        if first == second {
            return None;
        }
        let (a, b, sign) = if first < second { (first, second, 1.0) } else { (second, first, -1.0) };
        let idx = self.find_pair(a, b).ok()?;
        let mut fused = self.pairs[idx].estimate.fused(auto_weight_cap)?;
        fused.mean *= sign;
        Some(fused)
    }

    /// All stored pair correlations, sorted
    pub fn pairs(&self) -> &[ScannerPairCorrelation] {
        &self.pairs
    }

    /// Scanners with absolute statistics
    pub fn scanners(&self) -> impl Iterator<Item = &ScannerId> {
        self.absolute.keys()
    }

    /// `(rssi - μ) / σ` against the fused absolute profile
    pub fn absolute_z(&self, scanner: &ScannerId, rssi: f64, auto_weight_cap: f64) -> Option<f64> {
        let fused = self.absolute(scanner, auto_weight_cap)?;
        let z = (rssi - fused.mean) / libm::sqrt(fused.variance);
        z.is_finite().then_some(z)
    }

    /// Learning calls applied (auto + trained)
    pub fn sample_count(&self) -> u32 {
        self.auto_updates.saturating_add(self.trained_updates)
    }

    /// Automatic learning calls applied
    pub fn auto_updates(&self) -> u32 {
        self.auto_updates
    }

    /// Calibration calls applied
    pub fn trained_updates(&self) -> u32 {
        self.trained_updates
    }

    /// Time of the last automatic update
    pub fn last_auto_update(&self) -> Option<Timestamp> {
        self.last_auto_update
    }

    /// Any calibration data present
    pub fn has_trained(&self) -> bool {
        self.absolute.values().any(|s| s.estimate.trained.is_some())
    }

    /// No statistics at all
    pub fn is_empty(&self) -> bool {
        self.absolute.values().all(|s| s.estimate.is_empty()) && self.pairs.iter().all(|p| p.estimate.is_empty())
    }

    /// Clear learned statistics according to `scope`
    pub fn reset(&mut self, scope: ResetScope) {
        for entry in self.absolute.values_mut() {
            entry.estimate.reset(scope);
        }
        for pair in &mut self.pairs {
            pair.estimate.reset(scope);
        }
        self.absolute.retain(|_, s| !s.estimate.is_empty());
        self.pairs.retain(|p| !p.estimate.is_empty());

        self.trained_updates = 0;
        if scope == ResetScope::TrainedAndAuto {
            self.auto_updates = 0;
            self.last_auto_update = None;
        }
    }
}

fn feed(estimate: &mut DualPoolEstimate, value: f64, pool: Pool) {
    match pool {
        Pool::Auto(confidence) => estimate.update_auto(value, confidence),
        Pool::Trained => estimate.update_trained(value),
    }
}
