//! Per-device decision state and diagnostics

use serde::{Deserialize, Serialize};

use crate::{
    constants::decision::{
        MOVING_SECS, SIGMA_MULT_MOVING, SIGMA_MULT_SETTLING, SIGMA_MULT_STATIONARY, STATIONARY_SECS,
    },
    fusion::ConfidenceScore,
    model::{AreaId, FloorId, ScannerId},
    time::{elapsed_secs, Timestamp},
};

/// How recently the device changed room
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementState {
    /// Changed room within `MOVING_SECS`
    #[default]
    Moving,
    /// Between `MOVING_SECS` and `STATIONARY_SECS`
    Settling,
    /// No change for `STATIONARY_SECS`
    Stationary,
}

impl MovementState {
    /// State after `secs` in the current room
    pub fn from_dwell(secs: f64) -> Self {
        if secs < MOVING_SECS {
            MovementState::Moving
        } else if secs < STATIONARY_SECS {
            MovementState::Settling
        } else {
            MovementState::Stationary
        }
    }

    /// Sigma multiplier applied to the distance-uncertainty margin
    pub fn sigma_multiplier(self) -> f64 {
        match self {
            MovementState::Moving => SIGMA_MULT_MOVING,
            MovementState::Settling => SIGMA_MULT_SETTLING,
            MovementState::Stationary => SIGMA_MULT_STATIONARY,
        }
    }
}

/// Area assignment of one device
///
/// `current_area_id == None` is the bootstrap state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceAreaState {
    /// Room the device is in
    pub current_area_id: Option<AreaId>,
    /// Floor of that room
    pub current_floor_id: Option<FloorId>,
    /// Challenger currently building a streak
    pub pending_area_id: Option<AreaId>,
    /// Consecutive ticks the challenger has won
    pub pending_streak: u32,
    /// Area pinned by training
    pub area_locked: bool,
    /// Movement classification as of the last decision
    pub movement_state: MovementState,
    /// When the current room was entered
    pub last_area_change: Option<Timestamp>,
    /// Distance to the current room's evidence
    pub last_good_distance: Option<f64>,
    /// When `last_good_distance` was measured
    pub last_distance_time: Option<Timestamp>,
}

impl DeviceAreaState {
    /// Seconds since the current room was entered
    pub fn dwell_secs(&self, now: Timestamp) -> f64 {
        match (self.current_area_id.as_ref(), self.last_area_change) {
            (Some(_), Some(since)) => elapsed_secs(since, now),
            _ => 0.0,
        }
    }

    /// Movement state at `now`
    pub fn movement_at(&self, now: Timestamp) -> MovementState {
        if self.current_area_id.is_none() {
            return MovementState::Moving;
        }
        MovementState::from_dwell(self.dwell_secs(now))
    }

    /// Forget the challenger
    pub fn clear_pending(&mut self) {
        self.pending_area_id = None;
        self.pending_streak = 0;
    }
}

/// Which evidence produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// Path-loss distance from a scanner in the room
    Physical,
    /// Fingerprint score mapped to a virtual distance
    Fingerprint,
    /// Raw RSSI comparison, no valid distance
    RssiFallback,
}

/// What the decision did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// First room adopted
    Bootstrap,
    /// Incumbent kept
    Retained,
    /// Incumbent kept by secondary-scanner profile match
    Protected,
    /// Challenger's streak grew but has not reached the threshold
    Pending,
    /// Room changed
    Switched,
    /// Ambiguous fingerprint, current scannerless room held
    Held,
    /// Area pinned by training
    Locked,
    /// No usable evidence; state untouched
    NoEvidence,
}

/// One candidate room as seen by the decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceCandidate {
    /// Room
    pub area_id: AreaId,
    /// Evidence kind
    pub source: EvidenceSource,
    /// Distance or virtual distance (m)
    pub distance: Option<f64>,
    /// Distance variance (m²)
    pub variance: Option<f64>,
    /// Smoothed RSSI of the closest scanner
    pub rssi: Option<f64>,
    /// Scanner behind the candidate
    pub scanner_id: Option<ScannerId>,
}

/// Diagnostic snapshot of one decision
///
/// Write-only for collaborators; nothing in the pipeline reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    /// Decision time
    pub timestamp: Timestamp,
    /// Evidence kind that drove the decision
    pub source: Option<EvidenceSource>,
    /// Candidates, closest first, at most `MAX_TRACE_CANDIDATES`
    pub candidates: Vec<TraceCandidate>,
    /// Best fingerprint match and its score
    pub fingerprint_best: Option<(AreaId, f64)>,
    /// Fingerprint decision margin
    pub fingerprint_margin: Option<f64>,
    /// Challenger considered
    pub challenger: Option<AreaId>,
    /// Challenger improvement (m, or dB in fallback)
    pub improvement: Option<f64>,
    /// Improvement required to count as a win
    pub required_margin: Option<f64>,
    /// Challenger streak after this decision
    pub streak: u32,
    /// Streak needed to switch
    pub required_streak: u32,
    /// Movement state used
    pub movement_state: MovementState,
    /// Implied speed from distance change (m/s)
    pub velocity_mps: Option<f64>,
    /// Confidence of the resulting assignment
    #[serde(skip)]
    pub confidence: ConfidenceScore,
    /// Result
    pub outcome: DecisionOutcome,
}

impl DecisionTrace {
    /// Empty trace for a decision at `timestamp`
    pub fn new(timestamp: Timestamp, movement_state: MovementState) -> Self {
        Self {
            timestamp,
            source: None,
            candidates: Vec::new(),
            fingerprint_best: None,
            fingerprint_margin: None,
            challenger: None,
            improvement: None,
            required_margin: None,
            streak: 0,
            required_streak: 0,
            movement_state,
            velocity_mps: None,
            confidence: ConfidenceScore::ZERO,
            outcome: DecisionOutcome::NoEvidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_thresholds() {
        assert_eq!(MovementState::from_dwell(0.0), MovementState::Moving);
        assert_eq!(MovementState::from_dwell(119.9), MovementState::Moving);
        assert_eq!(MovementState::from_dwell(120.0), MovementState::Settling);
        assert_eq!(MovementState::from_dwell(300.0), MovementState::Stationary);
    }

    #[test]
    fn stationary_needs_more_evidence() {
        assert!(MovementState::Stationary.sigma_multiplier() > MovementState::Settling.sigma_multiplier());
        assert!(MovementState::Settling.sigma_multiplier() > MovementState::Moving.sigma_multiplier());
    }

    #[test]
    fn bootstrap_state_is_moving() {
        let state = DeviceAreaState::default();
        assert_eq!(state.movement_at(1_000_000), MovementState::Moving);
        assert_eq!(state.dwell_secs(1_000_000), 0.0);
    }
}
