//! Room decision state machine
//!
//! One call to [`AreaDecisionEngine::decide`] per device per tick. Evidence is
//! tried in order:
//!
//! 1. physical distance from scanners within `max_radius`
//! 2. virtual distance `max_radius · (1 − score)` for scannerless rooms
//! 3. raw RSSI comparison when no candidate has a valid distance
//!
//! A challenger must beat the incumbent by the stability margin on enough
//! consecutive ticks before the room changes.

use std::collections::BTreeMap;

use crate::{
    config::DecisionConfig,
    constants::decision::{
        ESCAPE_DISTANCE_RATIO, MAX_TRACE_CANDIDATES, RSSI_FALLBACK_MARGIN_DB, SOFT_PROTECTION_MAX_Z,
        SOFT_PROTECTION_MIN_SCANNERS, VIRTUAL_DISTANCE_VARIANCE,
    },
    correlation::AreaProfileMap,
    fusion::{decision_margin, evaluate_matches, ConfidenceScore, FingerprintMatch, FingerprintVerdict},
    model::{AreaId, Topology},
    time::{elapsed_secs, Timestamp},
};

use super::{
    evidence::{physical_candidates, rssi_candidates, AreaCandidate, ScannerEvidence},
    state::{DecisionOutcome, DecisionTrace, DeviceAreaState, EvidenceSource, MovementState, TraceCandidate},
};

/// Everything one decision looks at
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs<'a> {
    /// Fresh scanner evidence for the device
    pub evidence: &'a [ScannerEvidence],
    /// Ranked fingerprint matches, best first
    pub matches: &'a [FingerprintMatch],
    /// Scanner and room catalogue
    pub topology: &'a Topology,
    /// Tick-start room profiles
    pub profiles: &'a AreaProfileMap,
}

/// Challenger versus incumbent for one tick
struct Contest {
    improvement: f64,
    required: f64,
    escape: bool,
}

/// Hysteresis-governed area arbitration
#[derive(Debug, Clone)]
pub struct AreaDecisionEngine {
    config: DecisionConfig,
    auto_weight_cap: f64,
}

impl AreaDecisionEngine {
    /// Create an engine; `auto_weight_cap` is used when reading profiles
    pub fn new(config: DecisionConfig, auto_weight_cap: f64) -> Self {
        Self { config, auto_weight_cap }
    }

    /// Active settings
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Advance one device's state by one tick
    ///
    /// With no usable evidence the state is left exactly as it was and the
    /// trace reports [`DecisionOutcome::NoEvidence`].
    pub fn decide(&self, state: &mut DeviceAreaState, inputs: &DecisionInputs<'_>, now: Timestamp) -> DecisionTrace {
        let movement = state.movement_at(now);
        let mut trace = DecisionTrace::new(now, movement);
        trace.fingerprint_best = inputs.matches.first().map(|m| (m.area_id.clone(), m.score));
        trace.fingerprint_margin = decision_margin(inputs.matches);

        let mut candidates = physical_candidates(inputs.evidence, self.config.max_radius);
        let mut held = false;
        match evaluate_matches(inputs.matches, state.current_area_id.as_ref(), &self.config) {
            FingerprintVerdict::Accept { area_id, score } => {
                self.add_virtual(&mut candidates, &area_id, score, inputs);
            }
            FingerprintVerdict::Hold => {
                held = state
                    .current_area_id
                    .as_ref()
                    .map_or(false, |area| inputs.topology.is_scannerless(area));
            }
            FingerprintVerdict::NoMatch => {}
        }

        // a scannerless incumbent competes through its own score
        if let Some(current) = state.current_area_id.clone() {
            if !candidates.contains_key(&current) {
                if let Some(m) = inputs.matches.iter().find(|m| m.area_id == current) {
                    self.add_virtual(&mut candidates, &current, m.score, inputs);
                }
            }
        }

        let candidates = if candidates.is_empty() {
            rssi_candidates(inputs.evidence)
        } else {
            candidates
        };
        trace.candidates = trace_candidates(&candidates);

        if state.area_locked && state.current_area_id.is_some() {
            trace.outcome = DecisionOutcome::Locked;
            state.clear_pending();
            self.finish(state, &candidates, &mut trace, now, false);
            return trace;
        }

        if candidates.is_empty() {
            return trace;
        }
        state.movement_state = movement;

        let Some(current) = state.current_area_id.clone() else {
            if let Some(best) = best_candidate(&candidates, None) {
                adopt(state, best, now);
                trace.outcome = DecisionOutcome::Bootstrap;
            }
            self.finish(state, &candidates, &mut trace, now, true);
            return trace;
        };

        if held {
            state.clear_pending();
            trace.outcome = DecisionOutcome::Held;
            self.finish(state, &candidates, &mut trace, now, false);
            return trace;
        }

        let Some(challenger) = best_candidate(&candidates, Some(&current)).cloned() else {
            state.clear_pending();
            trace.outcome = DecisionOutcome::Retained;
            self.finish(state, &candidates, &mut trace, now, false);
            return trace;
        };
        trace.challenger = Some(challenger.area_id.clone());

        let contest = match candidates.get(&current) {
            Some(incumbent) => self.contest(incumbent, &challenger, movement),
            None if self.soft_protected(&current, inputs) => {
                state.clear_pending();
                trace.outcome = DecisionOutcome::Protected;
                self.finish(state, &candidates, &mut trace, now, false);
                return trace;
            }
            None => Contest {
                improvement: f64::INFINITY,
                required: self.floor_margin(&challenger),
                escape: true,
            },
        };
        trace.improvement = contest.improvement.is_finite().then_some(contest.improvement);
        trace.required_margin = Some(contest.required);

        if contest.improvement < contest.required {
            state.clear_pending();
            trace.outcome = DecisionOutcome::Retained;
            self.finish(state, &candidates, &mut trace, now, false);
            return trace;
        }

        if state.pending_area_id.as_ref() == Some(&challenger.area_id) {
            state.pending_streak = state.pending_streak.saturating_add(1);
        } else {
            state.pending_area_id = Some(challenger.area_id.clone());
            state.pending_streak = 1;
        }

        let cross_floor = match (&challenger.floor_id, &state.current_floor_id) {
            (Some(to), Some(from)) => to != from,
            _ => false,
        };
        let (mut required_streak, mut required_history) = if cross_floor {
            (self.config.cross_floor_streak, self.config.cross_floor_min_history)
        } else {
            (self.config.same_floor_streak, 0)
        };
        if contest.escape {
            required_streak = required_streak.div_ceil(2);
            required_history = required_history.div_ceil(2);
        }
        trace.required_streak = required_streak;

        if state.pending_streak >= required_streak && challenger.sample_count >= required_history {
            log::debug!(
                "switch {} -> {} after {} ticks (improvement {:.2}, required {:.2})",
                current,
                challenger.area_id,
                state.pending_streak,
                contest.improvement,
                contest.required
            );
            trace.streak = state.pending_streak;
            adopt(state, &challenger, now);
            trace.outcome = DecisionOutcome::Switched;
            self.finish(state, &candidates, &mut trace, now, true);
            return trace;
        }

        trace.outcome = DecisionOutcome::Pending;
        self.finish(state, &candidates, &mut trace, now, false);
        trace
    }

    fn contest(&self, incumbent: &AreaCandidate, challenger: &AreaCandidate, movement: MovementState) -> Contest {
        match (incumbent.distance, challenger.distance) {
            (Some(d_inc), Some(d_chal)) => {
                let sigma = libm::sqrt((incumbent.variance + challenger.variance).max(0.0));
                let required = self
                    .config
                    .stability_margin_meters
                    .max(self.config.stability_margin_percent * d_inc)
                    .max(movement.sigma_multiplier() * sigma);
                Contest {
                    improvement: d_inc - d_chal,
                    required,
                    escape: d_inc >= ESCAPE_DISTANCE_RATIO * d_chal,
                }
            }
            _ => Contest {
                improvement: challenger.rssi.unwrap_or(f64::NEG_INFINITY) - incumbent.rssi.unwrap_or(f64::NEG_INFINITY),
                required: RSSI_FALLBACK_MARGIN_DB,
                escape: false,
            },
        }
    }

    fn floor_margin(&self, challenger: &AreaCandidate) -> f64 {
        match challenger.source {
            EvidenceSource::RssiFallback => RSSI_FALLBACK_MARGIN_DB,
            _ => self.config.stability_margin_meters,
        }
    }

    /// Incumbent has no fresh scanner of its own; do the others still see
    /// its fingerprint?
    ///
    /// An incumbent whose own scanner still reports, only from beyond
    /// `max_radius`, is not protected and has to win the contest instead.
    fn soft_protected(&self, current: &AreaId, inputs: &DecisionInputs<'_>) -> bool {
        if inputs.evidence.iter().any(|e| &e.area_id == current) {
            return false;
        }
        let Some(profile) = inputs.profiles.get(current) else {
            return false;
        };
        let (sum, n) = inputs
            .evidence
            .iter()
            .filter_map(|e| profile.absolute_z(&e.scanner_id, e.rssi, self.auto_weight_cap))
            .fold((0.0, 0usize), |(sum, n), z| (sum + z * z, n + 1));
        if n < SOFT_PROTECTION_MIN_SCANNERS {
            return false;
        }
        let rms = libm::sqrt(sum / n as f64);
        log::trace!("soft protection for {}: rms z {:.2} over {} scanners", current, rms, n);
        rms <= SOFT_PROTECTION_MAX_Z
    }

    fn add_virtual(
        &self,
        candidates: &mut BTreeMap<AreaId, AreaCandidate>,
        area: &AreaId,
        score: f64,
        inputs: &DecisionInputs<'_>,
    ) {
        if candidates.contains_key(area) || !inputs.topology.is_scannerless(area) {
            return;
        }
        let Some(floor) = inputs.topology.area_floor(area) else {
            return;
        };
        if !inputs.evidence.iter().any(|e| &e.floor_id == floor) {
            log::debug!("fingerprint for {} ignored: no scanner on {} observes the device", area, floor);
            return;
        }
        let sample_count = inputs.evidence.iter().map(|e| e.sample_count).max().unwrap_or(0);
        candidates.insert(
            area.clone(),
            AreaCandidate {
                area_id: area.clone(),
                floor_id: Some(floor.clone()),
                source: EvidenceSource::Fingerprint,
                distance: Some(self.config.max_radius * (1.0 - score.clamp(0.0, 1.0))),
                variance: VIRTUAL_DISTANCE_VARIANCE,
                rssi: None,
                scanner_id: None,
                sample_count,
            },
        );
    }

    /// Distance bookkeeping and assignment confidence
    fn finish(
        &self,
        state: &mut DeviceAreaState,
        candidates: &BTreeMap<AreaId, AreaCandidate>,
        trace: &mut DecisionTrace,
        now: Timestamp,
        room_changed: bool,
    ) {
        if trace.outcome != DecisionOutcome::Switched {
            trace.streak = state.pending_streak;
        }
        let current = state.current_area_id.as_ref().and_then(|area| candidates.get(area));
        trace.source = current.map(|c| c.source);

        if let Some(distance) = current.and_then(|c| c.distance) {
            if !room_changed {
                if let (Some(previous), Some(at)) = (state.last_good_distance, state.last_distance_time) {
                    let dt = elapsed_secs(at, now);
                    if dt > 0.0 {
                        trace.velocity_mps = Some((distance - previous).abs() / dt);
                    }
                }
            }
            state.last_good_distance = Some(distance);
            state.last_distance_time = Some(now);
        }

        trace.confidence = match (trace.outcome, current) {
            (DecisionOutcome::Protected, _) | (_, None) => ConfidenceScore::ZERO,
            (_, Some(c)) => match (c.source, c.distance) {
                (EvidenceSource::Physical, _) => ConfidenceScore::from_variance(c.variance, 1.0),
                (EvidenceSource::Fingerprint, Some(d)) if self.config.max_radius > 0.0 => {
                    ConfidenceScore::from_float(1.0 - d / self.config.max_radius)
                }
                _ => ConfidenceScore::ZERO,
            },
        };
    }
}

fn adopt(state: &mut DeviceAreaState, candidate: &AreaCandidate, now: Timestamp) {
    state.current_area_id = Some(candidate.area_id.clone());
    state.current_floor_id = candidate.floor_id.clone();
    state.clear_pending();
    state.last_area_change = Some(now);
    state.movement_state = MovementState::Moving;
}

/// Closest candidate, or strongest when no distance is known; ties go to the
/// lower room id
fn best_candidate<'c>(
    candidates: &'c BTreeMap<AreaId, AreaCandidate>,
    exclude: Option<&AreaId>,
) -> Option<&'c AreaCandidate> {
    candidates
        .values()
        .filter(|c| Some(&c.area_id) != exclude)
        .fold(None, |best, c| match best {
            Some(b) if !beats(c, b) => Some(b),
            _ => Some(c),
        })
}

fn beats(a: &AreaCandidate, b: &AreaCandidate) -> bool {
    match (a.distance, b.distance) {
        (Some(da), Some(db)) => da < db,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => a.rssi.unwrap_or(f64::NEG_INFINITY) > b.rssi.unwrap_or(f64::NEG_INFINITY),
    }
}

fn trace_candidates(candidates: &BTreeMap<AreaId, AreaCandidate>) -> Vec<TraceCandidate> {
    let mut ranked: Vec<&AreaCandidate> = candidates.values().collect();
    ranked.sort_by(|a, b| {
        if beats(a, b) {
            core::cmp::Ordering::Less
        } else if beats(b, a) {
            core::cmp::Ordering::Greater
        } else {
            a.area_id.cmp(&b.area_id)
        }
    });
    ranked
        .into_iter()
        .take(MAX_TRACE_CANDIDATES)
        .map(|c| TraceCandidate {
            area_id: c.area_id.clone(),
            source: c.source,
            distance: c.distance,
            variance: Some(c.variance),
            rssi: c.rssi,
            scanner_id: c.scanner_id.clone(),
        })
        .collect()
}
