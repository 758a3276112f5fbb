//! Device population and the two-phase tick
//!
//! [`Tracker`] owns every link filter, UKF state and [`DeviceAreaState`], plus
//! the shared [`AreaProfileMap`]. One [`Tracker::tick`] per polling interval:
//!
//! 1. **Decide**: every device is evaluated against the profiles as they were
//!    at tick start. Work happens on copies committed only on success, so a
//!    faulting device keeps its prior state.
//! 2. **Learn**: decisions that pass the quality gates are grouped per room,
//!    median-combined and applied as at most one auto update per room.
//!
//! Learning in phase 2 never influences a decision of the same tick.

use std::{
    collections::{BTreeMap, BTreeSet},
    panic::{self, AssertUnwindSafe},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::TrackerConfig,
    constants::learning::{MIN_TRAINING_SCANNERS, TRAINING_QUALITY_VARIANCE_SCALE},
    correlation::{
        aggregate, check_device_gates, check_rate_limit, AreaProfile, AreaProfileMap, GateInputs, GateRejection,
        LearningCandidate, ProfileStore,
    },
    decision::{
        gather_evidence, AreaDecisionEngine, DecisionInputs, DecisionOutcome, DecisionTrace, DeviceAreaState,
        MovementState, ScannerEvidence,
    },
    errors::{ConfigWarning, DeviceFault, TrainingRejection},
    filter::{DistanceModel, LinkFilter, LinkState, LogDistanceModel},
    fusion::{ConfidenceScore, UkfObservation, RssiUkf},
    model::{AreaId, DeviceId, FloorId, Sample, ScannerId, Topology},
    time::{TimeSource, Timestamp},
};

/// Everything the tracker keeps for one device
#[derive(Debug, Clone, Default)]
struct DeviceRecord {
    links: BTreeMap<ScannerId, LinkState>,
    ukf: RssiUkf,
    state: DeviceAreaState,
    trace: Option<DecisionTrace>,
    is_reference: bool,
    trained_areas: BTreeSet<AreaId>,
}

/// Result of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tick time
    pub timestamp: Timestamp,
    /// Devices whose decision completed
    pub decided: usize,
    /// Devices that changed room, with their new room
    pub switches: Vec<(DeviceId, AreaId)>,
    /// Devices skipped this tick; their state is unchanged
    pub faults: Vec<(DeviceId, DeviceFault)>,
    /// Devices whose decision was not learned from
    pub rejections: Vec<(DeviceId, GateRejection)>,
    /// Rooms that received an auto update
    pub learned: Vec<AreaId>,
}

/// Outcome of an accepted training sample
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    /// Room trained
    pub area_id: AreaId,
    /// Calibration samples the room now holds
    pub sample_count: u32,
    /// Scanners in the sample
    pub scanners: usize,
    /// Link quality of the sample
    pub quality: ConfidenceScore,
}

/// Externally visible state of one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Current room
    pub current_area_id: Option<AreaId>,
    /// Current floor
    pub current_floor_id: Option<FloorId>,
    /// Distance to the current room's evidence (m)
    pub last_good_distance: Option<f64>,
    /// Movement classification
    pub movement_state: MovementState,
    /// Pinned by training
    pub area_locked: bool,
    /// Last decision
    pub trace: Option<DecisionTrace>,
}

/// Immutable view of the population after a tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    /// Per-device state
    pub devices: BTreeMap<DeviceId, DeviceSnapshot>,
}

impl TrackerSnapshot {
    /// Current room of `device`
    pub fn area_of(&self, device: &DeviceId) -> Option<&AreaId> {
        self.devices.get(device).and_then(|d| d.current_area_id.as_ref())
    }
}

/// What phase 1 produced for one device
struct DeviceTick {
    trace: DecisionTrace,
    learning: Option<Result<LearningCandidate, GateRejection>>,
}

/// Room tracker for a population of devices
#[derive(Debug, Clone)]
pub struct Tracker<M: DistanceModel = LogDistanceModel> {
    config: TrackerConfig,
    warnings: Vec<ConfigWarning>,
    engine: AreaDecisionEngine,
    model: M,
    devices: BTreeMap<DeviceId, DeviceRecord>,
    profiles: AreaProfileMap,
    dirty: BTreeSet<AreaId>,
}

impl Tracker<LogDistanceModel> {
    /// Tracker using the log-distance path-loss model from `config`
    ///
    /// Invalid configuration values are replaced by defaults, logged and kept
    /// in [`Tracker::warnings`].
    pub fn new(config: TrackerConfig) -> Self {
        let (config, warnings) = config.validated();
        let model = LogDistanceModel::from_config(&config.filter);
        Self::assemble(config, warnings, model)
    }
}

impl<M: DistanceModel> Tracker<M> {
    /// Tracker with a custom RSSI → distance model
    pub fn with_distance_model(config: TrackerConfig, model: M) -> Self {
        let (config, warnings) = config.validated();
        Self::assemble(config, warnings, model)
    }

    fn assemble(config: TrackerConfig, warnings: Vec<ConfigWarning>, model: M) -> Self {
        let engine = AreaDecisionEngine::new(config.decision.clone(), config.learning.auto_weight_cap);
        Self {
            config,
            warnings,
            engine,
            model,
            devices: BTreeMap::new(),
            profiles: AreaProfileMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Validated configuration in use
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Substitutions made while validating the configuration
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Feed one raw sample
    ///
    /// The link filter is created on the device's first sample from that
    /// scanner. Implausible RSSI is ignored.
    pub fn ingest(&mut self, sample: &Sample) {
        let filter_config = &self.config.filter;
        let record = self.devices.entry(sample.device_id.clone()).or_default();
        record
            .links
            .entry(sample.scanner_id.clone())
            .or_insert_with(|| LinkState::new(LinkFilter::from_config(filter_config)))
            .observe(sample.rssi, sample.timestamp, filter_config.evidence_window_secs);
    }

    /// Run one tick at `now`
    pub fn tick(&mut self, now: Timestamp, topology: &Topology) -> TickReport {
        let mut report = TickReport {
            timestamp: now,
            ..TickReport::default()
        };

        // Phase 1: decide against tick-start profiles
        let engine = &self.engine;
        let model = &self.model;
        let profiles = &self.profiles;
        let config = &self.config;
        let mut candidates = Vec::new();
        for (device_id, record) in self.devices.iter_mut() {
            let previous = record.state.current_area_id.clone();
            // decide_device commits to the record last, so an unwind leaves it as it was
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                decide_device(device_id, &mut *record, engine, model, profiles, topology, config, now)
            }))
            .unwrap_or(Err(DeviceFault::Panicked));
            match result {
                Ok(tick) => {
                    report.decided += 1;
                    if tick.trace.outcome == DecisionOutcome::Switched {
                        if let Some(area) = record.state.current_area_id.clone() {
                            log::info!(
                                "{} moved {} -> {}",
                                device_id,
                                previous.as_ref().map_or("-", |a| a.as_str()),
                                area
                            );
                            report.switches.push((device_id.clone(), area));
                        }
                    }
                    match tick.learning {
                        Some(Ok(candidate)) => candidates.push(candidate),
                        Some(Err(rejection)) => {
                            log::trace!("{}: not learning, {}", device_id, rejection);
                            report.rejections.push((device_id.clone(), rejection));
                        }
                        None => {}
                    }
                    record.trace = Some(tick.trace);
                }
                Err(fault) => {
                    log::warn!("{}: {}, keeping prior state", device_id, fault);
                    report.faults.push((device_id.clone(), fault));
                }
            }
        }

        // Phase 2: one auto update per room
        for update in aggregate(&candidates) {
            if let Err(rejection) = check_rate_limit(self.profiles.get(&update.area_id), now, &self.config.learning) {
                log::trace!("{}: {}", update.area_id, rejection);
                continue;
            }
            let profile = self
                .profiles
                .entry(update.area_id.clone())
                .or_insert_with(|| AreaProfile::new(update.area_id.clone()));
            profile.update_auto(&update.readings, update.confidence, now);
            log::debug!(
                "{}: auto update from {} source(s){}",
                update.area_id,
                update.sources,
                if update.from_references { " (references)" } else { "" }
            );
            self.dirty.insert(update.area_id.clone());
            report.learned.push(update.area_id);
        }

        report
    }

    /// Run one tick at the time reported by `clock`
    pub fn tick_with<T: TimeSource>(&mut self, clock: &T, topology: &Topology) -> TickReport {
        self.tick(clock.now(), topology)
    }

    /// Record a calibration sample for `device` in `area`
    ///
    /// The device's current smoothed RSSI from every fresh, online scanner
    /// feeds the room's trained pool. On success the device is pinned to the
    /// room until [`Tracker::unlock`] or [`Tracker::reset_training`].
    pub fn train(
        &mut self,
        device: &DeviceId,
        area: &AreaId,
        now: Timestamp,
        topology: &Topology,
    ) -> Result<TrainingOutcome, TrainingRejection> {
        let floor = topology.area_floor(area).cloned().ok_or(TrainingRejection::UnknownArea)?;
        let record = self.devices.get_mut(device).ok_or(TrainingRejection::UnknownDevice)?;

        let evidence = gather_evidence(
            &record.links,
            topology,
            &self.model,
            now,
            self.config.filter.evidence_window_secs,
        );
        if evidence.len() < MIN_TRAINING_SCANNERS {
            return Err(TrainingRejection::InsufficientScanners {
                required: MIN_TRAINING_SCANNERS,
                available: evidence.len(),
            });
        }

        let readings = readings_of(&evidence);
        let profile = self
            .profiles
            .entry(area.clone())
            .or_insert_with(|| AreaProfile::new(area.clone()));
        profile.update_trained(&readings);
        let sample_count = profile.trained_updates();
        self.dirty.insert(area.clone());

        let state = &mut record.state;
        if state.current_area_id.as_ref() != Some(area) {
            state.current_area_id = Some(area.clone());
            state.last_area_change = Some(now);
        }
        state.current_floor_id = Some(floor);
        state.area_locked = true;
        state.clear_pending();
        record.trained_areas.insert(area.clone());

        let quality = training_quality(&evidence);
        log::info!(
            "{}: trained {} with {} scanners (sample {}, quality {:.2})",
            device,
            area,
            evidence.len(),
            sample_count,
            quality.as_float()
        );
        Ok(TrainingOutcome {
            area_id: area.clone(),
            sample_count,
            scanners: evidence.len(),
            quality,
        })
    }

    /// Release a training lock without touching any profile
    pub fn unlock(&mut self, device: &DeviceId) -> bool {
        match self.devices.get_mut(device) {
            Some(record) => {
                record.state.area_locked = false;
                true
            }
            None => false,
        }
    }

    /// Undo `device`'s training
    ///
    /// Every room the device trained is reset per the configured
    /// [`ResetScope`](crate::ResetScope) and the lock is released. Returns the
    /// rooms that were reset.
    ///
    /// Trained pools are per room, not per device: resetting one device also
    /// discards calibration other devices recorded in the same rooms.
    pub fn reset_training(&mut self, device: &DeviceId) -> Result<Vec<AreaId>, TrainingRejection> {
        let record = self.devices.get_mut(device).ok_or(TrainingRejection::UnknownDevice)?;
        let scope = self.config.learning.reset_scope;
        let areas: Vec<AreaId> = std::mem::take(&mut record.trained_areas).into_iter().collect();
        record.state.area_locked = false;

        for area in &areas {
            if let Some(profile) = self.profiles.get_mut(area) {
                profile.reset(scope);
                self.dirty.insert(area.clone());
            }
        }
        log::info!("{}: training reset for {} room(s), scope {:?}", device, areas.len(), scope);
        Ok(areas)
    }

    /// Flag `device` as a fixed-location reference
    pub fn set_reference(&mut self, device: impl Into<DeviceId>, is_reference: bool) {
        self.devices.entry(device.into()).or_default().is_reference = is_reference;
    }

    /// Drop everything known about `device`
    pub fn remove_device(&mut self, device: &DeviceId) -> bool {
        self.devices.remove(device).is_some()
    }

    /// Tracked devices
    pub fn devices(&self) -> impl Iterator<Item = &DeviceId> {
        self.devices.keys()
    }

    /// Decision state of `device`
    pub fn device_state(&self, device: &DeviceId) -> Option<&DeviceAreaState> {
        self.devices.get(device).map(|r| &r.state)
    }

    /// Last decision trace of `device`
    pub fn trace(&self, device: &DeviceId) -> Option<&DecisionTrace> {
        self.devices.get(device).and_then(|r| r.trace.as_ref())
    }

    /// Joint RSSI state of `device`
    pub fn ukf(&self, device: &DeviceId) -> Option<&RssiUkf> {
        self.devices.get(device).map(|r| &r.ukf)
    }

    /// Copy of the externally visible state
    pub fn snapshot(&self) -> TrackerSnapshot {
        let devices = self
            .devices
            .iter()
            .map(|(id, record)| {
                let state = &record.state;
                (
                    id.clone(),
                    DeviceSnapshot {
                        current_area_id: state.current_area_id.clone(),
                        current_floor_id: state.current_floor_id.clone(),
                        last_good_distance: state.last_good_distance,
                        movement_state: state.movement_state,
                        area_locked: state.area_locked,
                        trace: record.trace.clone(),
                    },
                )
            })
            .collect();
        TrackerSnapshot { devices }
    }

    /// All room profiles
    pub fn profiles(&self) -> &AreaProfileMap {
        &self.profiles
    }

    /// Profile of one room
    pub fn profile(&self, area: &AreaId) -> Option<&AreaProfile> {
        self.profiles.get(area)
    }

    /// Profiles changed since the last call, or since the last load/save
    pub fn take_dirty_profiles(&mut self) -> Vec<AreaProfile> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty.iter().filter_map(|area| self.profiles.get(area).cloned()).collect()
    }

    /// Replace all profiles with the store's contents
    pub fn load_profiles<S: ProfileStore>(&mut self, store: &mut S) -> Result<usize, S::Error> {
        self.profiles = store.load()?;
        self.dirty.clear();
        log::info!("loaded {} room profile(s)", self.profiles.len());
        Ok(self.profiles.len())
    }

    /// Write all profiles to the store
    ///
    /// The dirty set is cleared only when the store accepts the write.
    pub fn save_profiles<S: ProfileStore>(&mut self, store: &mut S) -> Result<(), S::Error> {
        store.save(&self.profiles)?;
        self.dirty.clear();
        Ok(())
    }
}

/// Phase 1 for one device; commits to `record` only on success
#[allow(clippy::too_many_arguments)]
fn decide_device<M: DistanceModel>(
    device_id: &DeviceId,
    record: &mut DeviceRecord,
    engine: &AreaDecisionEngine,
    model: &M,
    profiles: &AreaProfileMap,
    topology: &Topology,
    config: &TrackerConfig,
    now: Timestamp,
) -> Result<DeviceTick, DeviceFault> {
    let evidence = gather_evidence(&record.links, topology, model, now, config.filter.evidence_window_secs);

    let mut ukf = record.ukf.clone();
    let matches = if config.decision.ukf_enabled {
        let observations: Vec<UkfObservation> = evidence
            .iter()
            .map(|e| UkfObservation {
                scanner_id: e.scanner_id.clone(),
                rssi: e.rssi,
                noise: e.rssi_variance,
                timestamp: e.last_update,
            })
            .collect();
        if observations.is_empty() {
            ukf.predict(now)?;
        } else {
            ukf.update(&observations, now)?;
        }
        ukf.match_fingerprints(profiles, config.learning.auto_weight_cap)
    } else {
        Vec::new()
    };

    let mut state = record.state.clone();
    let inputs = DecisionInputs {
        evidence: &evidence,
        matches: &matches,
        topology,
        profiles,
    };
    let trace = engine.decide(&mut state, &inputs, now);
    if state.last_good_distance.map_or(false, |d| !d.is_finite()) {
        return Err(DeviceFault::NonFinite { stage: "decision distance" });
    }

    log::debug!(
        "{}: {:?} in {} via {:?}",
        device_id,
        trace.outcome,
        state.current_area_id.as_ref().map_or("-", |a| a.as_str()),
        trace.source
    );

    let learning = learning_candidate(device_id, record.is_reference, &state, &trace, &evidence, topology, config, now);

    record.ukf = ukf;
    record.state = state;
    Ok(DeviceTick { trace, learning })
}

/// Gate this tick's decision as a learning label
#[allow(clippy::too_many_arguments)]
fn learning_candidate(
    device_id: &DeviceId,
    is_reference: bool,
    state: &DeviceAreaState,
    trace: &DecisionTrace,
    evidence: &[ScannerEvidence],
    topology: &Topology,
    config: &TrackerConfig,
    now: Timestamp,
) -> Option<Result<LearningCandidate, GateRejection>> {
    if matches!(trace.outcome, DecisionOutcome::NoEvidence | DecisionOutcome::Locked) {
        return None;
    }
    let area_id = state.current_area_id.clone()?;

    let max_raw_variance = evidence
        .iter()
        .map(|e| e.raw_variance)
        .try_fold(0.0_f64, |acc, v| v.map(|v| acc.max(v)));
    let all_scanners_online = topology.scanners_serving(&area_id).all(|s| topology.is_online(s));

    let inputs = GateInputs {
        confidence: trace.confidence,
        dwell_secs: state.dwell_secs(now),
        is_reference,
        max_raw_variance,
        velocity_mps: trace.velocity_mps,
        scanner_count: evidence.len(),
        all_scanners_online,
    };
    Some(check_device_gates(&inputs, &config.learning).map(|()| LearningCandidate {
        device_id: device_id.clone(),
        area_id,
        readings: readings_of(evidence),
        confidence: trace.confidence,
        is_reference,
    }))
}

fn readings_of(evidence: &[ScannerEvidence]) -> BTreeMap<ScannerId, f64> {
    evidence.iter().map(|e| (e.scanner_id.clone(), e.rssi)).collect()
}

/// Mean of `1 - variance / scale` over the sample's links
fn training_quality(evidence: &[ScannerEvidence]) -> ConfidenceScore {
    if evidence.is_empty() {
        return ConfidenceScore::ZERO;
    }
    let total: f64 = evidence
        .iter()
        .map(|e| (1.0 - e.rssi_variance / TRAINING_QUALITY_VARIANCE_SCALE).clamp(0.0, 1.0))
        .sum();
    ConfidenceScore::from_float(total / evidence.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ResetScope, correlation::MemoryStore};

    fn topology() -> Topology {
        let mut t = Topology::new();
        t.add_scanner("k1", "kitchen", "ground");
        t.add_scanner("k2", "kitchen", "ground");
        t.add_scanner("l1", "lounge", "ground");
        t
    }

    fn feed(tracker: &mut Tracker, device: &str, readings: &[(&str, f64)], at: Timestamp) {
        for (scanner, rssi) in readings {
            tracker.ingest(&Sample::new(device, *scanner, *rssi, at));
        }
    }

    #[test]
    fn first_tick_bootstraps() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let topo = topology();
        feed(&mut tracker, "phone", &[("k1", -60.0), ("l1", -80.0)], 1_000);

        let report = tracker.tick(1_000, &topo);
        assert!(report.faults.is_empty());
        assert_eq!(report.decided, 1);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.area_of(&"phone".into()).map(|a| a.as_str()), Some("kitchen"));
        let trace = tracker.trace(&"phone".into()).unwrap();
        assert_eq!(trace.outcome, DecisionOutcome::Bootstrap);
    }

    /// Path-loss model that has no answer for very weak signals
    struct PanicsOnWeakSignal(LogDistanceModel);

    impl DistanceModel for PanicsOnWeakSignal {
        fn distance(&self, rssi: f64) -> f64 {
            if rssi < -90.0 {
                panic!("no path-loss entry for {} dBm", rssi);
            }
            self.0.distance(rssi)
        }

        fn distance_variance(&self, rssi: f64, rssi_variance: f64) -> f64 {
            self.0.distance_variance(rssi, rssi_variance)
        }
    }

    #[test]
    fn panicking_device_keeps_state_and_others_still_run() {
        let config = TrackerConfig::default();
        let model = PanicsOnWeakSignal(LogDistanceModel::from_config(&config.filter));
        let mut tracker = Tracker::with_distance_model(config, model);
        let topo = topology();
        let broken: DeviceId = "broken".into();
        let phone: DeviceId = "phone".into();

        for (device, scanner, rssi) in [("broken", "k1", -60.0), ("phone", "l1", -62.0)] {
            tracker.ingest(&Sample::new(device, scanner, rssi, 1_000));
        }
        let report = tracker.tick(1_000, &topo);
        assert_eq!(report.decided, 2);
        let state_before = tracker.device_state(&broken).cloned().unwrap();
        let trace_before = tracker.trace(&broken).cloned();
        let ukf_updates = tracker.ukf(&broken).map(|u| u.update_count());

        for (device, scanner, rssi) in [("broken", "k1", -60.0), ("broken", "l1", -95.0), ("phone", "l1", -62.0)] {
            tracker.ingest(&Sample::new(device, scanner, rssi, 2_000));
        }
        let report = tracker.tick(2_000, &topo);

        assert_eq!(report.faults, vec![(broken.clone(), DeviceFault::Panicked)]);
        assert_eq!(report.decided, 1);
        assert_eq!(tracker.device_state(&broken), Some(&state_before));
        assert_eq!(tracker.trace(&broken).cloned(), trace_before);
        assert_eq!(tracker.ukf(&broken).map(|u| u.update_count()), ukf_updates);
        assert_eq!(tracker.trace(&phone).map(|t| t.timestamp), Some(2_000));
        assert_eq!(tracker.snapshot().area_of(&phone).map(|a| a.as_str()), Some("lounge"));
    }

    #[test]
    fn silent_links_do_not_tighten_joint_estimate() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let topo = topology();
        let phone: DeviceId = "phone".into();
        feed(&mut tracker, "phone", &[("k1", -60.0), ("l1", -75.0)], 1_000);
        tracker.tick(1_000, &topo);
        let mut previous = tracker.ukf(&phone).and_then(|u| u.variance_of(&"k1".into())).unwrap();

        // no new samples; both links stay inside the evidence window
        for i in 2..15 {
            tracker.tick(i * 1_000, &topo);
            let variance = tracker.ukf(&phone).and_then(|u| u.variance_of(&"k1".into())).unwrap();
            assert!(variance >= previous, "variance shrank to {} at {} s", variance, i);
            previous = variance;
        }
        assert_eq!(tracker.ukf(&phone).map(|u| u.update_count()), Some(1));
    }

    #[test]
    fn invalid_config_is_reported() {
        let mut config = TrackerConfig::default();
        config.filter.ref_power_dbm = 5.0;
        let tracker = Tracker::new(config);
        assert_eq!(tracker.warnings().len(), 1);
        assert_eq!(tracker.config().filter.ref_power_dbm, -59.0);
    }

    #[test]
    fn training_needs_two_scanners() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let topo = topology();
        let phone: DeviceId = "phone".into();
        let kitchen: AreaId = "kitchen".into();

        assert_eq!(
            tracker.train(&phone, &kitchen, 1_000, &topo),
            Err(TrainingRejection::UnknownDevice)
        );

        feed(&mut tracker, "phone", &[("k1", -60.0)], 1_000);
        assert_eq!(
            tracker.train(&phone, &kitchen, 1_000, &topo),
            Err(TrainingRejection::InsufficientScanners { required: 2, available: 1 })
        );
        assert_eq!(
            tracker.train(&phone, &"garage".into(), 1_000, &topo),
            Err(TrainingRejection::UnknownArea)
        );

        feed(&mut tracker, "phone", &[("l1", -78.0)], 1_000);
        let outcome = tracker.train(&phone, &kitchen, 1_000, &topo).unwrap();
        assert_eq!(outcome.sample_count, 1);
        assert_eq!(outcome.scanners, 2);
        let state = tracker.device_state(&phone).unwrap();
        assert!(state.area_locked);
        assert_eq!(state.current_area_id.as_ref(), Some(&kitchen));
        assert!(tracker.profile(&kitchen).unwrap().has_trained());
    }

    #[test]
    fn training_lock_holds_until_unlocked() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let topo = topology();
        let phone: DeviceId = "phone".into();
        feed(&mut tracker, "phone", &[("k1", -60.0), ("l1", -75.0)], 1_000);
        tracker.train(&phone, &"kitchen".into(), 1_000, &topo).unwrap();

        for i in 2..12 {
            feed(&mut tracker, "phone", &[("k1", -85.0), ("l1", -55.0)], i * 1_000);
            tracker.tick(i * 1_000, &topo);
        }
        assert_eq!(tracker.snapshot().area_of(&phone).map(|a| a.as_str()), Some("kitchen"));

        assert!(tracker.unlock(&phone));
        for i in 12..40 {
            feed(&mut tracker, "phone", &[("k1", -85.0), ("l1", -55.0)], i * 1_000);
            tracker.tick(i * 1_000, &topo);
        }
        assert_eq!(tracker.snapshot().area_of(&phone).map(|a| a.as_str()), Some("lounge"));
    }

    fn trained_tracker(scope: ResetScope) -> (Tracker, DeviceId, AreaId) {
        let mut config = TrackerConfig::default();
        config.learning.reset_scope = scope;
        let mut tracker = Tracker::new(config);
        let phone: DeviceId = "phone".into();
        let kitchen: AreaId = "kitchen".into();
        feed(&mut tracker, "phone", &[("k1", -60.0), ("l1", -75.0)], 1_000);
        tracker.train(&phone, &kitchen, 1_000, &topology()).unwrap();
        (tracker, phone, kitchen)
    }

    #[test]
    fn reset_training_clears_calibration() {
        let (mut tracker, phone, kitchen) = trained_tracker(ResetScope::TrainedOnly);
        let reset = tracker.reset_training(&phone).unwrap();
        assert_eq!(reset, vec![kitchen.clone()]);
        assert!(!tracker.profile(&kitchen).unwrap().has_trained());
        assert!(!tracker.device_state(&phone).unwrap().area_locked);
        assert_eq!(tracker.reset_training(&"ghost".into()), Err(TrainingRejection::UnknownDevice));
    }

    #[test]
    fn dirty_profiles_drain_once() {
        let (mut tracker, _, kitchen) = trained_tracker(ResetScope::TrainedOnly);
        let dirty = tracker.take_dirty_profiles();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].area_id(), &kitchen);
        assert!(tracker.take_dirty_profiles().is_empty());
    }

    #[test]
    fn profiles_round_trip_through_store() {
        let (mut tracker, _, kitchen) = trained_tracker(ResetScope::TrainedAndAuto);
        let mut store = MemoryStore::new();
        tracker.save_profiles(&mut store).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(tracker.take_dirty_profiles().is_empty());

        let mut fresh = Tracker::new(TrackerConfig::default());
        assert_eq!(fresh.load_profiles(&mut store).unwrap(), 1);
        assert_eq!(fresh.profile(&kitchen), tracker.profile(&kitchen));
    }

    #[test]
    fn silent_device_keeps_its_room() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let topo = topology();
        feed(&mut tracker, "phone", &[("k1", -60.0), ("l1", -80.0)], 1_000);
        tracker.tick(1_000, &topo);

        let report = tracker.tick(200_000, &topo);
        assert!(report.faults.is_empty());
        assert_eq!(tracker.snapshot().area_of(&"phone".into()).map(|a| a.as_str()), Some("kitchen"));
        assert_eq!(
            tracker.trace(&"phone".into()).map(|t| t.outcome),
            Some(DecisionOutcome::NoEvidence)
        );
    }
}
