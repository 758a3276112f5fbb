//! Common scenario harness for integration tests
//!
//! - A standard two-floor house topology
//! - A log-distance RSSI generator matching the default path-loss model
//! - [`Scene`], which feeds samples and ticks a [`Tracker`] on a fixed clock

#![allow(dead_code)]

use areasense_core::{
    decision::DecisionOutcome, AreaId, DeviceId, MovementState, Sample, TickReport, Topology, Tracker, TrackerConfig,
};

/// Polling interval used by [`Scene::step`]
pub const TICK_MS: u64 = 1_000;

/// RSSI at one metre used by the default configuration
pub const REF_POWER_DBM: f64 = -59.0;

/// Path-loss exponent used by the default configuration
pub const PATH_LOSS_EXPONENT: f64 = 3.0;

/// RSSI the default model maps to `distance` metres
pub fn rssi_at(distance: f64) -> f64 {
    REF_POWER_DBM - 10.0 * PATH_LOSS_EXPONENT * distance.log10()
}

/// Ground floor: kitchen (k1, k2), lounge (l1), office (o1), scannerless
/// pantry. Upstairs: bedroom (b1).
pub fn house() -> Topology {
    let mut t = Topology::new();
    t.add_scanner("k1", "kitchen", "ground");
    t.add_scanner("k2", "kitchen", "ground");
    t.add_scanner("l1", "lounge", "ground");
    t.add_scanner("o1", "office", "ground");
    t.add_scanner("b1", "bedroom", "upstairs");
    t.add_area("pantry", "ground");
    t
}

/// Xorshift generator for reproducible noise
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u32() >> 8) as f64 / 16_777_216.0
    }

    pub fn gen_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }
}

/// A tracker, its topology and a clock
pub struct Scene {
    pub tracker: Tracker,
    pub topology: Topology,
    pub now: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            tracker: Tracker::new(config),
            topology: house(),
            now: 0,
        }
    }

    /// Report `readings` for `device` at the current time
    pub fn report(&mut self, device: &str, readings: &[(&str, f64)]) {
        for (scanner, rssi) in readings {
            self.tracker.ingest(&Sample::new(device, *scanner, *rssi, self.now));
        }
    }

    /// Advance the clock one interval, report, then tick
    pub fn step(&mut self, device: &str, readings: &[(&str, f64)]) -> TickReport {
        self.now += TICK_MS;
        self.report(device, readings);
        self.tick()
    }

    /// Advance the clock one interval and tick with whatever was reported
    pub fn tick(&mut self) -> TickReport {
        self.tracker.tick(self.now, &self.topology)
    }

    /// Advance the clock by `ms` without ticking
    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }

    pub fn area(&self, device: &str) -> Option<String> {
        self.tracker
            .snapshot()
            .area_of(&DeviceId::from(device))
            .map(|a| a.as_str().to_owned())
    }

    pub fn movement(&self, device: &str) -> Option<MovementState> {
        self.tracker.device_state(&device.into()).map(|s| s.movement_state)
    }

    pub fn outcome(&self, device: &str) -> Option<DecisionOutcome> {
        self.tracker.trace(&device.into()).map(|t| t.outcome)
    }

    pub fn sample_count(&self, area: &str) -> u32 {
        self.tracker
            .profile(&AreaId::from(area))
            .map(|p| p.sample_count())
            .unwrap_or(0)
    }
}

/// Count room switches in a series of reports
pub fn switches(reports: &[TickReport]) -> usize {
    reports.iter().map(|r| r.switches.len()).sum()
}
