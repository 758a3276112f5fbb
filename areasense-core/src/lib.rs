//! Room-level localization core for AreaSense
//!
//! Decides which room a mobile BLE beacon currently occupies from noisy RSSI
//! samples reported by fixed scanners with known room/floor assignments.
//!
//! ```text
//! Sample ──→ SignalFilter (per link) ──┬──→ distance ──→ AreaDecisionEngine ──→ current area
//!                                      │                        ↑      │
//!                                      └──→ UKF ──→ fingerprint ┘      │ label
//!                                                ↑                    ↓
//!                                         AreaProfile map ←── dual-pool learning
//! ```
//!
//! Key constraints:
//! - Single-threaded, one [`Tracker::tick`] per polling interval
//! - No I/O: persistence goes through the [`ProfileStore`] trait
//! - Nothing in the numeric pipeline fails the host; degenerate input degrades
//!
//! ```no_run
//! use areasense_core::{Tracker, TrackerConfig, Topology, Sample};
//!
//! let mut topology = Topology::new();
//! topology.add_scanner("kitchen_proxy", "kitchen", "ground");
//!
//! let mut tracker = Tracker::new(TrackerConfig::default());
//! tracker.ingest(&Sample::new("phone", "kitchen_proxy", -62.0, 1_000));
//! let report = tracker.tick(1_000, &topology);
//! assert!(report.faults.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod constants;
pub mod correlation;
pub mod decision;
pub mod errors;
pub mod filter;
pub mod fusion;
pub mod model;
pub mod time;
pub mod tracker;

// Public API
pub use config::{DecisionConfig, FilterConfig, LearningConfig, ResetScope, TrackerConfig};
pub use correlation::{AreaProfile, AreaProfileMap, MemoryStore, ProfileStore};
pub use decision::{AreaDecisionEngine, DecisionTrace, DeviceAreaState, MovementState};
pub use errors::{ConfigWarning, DeviceFault, TrainingRejection};
pub use filter::{LinkFilter, SignalFilter};
pub use fusion::{ConfidenceScore, FingerprintMatch, RssiUkf};
pub use model::{AreaId, DeviceId, FloorId, Sample, ScannerId, Topology};
pub use time::Timestamp;
pub use tracker::{DeviceSnapshot, TickReport, Tracker, TrackerSnapshot, TrainingOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
