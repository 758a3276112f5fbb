//! Correlation Profiles and Learning
//!
//! ## Overview
//!
//! Rooms are characterised by the RSSI pattern a device inside them produces
//! at every scanner. That pattern is learned two ways:
//!
//! - **Automatically**, from this system's own decisions, once per room per
//!   tick and only when every quality gate passes ([`gates`]).
//! - **By calibration**, when a user stands in a room and trains it.
//!
//! Each statistic keeps both pools separately ([`estimator`]) and fuses them
//! on read. A converged calibration keeps at least `1 - auto_weight_cap` of
//! the fused weight no matter how many automatic samples accumulate.
//!
//! ## Learning Loop
//!
//! ```text
//! tick N decisions ──► gates ──► aggregate (median per room) ──► update_auto
//!        ▲                                                          │
//!        └──────────── profiles as of tick N+1 start ◄──────────────┘
//! ```

pub mod aggregate;
pub mod estimator;
pub mod gates;
pub mod profile;
pub mod store;

pub use aggregate::{aggregate, AggregatedUpdate, LearningCandidate};
pub use estimator::{DualPoolEstimate, FusedEstimate, RunningEstimate};
pub use gates::{check_device_gates, check_rate_limit, GateInputs, GateRejection};
pub use profile::{AreaProfile, ScannerAbsoluteRssi, ScannerPairCorrelation};
pub use store::{AreaProfileMap, MemoryStore, ProfileStore};
