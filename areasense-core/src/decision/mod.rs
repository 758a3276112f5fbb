//! Area Decision
//!
//! Per-device state machine that turns scanner evidence and fingerprint
//! matches into one current room.
//!
//! ```text
//!        first evidence                 streak reached
//! NO_AREA ─────────────► AREA_X ──► PENDING(Y, n) ──────────► AREA_Y
//!                          ▲              │
//!                          └──────────────┘
//!                       challenger loses a tick
//! ```
//!
//! - [`evidence`]: fresh link evidence and per-room candidates
//! - [`engine`]: the switch rules, guards and incumbent protection
//! - [`state`]: [`DeviceAreaState`], [`MovementState`] and [`DecisionTrace`]

pub mod engine;
pub mod evidence;
pub mod state;

pub use engine::{AreaDecisionEngine, DecisionInputs};
pub use evidence::{gather_evidence, physical_candidates, rssi_candidates, AreaCandidate, ScannerEvidence};
pub use state::{DecisionOutcome, DecisionTrace, DeviceAreaState, EvidenceSource, MovementState, TraceCandidate};
