//! Multi-Scanner Fusion
//!
//! ## Overview
//!
//! This module holds everything that looks at more than one scanner at once:
//!
//! - [`RssiUkf`]: a joint RSSI state per device across all visible scanners
//! - [`match_fingerprints`](RssiUkf::match_fingerprints): Mahalanobis ranking
//!   of rooms against learned profiles
//! - [`evaluate_matches`]: the decision-margin rules that turn a ranking into
//!   usable evidence
//! - [`ConfidenceScore`]: fixed-point confidence shared by decisions and
//!   learning
//! - [`matrix`]: the dense linear algebra the above needs
//!
//! ## Pipeline
//!
//! ```text
//! link estimates ──► RssiUkf::update ──► match_fingerprints ──► evaluate_matches
//!                                              ▲
//!                                   AreaProfileMap (tick start)
//! ```

pub mod confidence;
pub mod matching;
pub mod matrix;
pub mod ukf;

pub use confidence::ConfidenceScore;
pub use matching::{decision_margin, evaluate_matches, FingerprintMatch, FingerprintVerdict};
pub use matrix::MahalanobisMethod;
pub use ukf::{RssiUkf, UkfObservation};
