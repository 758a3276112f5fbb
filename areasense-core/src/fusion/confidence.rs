//! Confidence Scoring
//!
//! ## Overview
//!
//! A decision's confidence gates whether it may be used as a learning label
//! and scales how much the automatic pool trusts the reading. Scores come from
//! two kinds of evidence:
//!
//! 1. **Distance certainty**: the propagated distance variance of the winning
//!    scanner, mapped through `s / (s + σ²)`.
//! 2. **Fingerprint fit**: the match score `exp(-0.5 · d² / dof)`, already in
//!    `[0, 1]`.
//!
//! Training quality is built with [`ConfidenceScore::from_float`] from the
//! filter variance of each link in the sample.
//!
//! ## Representation
//!
//! Scores are stored as fixed-point `u16` (0-65535 maps to 0.0-1.0), so
//! comparisons and ordering are exact and deterministic.

/// Confidence score in range [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfidenceScore {
    /// Fixed-point representation (0-65535 maps to 0.0-1.0)
    value: u16,
}

impl ConfidenceScore {
    /// No confidence (0%)
    pub const ZERO: Self = Self { value: 0 };

    /// Maximum confidence (100%)
    pub const MAX_CONFIDENCE: Self = Self { value: 65535 };

    /// Create from floating point value, clamped to [0, 1]
    ///
    /// NaN maps to zero.
    pub fn from_float(confidence: f64) -> Self {
        if confidence.is_nan() {
            return Self::ZERO;
        }
        let clamped = confidence.clamp(0.0, 1.0);
        Self {
            value: libm::round(clamped * 65535.0) as u16,
        }
    }

    /// Map a variance to confidence: `scale / (scale + variance)`
    ///
    /// Zero variance is full confidence; `variance == scale` is 50%.
    pub fn from_variance(variance: f64, scale: f64) -> Self {
        if !(variance >= 0.0) || !(scale > 0.0) {
            return Self::ZERO;
        }
        Self::from_float(scale / (scale + variance))
    }

    /// Convert to floating point [0, 1]
    pub fn as_float(&self) -> f64 {
        self.value as f64 / 65535.0
    }
}

impl Default for ConfidenceScore {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_round_trip_is_close() {
        let c = ConfidenceScore::from_float(0.75);
        assert!((c.as_float() - 0.75).abs() < 1e-4);
        assert_eq!(ConfidenceScore::from_float(2.0), ConfidenceScore::MAX_CONFIDENCE);
        assert_eq!(ConfidenceScore::from_float(-1.0), ConfidenceScore::ZERO);
        assert_eq!(ConfidenceScore::from_float(f64::NAN), ConfidenceScore::ZERO);
    }

    #[test]
    fn variance_mapping() {
        assert_eq!(ConfidenceScore::from_variance(0.0, 1.0), ConfidenceScore::MAX_CONFIDENCE);
        let half = ConfidenceScore::from_variance(4.0, 4.0);
        assert!((half.as_float() - 0.5).abs() < 1e-4);
        assert!(ConfidenceScore::from_variance(10.0, 1.0) < ConfidenceScore::from_variance(1.0, 1.0));
        assert_eq!(ConfidenceScore::from_variance(f64::NAN, 1.0), ConfidenceScore::ZERO);
    }
}
