//! Quality gates for automatic learning
//!
//! A decision becomes a learning label only when every gate passes:
//!
//! | Gate        | Rejects                              | Reference bypass |
//! |-------------|--------------------------------------|------------------|
//! | confidence  | weak decisions                       | no               |
//! | dwell       | devices that just arrived            | yes              |
//! | variance    | unstable raw RSSI                    | no               |
//! | velocity    | devices that are still moving        | no               |
//! | online      | partial evidence (a scanner is down) | no               |
//! | scanners    | single-scanner observations          | no               |
//! | rate limit  | over-feeding one room                | no               |
//!
//! The first five are per device; the rate limit is per room and is checked
//! at aggregation time against the room's last automatic update.

use thiserror_no_std::Error;

use crate::{
    config::LearningConfig,
    constants::learning::MIN_LEARNING_SCANNERS,
    fusion::ConfidenceScore,
    time::{elapsed_secs, Timestamp},
};

use super::AreaProfile;

/// Per-device facts the gates judge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateInputs {
    /// Confidence of this tick's decision
    pub confidence: ConfidenceScore,
    /// Seconds since the device entered its current room
    pub dwell_secs: f64,
    /// Device is a fixed-location reference
    pub is_reference: bool,
    /// Largest raw RSSI variance over the contributing links
    pub max_raw_variance: Option<f64>,
    /// Implied speed from the change in best distance
    pub velocity_mps: Option<f64>,
    /// Contributing scanners
    pub scanner_count: usize,
    /// Every relevant scanner is online
    pub all_scanners_online: bool,
}

/// Why an observation was not learned from
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GateRejection {
    /// Decision confidence below the floor
    #[error("confidence {confidence:.2} below {min:.2}")]
    LowConfidence {
        /// Observed confidence
        confidence: f64,
        /// Floor
        min: f64,
    },

    /// Device has not been in the room long enough
    #[error("dwell {dwell:.0}s below {required:.0}s")]
    ShortDwell {
        /// Seconds in room
        dwell: f64,
        /// Seconds required
        required: f64,
    },

    /// Not enough raw history to judge stability
    #[error("insufficient RSSI history")]
    InsufficientHistory,

    /// Raw RSSI scatter too large
    #[error("RSSI variance {variance:.1} above {max:.1}")]
    UnstableSignal {
        /// Observed variance (dB²)
        variance: f64,
        /// Ceiling (dB²)
        max: f64,
    },

    /// Implied movement too fast
    #[error("velocity {velocity:.2} m/s above {max:.2}")]
    Moving {
        /// Observed speed
        velocity: f64,
        /// Ceiling
        max: f64,
    },

    /// A relevant scanner is offline
    #[error("relevant scanner offline")]
    ScannerOffline,

    /// Too few scanners contributed
    #[error("{count} scanners, need {required}")]
    TooFewScanners {
        /// Contributing scanners
        count: usize,
        /// Minimum
        required: usize,
    },

    /// The room was updated too recently
    #[error("room updated {elapsed:.0}s ago, need {required:.0}s")]
    RateLimited {
        /// Seconds since the last update
        elapsed: f64,
        /// Minimum interval
        required: f64,
    },
}

/// Check the per-device gates
pub fn check_device_gates(inputs: &GateInputs, config: &LearningConfig) -> Result<(), GateRejection> {
    let confidence = inputs.confidence.as_float();
    if confidence < config.min_confidence {
        return Err(GateRejection::LowConfidence {
            confidence,
            min: config.min_confidence,
        });
    }

    if !inputs.is_reference && inputs.dwell_secs < config.min_dwell_secs {
        return Err(GateRejection::ShortDwell {
            dwell: inputs.dwell_secs,
            required: config.min_dwell_secs,
        });
    }

    if inputs.scanner_count < MIN_LEARNING_SCANNERS {
        return Err(GateRejection::TooFewScanners {
            count: inputs.scanner_count,
            required: MIN_LEARNING_SCANNERS,
        });
    }

    match inputs.max_raw_variance {
        None => return Err(GateRejection::InsufficientHistory),
        Some(variance) if !(variance <= config.max_rssi_variance) => {
            return Err(GateRejection::UnstableSignal {
                variance,
                max: config.max_rssi_variance,
            });
        }
        Some(_) => {}
    }

    if let Some(velocity) = inputs.velocity_mps {
        if !(velocity <= config.max_velocity_mps) {
            return Err(GateRejection::Moving {
                velocity,
                max: config.max_velocity_mps,
            });
        }
    }

    if !inputs.all_scanners_online {
        return Err(GateRejection::ScannerOffline);
    }

    Ok(())
}

/// Check the per-room rate limit
pub fn check_rate_limit(profile: Option<&AreaProfile>, now: Timestamp, config: &LearningConfig) -> Result<(), GateRejection> {
    let last = match profile.and_then(AreaProfile::last_auto_update) {
        Some(last) => last,
        None => return Ok(()),
    };
    let elapsed = elapsed_secs(last, now);
    if elapsed < config.min_update_interval_secs {
        return Err(GateRejection::RateLimited {
            elapsed,
            required: config.min_update_interval_secs,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn passing() -> GateInputs {
        GateInputs {
            confidence: ConfidenceScore::from_float(0.9),
            dwell_secs: 600.0,
            is_reference: false,
            max_raw_variance: Some(4.0),
            velocity_mps: Some(0.0),
            scanner_count: 3,
            all_scanners_online: true,
        }
    }

    #[test]
    fn all_gates_pass() {
        assert_eq!(check_device_gates(&passing(), &LearningConfig::default()), Ok(()));
    }

    #[test]
    fn each_gate_rejects() {
        let config = LearningConfig::default();

        let mut inputs = passing();
        inputs.confidence = ConfidenceScore::from_float(0.2);
        assert!(matches!(check_device_gates(&inputs, &config), Err(GateRejection::LowConfidence { .. })));

        let mut inputs = passing();
        inputs.dwell_secs = 10.0;
        assert!(matches!(check_device_gates(&inputs, &config), Err(GateRejection::ShortDwell { .. })));

        let mut inputs = passing();
        inputs.max_raw_variance = Some(100.0);
        assert!(matches!(check_device_gates(&inputs, &config), Err(GateRejection::UnstableSignal { .. })));

        let mut inputs = passing();
        inputs.max_raw_variance = None;
        assert_eq!(check_device_gates(&inputs, &config), Err(GateRejection::InsufficientHistory));

        let mut inputs = passing();
        inputs.velocity_mps = Some(2.0);
        assert!(matches!(check_device_gates(&inputs, &config), Err(GateRejection::Moving { .. })));

        let mut inputs = passing();
        inputs.all_scanners_online = false;
        assert_eq!(check_device_gates(&inputs, &config), Err(GateRejection::ScannerOffline));

        let mut inputs = passing();
        inputs.scanner_count = 1;
        assert!(matches!(check_device_gates(&inputs, &config), Err(GateRejection::TooFewScanners { .. })));
    }

    #[test]
    fn reference_bypasses_only_dwell() {
        let config = LearningConfig::default();
        let mut inputs = passing();
        inputs.is_reference = true;
        inputs.dwell_secs = 0.0;
        assert_eq!(check_device_gates(&inputs, &config), Ok(()));

        inputs.max_raw_variance = Some(100.0);
        assert!(check_device_gates(&inputs, &config).is_err());
    }

    #[test]
    fn rate_limit_uses_last_update() {
        let config = LearningConfig::default();
        assert_eq!(check_rate_limit(None, 0, &config), Ok(()));

        let mut profile = AreaProfile::new("office".into());
        let readings: BTreeMap<_, _> = [("a".into(), -60.0), ("b".into(), -70.0)].into_iter().collect();
        profile.update_auto(&readings, ConfidenceScore::MAX_CONFIDENCE, 100_000);

        assert!(check_rate_limit(Some(&profile), 105_000, &config).is_err());
        assert_eq!(check_rate_limit(Some(&profile), 111_000, &config), Ok(()));
    }
}
