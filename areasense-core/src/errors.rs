//! Error Types for the Localization Pipeline
//!
//! ## Design Philosophy
//!
//! Nothing in the core fails the host process. Errors are values describing
//! what was recovered or skipped:
//!
//! 1. **Configuration warnings**: an out-of-range constant was replaced by its
//!    default. Returned from validation and logged, never fatal.
//!
//! 2. **Device faults**: one device's tick produced an unusable intermediate
//!    result. The device keeps its prior state and the rest of the population
//!    is processed normally.
//!
//! 3. **Training rejections**: a calibration command could not be applied and
//!    the caller is told why.
//!
//! Transient evidence gaps and numerical degeneracy are not errors at all;
//! they widen uncertainty or fall back to a diagonal approximation locally.
//!
//! ## Memory Layout
//!
//! All variants carry only `Copy` data and `&'static str`, so errors can be
//! collected into tick reports without allocation per variant.

use thiserror_no_std::Error;

/// A configuration value was replaced by a safe default
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigWarning {
    /// Value outside its valid range
    #[error("{field} = {value} outside [{min}, {max}], using {substituted}")]
    OutOfRange {
        /// Configuration field name
        field: &'static str,
        /// Rejected value
        value: f64,
        /// Smallest accepted value
        min: f64,
        /// Largest accepted value
        max: f64,
        /// Value used instead
        substituted: f64,
    },

    /// Two related values contradict each other
    #[error("{field}: {reason}")]
    Inconsistent {
        /// Configuration field that was adjusted
        field: &'static str,
        /// What was wrong
        reason: &'static str,
    },
}

/// One device's tick could not be completed
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum DeviceFault {
    /// A NaN or infinity appeared in the named stage
    #[error("non-finite value in {stage}")]
    NonFinite {
        /// Pipeline stage that produced it
        stage: &'static str,
    },

    /// Scanner dimension bookkeeping fell out of step with the state vector
    #[error("estimator dimension mismatch: {dims} dimensions, {observed} observed")]
    DimensionMismatch {
        /// Dimensions in the state
        dims: usize,
        /// Observations presented
        observed: usize,
    },

    /// Processing the device panicked; the panic was contained to this device
    #[error("device processing panicked")]
    Panicked,
}

/// Reason a training command was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingRejection {
    /// Device has never been seen
    #[error("device unknown")]
    UnknownDevice,

    /// Room is not in the topology
    #[error("room unknown")]
    UnknownArea,

    /// Not enough fresh scanners observe the device
    #[error("insufficient scanners: need {required}, have {available}")]
    InsufficientScanners {
        /// Minimum fresh scanners
        required: usize,
        /// Fresh scanners available
        available: usize,
    },
}

impl ConfigWarning {
    /// Log the warning through the `log` facade
    pub fn log(&self) {
        log::warn!("configuration: {}", self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_render_substitution() {
        let warning = ConfigWarning::OutOfRange {
            field: "ref_power",
            value: 12.0,
            min: -100.0,
            max: -20.0,
            substituted: -59.0,
        };
        let text = format!("{}", warning);
        assert!(text.contains("ref_power"));
        assert!(text.contains("-59"));
    }

    #[test]
    fn faults_are_small() {
        assert!(core::mem::size_of::<DeviceFault>() <= 24);
    }
}
