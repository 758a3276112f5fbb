//! Time handling for the tick loop
//!
//! All timestamps are milliseconds on a monotonic clock supplied by the host.
//! Within one tick a single "now" is used for every freshness check, so the
//! core never reads a clock itself except through [`TimeSource`].

/// Timestamp in milliseconds (monotonic, host supplied)
pub type Timestamp = u64;

/// Milliseconds per second
pub const MS_PER_SECOND: f64 = 1000.0;

/// Seconds elapsed from `earlier` to `later`, zero if time went backwards
pub fn elapsed_secs(earlier: Timestamp, later: Timestamp) -> f64 {
    later.saturating_sub(earlier) as f64 / MS_PER_SECOND
}

/// Source of time for the tick loop
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// System time source
#[derive(Debug, Clone, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime as StdSystemTime, UNIX_EPOCH};

        StdSystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Fixed time source for testing and replay
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Create a clock frozen at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to an absolute timestamp
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Move the clock forward
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time_advances() {
        let mut time = FixedTime::new(1000);
        assert_eq!(time.now(), 1000);

        time.advance(500);
        assert_eq!(time.now(), 1500);
    }

    #[test]
    fn elapsed_never_negative() {
        assert_eq!(elapsed_secs(2000, 1000), 0.0);
        assert_eq!(elapsed_secs(1000, 3500), 2.5);
    }
}
