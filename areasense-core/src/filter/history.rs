//! Fixed-size ring of recent raw RSSI readings
//!
//! The learning gates need the spread of the *raw* signal, which the Kalman
//! estimate hides. Each link keeps its last `N` readings here.
//!
//! ```text
//! RssiHistory<5>:
//! ┌─────┬─────┬─────┬─────┬─────┐
//! │  D  │  E  │  A  │  B  │  C  │   physical slots
//! └─────┴─────┴─────┴─────┴─────┘
//!             ↑ write_pos = 2 (oldest when full)
//! iteration order: A B C D E
//! ```

use crate::time::Timestamp;

/// One raw reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    /// RSSI in dBm
    pub rssi: f64,
    /// Reception time
    pub timestamp: Timestamp,
}

/// Ring buffer that overwrites the oldest reading when full
#[derive(Debug, Clone)]
pub struct RssiHistory<const N: usize> {
    data: [Option<RawReading>; N],
    write_pos: usize,
    len: usize,
}

impl<const N: usize> RssiHistory<N> {
    /// Empty history
    pub const fn new() -> Self {
        Self {
            data: [None; N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Append, discarding the oldest reading when full
    pub fn push(&mut self, reading: RawReading) {
        if N == 0 {
            return;
        }
        self.data[self.write_pos] = Some(reading);
        self.write_pos = (self.write_pos + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    /// Stored readings
    pub fn len(&self) -> usize {
        self.len
    }

    /// No readings stored
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &RawReading> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Drop every reading
    pub fn clear(&mut self) {
        self.data = [None; N];
        self.write_pos = 0;
        self.len = 0;
    }

    /// Sample variance of the stored RSSI values
    ///
    /// `None` with fewer than `min_samples` readings (or fewer than two).
    pub fn variance(&self, min_samples: usize) -> Option<f64> {
        if self.len < min_samples.max(2) {
            return None;
        }
        let n = self.len as f64;
        let mean = self.iter().map(|r| r.rssi).sum::<f64>() / n;
        let sum_sq = self.iter().map(|r| (r.rssi - mean) * (r.rssi - mean)).sum::<f64>();
        Some(sum_sq / (n - 1.0))
    }

    fn get(&self, index: usize) -> Option<&RawReading> {
        if index >= self.len {
            return None;
        }
        let actual = if self.len < N { index } else { (self.write_pos + index) % N };
        self.data[actual].as_ref()
    }
}

impl<const N: usize> Default for RssiHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}
