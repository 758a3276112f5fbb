//! Multi-scanner Unscented Kalman Filter
//!
//! ## Overview
//!
//! Per-link filters treat every scanner independently. When a person walks
//! between rooms, the RSSI at neighbouring scanners moves together; the UKF
//! keeps one joint state over all scanners currently visible to a device so
//! that correlation survives into fingerprint matching.
//!
//! ## State
//!
//! ```text
//! x = [rssi_s1, rssi_s2, …, rssi_sn]ᵀ     n ≤ MAX_DIMENSIONS
//! P = n × n covariance
//! ```
//!
//! Dimensions appear when a scanner first reports and disappear after
//! `DIMENSION_TIMEOUT_SECS` without a report. While a scanner is silent its
//! variance keeps growing (bounded by `UKF_MAX_VARIANCE`), so partial
//! visibility degrades gracefully instead of dropping evidence.
//!
//! ## Unscented Transform
//!
//! Sigma points from the Cholesky factor of P, scaled by `√(n + λ)`:
//!
//! ```text
//! λ   = α²(n + κ) - n
//! χ₀  = x
//! χᵢ  = x + √(n+λ)·Lᵢ         i = 1..n
//! χᵢ₊ₙ = x - √(n+λ)·Lᵢ
//! Wm₀ = λ/(n+λ)   Wc₀ = Wm₀ + (1 - α² + β)   Wᵢ = 1/(2(n+λ))
//! ```
//!
//! The process function is a random walk clamped to the physical RSSI range;
//! the observation function selects the observed dimensions.
//!
//! ## Numerical Stability
//!
//! - Covariance symmetrised with jitter after every step
//! - Diagonal floored and capped (capping rescales the row and column so the
//!   matrix stays positive semi-definite)
//! - Cholesky failure retries after conditioning, then degrades to the
//!   diagonal

use heapless::Vec as BoundedVec;

use crate::{
    constants::estimator::{
        DIMENSION_TIMEOUT_SECS, MAX_DIMENSIONS, MAX_SIGMA_POINTS, UKF_ALPHA, UKF_BETA, UKF_INITIAL_VARIANCE,
        UKF_KAPPA, UKF_MAX_VARIANCE, UKF_MIN_MEASUREMENT_NOISE, UKF_MIN_VARIANCE, UKF_PROCESS_NOISE,
    },
    constants::filter::{RSSI_MAX_DBM, RSSI_MIN_DBM},
    errors::DeviceFault,
    filter::is_plausible_rssi,
    model::ScannerId,
    time::{elapsed_secs, Timestamp},
};

use super::matrix::{self, SquareMatrix, Vector};

/// One scanner's contribution to a UKF update
#[derive(Debug, Clone, PartialEq)]
pub struct UkfObservation {
    /// Reporting scanner
    pub scanner_id: ScannerId,
    /// Smoothed RSSI (dBm)
    pub rssi: f64,
    /// Observation noise (dB²), floored at `UKF_MIN_MEASUREMENT_NOISE`
    pub noise: f64,
    /// Time of the reading behind the estimate
    pub timestamp: Timestamp,
}

/// Scratch buffers reused across steps
#[derive(Debug, Clone)]
struct UkfWorkspace {
    sqrt_cov: SquareMatrix,
    sigma: [Vector; MAX_SIGMA_POINTS],
    observed: [Vector; MAX_SIGMA_POINTS],
    innovation_cov: SquareMatrix,
    innovation_inv: SquareMatrix,
    cross_cov: SquareMatrix,
    gain: SquareMatrix,
}

impl UkfWorkspace {
    fn new() -> Self {
        Self {
            sqrt_cov: matrix::zeros(),
            sigma: [[0.0; MAX_DIMENSIONS]; MAX_SIGMA_POINTS],
            observed: [[0.0; MAX_DIMENSIONS]; MAX_SIGMA_POINTS],
            innovation_cov: matrix::zeros(),
            innovation_inv: matrix::zeros(),
            cross_cov: matrix::zeros(),
            gain: matrix::zeros(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SigmaWeights {
    scale: f64,
    mean0: f64,
    cov0: f64,
    rest: f64,
}

impl SigmaWeights {
    fn for_dimensions(n: usize) -> Self {
        let nf = n as f64;
        let lambda = UKF_ALPHA * UKF_ALPHA * (nf + UKF_KAPPA) - nf;
        let spread = nf + lambda;
        let mean0 = lambda / spread;
        Self {
            scale: libm::sqrt(spread),
            mean0,
            cov0: mean0 + (1.0 - UKF_ALPHA * UKF_ALPHA + UKF_BETA),
            rest: 1.0 / (2.0 * spread),
        }
    }

    fn mean(&self, i: usize) -> f64 {
        if i == 0 {
            self.mean0
        } else {
            self.rest
        }
    }

    fn cov(&self, i: usize) -> f64 {
        if i == 0 {
            self.cov0
        } else {
            self.rest
        }
    }
}

/// Joint RSSI estimate over the scanners visible to one device
#[derive(Debug, Clone)]
pub struct RssiUkf {
    dims: BoundedVec<ScannerId, MAX_DIMENSIONS>,
    last_seen: [Timestamp; MAX_DIMENSIONS],
    mean: Vector,
    covariance: SquareMatrix,
    last_predict: Option<Timestamp>,
    update_count: u32,
    workspace: Box<UkfWorkspace>,
}

impl Default for RssiUkf {
    fn default() -> Self {
        Self::new()
    }
}

impl RssiUkf {
    /// Empty estimator
    pub fn new() -> Self {
        Self {
            dims: BoundedVec::new(),
            last_seen: [0; MAX_DIMENSIONS],
            mean: [0.0; MAX_DIMENSIONS],
            covariance: matrix::zeros(),
            last_predict: None,
            update_count: 0,
            workspace: Box::new(UkfWorkspace::new()),
        }
    }

    /// Active dimensions
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    /// No active dimensions
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Scanners in state order
    pub fn scanners(&self) -> &[ScannerId] {
        &self.dims
    }

    /// State index of `scanner`
    pub fn index_of(&self, scanner: &ScannerId) -> Option<usize> {
        self.dims.iter().position(|s| s == scanner)
    }

    /// Estimated RSSI at `scanner`
    pub fn mean_of(&self, scanner: &ScannerId) -> Option<f64> {
        self.index_of(scanner).map(|i| self.mean[i])
    }

    /// Variance of the estimate at `scanner`
    pub fn variance_of(&self, scanner: &ScannerId) -> Option<f64> {
        self.index_of(scanner).map(|i| self.covariance[i][i])
    }

    /// State mean by index
    pub fn mean_at(&self, i: usize) -> f64 {
        self.mean[i]
    }

    /// Covariance entry by index
    pub fn covariance_at(&self, i: usize, j: usize) -> f64 {
        self.covariance[i][j]
    }

    /// Successful observation updates
    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    /// Drop all dimensions
    pub fn reset(&mut self) {
        self.dims.clear();
        self.mean = [0.0; MAX_DIMENSIONS];
        self.covariance = matrix::zeros();
        self.last_predict = None;
        self.update_count = 0;
    }

    /// Propagate the state to `now`
    ///
    /// Variance grows by `UKF_PROCESS_NOISE · Δt` per dimension; dimensions
    /// silent for longer than the timeout are removed.
    pub fn predict(&mut self, now: Timestamp) -> Result<(), DeviceFault> {
        let dt = self.last_predict.map(|last| elapsed_secs(last, now)).unwrap_or(0.0);
        self.last_predict = Some(self.last_predict.map_or(now, |last| last.max(now)));

        self.prune(now);
        let n = self.dims.len();
        if n == 0 {
            return Ok(());
        }

        let weights = SigmaWeights::for_dimensions(n);
        self.generate_sigma_points(&weights)?;

        let ws = &mut *self.workspace;
        let points = 2 * n + 1;
        for point in ws.sigma.iter_mut().take(points) {
            for v in point.iter_mut().take(n) {
                *v = v.clamp(RSSI_MIN_DBM, RSSI_MAX_DBM);
            }
        }

        let mut mean = [0.0; MAX_DIMENSIONS];
        for (i, point) in ws.sigma.iter().enumerate().take(points) {
            let w = weights.mean(i);
            for d in 0..n {
                mean[d] += w * point[d];
            }
        }

        matrix::clear(&mut self.covariance, n);
        for (i, point) in ws.sigma.iter().enumerate().take(points) {
            let w = weights.cov(i);
            for r in 0..n {
                let dr = point[r] - mean[r];
                for c in 0..n {
                    self.covariance[r][c] += w * dr * (point[c] - mean[c]);
                }
            }
        }
        self.mean = mean;

        for d in 0..n {
            self.covariance[d][d] += UKF_PROCESS_NOISE * dt;
        }
        self.condition();
        self.check_finite("ukf predict")
    }

    /// Fold in one tick's observations
    ///
    /// Unknown scanners become new dimensions with `UKF_INITIAL_VARIANCE`,
    /// strongest first, so a full state turns away the weakest scanners.
    /// Only observed dimensions are corrected. A reading no newer than the
    /// last one applied to its dimension is skipped; that dimension only
    /// goes through prediction.
    pub fn update(&mut self, observations: &[UkfObservation], now: Timestamp) -> Result<(), DeviceFault> {
        self.predict(now)?;

        let mut ordered: Vec<&UkfObservation> = observations
            .iter()
            .filter(|o| is_plausible_rssi(o.rssi))
            .collect();
        ordered.sort_by(|a, b| b.rssi.total_cmp(&a.rssi));

        let mut observed: BoundedVec<(usize, f64, f64), MAX_DIMENSIONS> = BoundedVec::new();
        for obs in ordered {
            let index = match self.index_of(&obs.scanner_id) {
                Some(index) if obs.timestamp <= self.last_seen[index] => continue,
                Some(index) => index,
                None => match self.add_dimension(obs.scanner_id.clone(), obs.rssi, obs.timestamp) {
                    Some(index) => index,
                    None => {
                        log::debug!("ukf full, ignoring scanner {}", obs.scanner_id);
                        continue;
                    }
                },
            };
            if observed.iter().any(|(i, _, _)| *i == index) {
                continue;
            }
            let noise = if obs.noise.is_finite() {
                obs.noise.max(UKF_MIN_MEASUREMENT_NOISE)
            } else {
                UKF_MIN_MEASUREMENT_NOISE
            };
            self.last_seen[index] = obs.timestamp;
            // capacity equals MAX_DIMENSIONS and indices are unique
            let _ = observed.push((index, obs.rssi, noise));
        }

        let n = self.dims.len();
        let m = observed.len();
        if m == 0 {
            return Ok(());
        }
        if m > n {
            return Err(DeviceFault::DimensionMismatch { dims: n, observed: m });
        }

        let weights = SigmaWeights::for_dimensions(n);
        self.generate_sigma_points(&weights)?;

        let ws = &mut *self.workspace;
        let points = 2 * n + 1;

        // Observation sigma points: Zᵢ = h(χᵢ) selects observed dimensions
        let mut z_mean = [0.0; MAX_DIMENSIONS];
        for i in 0..points {
            for (k, (index, _, _)) in observed.iter().enumerate() {
                ws.observed[i][k] = ws.sigma[i][*index];
                z_mean[k] += weights.mean(i) * ws.observed[i][k];
            }
        }

        let mut x_mean = [0.0; MAX_DIMENSIONS];
        for i in 0..points {
            for d in 0..n {
                x_mean[d] += weights.mean(i) * ws.sigma[i][d];
            }
        }

        // S = Σ Wc (Z - z̄)(Z - z̄)ᵀ + R,  Pxz = Σ Wc (χ - x̄)(Z - z̄)ᵀ
        matrix::clear(&mut ws.innovation_cov, m);
        for row in ws.cross_cov.iter_mut().take(n) {
            for v in row.iter_mut().take(m) {
                *v = 0.0;
            }
        }
        for i in 0..points {
            let w = weights.cov(i);
            for a in 0..m {
                let za = ws.observed[i][a] - z_mean[a];
                for b in 0..m {
                    ws.innovation_cov[a][b] += w * za * (ws.observed[i][b] - z_mean[b]);
                }
                for d in 0..n {
                    ws.cross_cov[d][a] += w * (ws.sigma[i][d] - x_mean[d]) * za;
                }
            }
        }
        for (k, (_, _, noise)) in observed.iter().enumerate() {
            ws.innovation_cov[k][k] += noise;
        }
        matrix::make_symmetric(&mut ws.innovation_cov, m);

        if !matrix::invert(&ws.innovation_cov, &mut ws.innovation_inv, m) {
            return Err(DeviceFault::NonFinite { stage: "ukf innovation" });
        }

        // K = Pxz S⁻¹
        for d in 0..n {
            for k in 0..m {
                let mut sum = 0.0;
                for j in 0..m {
                    sum += ws.cross_cov[d][j] * ws.innovation_inv[j][k];
                }
                ws.gain[d][k] = sum;
            }
        }

        // x = x + K(z - z̄)
        for d in 0..n {
            let mut correction = 0.0;
            for (k, (_, rssi, _)) in observed.iter().enumerate() {
                correction += ws.gain[d][k] * (rssi - z_mean[k]);
            }
            self.mean[d] = (x_mean[d] + correction).clamp(RSSI_MIN_DBM, RSSI_MAX_DBM);
        }

        // P = P - K S Kᵀ
        for r in 0..n {
            for c in 0..n {
                let mut sum = 0.0;
                for a in 0..m {
                    let mut ks = 0.0;
                    for b in 0..m {
                        ks += ws.gain[r][b] * ws.innovation_cov[b][a];
                    }
                    sum += ks * ws.gain[c][a];
                }
                self.covariance[r][c] -= sum;
            }
        }

        self.condition();
        self.check_finite("ukf update")?;
        self.update_count = self.update_count.saturating_add(1);
        Ok(())
    }

    fn add_dimension(&mut self, scanner: ScannerId, rssi: f64, seen: Timestamp) -> Option<usize> {
        let index = self.dims.len();
        self.dims.push(scanner).ok()?;
        self.mean[index] = rssi;
        for i in 0..MAX_DIMENSIONS {
            self.covariance[index][i] = 0.0;
            self.covariance[i][index] = 0.0;
        }
        self.covariance[index][index] = UKF_INITIAL_VARIANCE;
        self.last_seen[index] = seen;
        Some(index)
    }

    fn remove_dimension(&mut self, index: usize) {
        let n = self.dims.len();
        if index >= n {
            return;
        }
        self.dims.remove(index);
        for i in index..n - 1 {
            self.mean[i] = self.mean[i + 1];
            self.last_seen[i] = self.last_seen[i + 1];
            self.covariance[i] = self.covariance[i + 1];
        }
        for row in self.covariance.iter_mut().take(n - 1) {
            for j in index..n - 1 {
                row[j] = row[j + 1];
            }
            row[n - 1] = 0.0;
        }
        self.covariance[n - 1] = [0.0; MAX_DIMENSIONS];
        self.mean[n - 1] = 0.0;
    }

    fn prune(&mut self, now: Timestamp) {
        let mut i = 0;
        while i < self.dims.len() {
            if elapsed_secs(self.last_seen[i], now) > DIMENSION_TIMEOUT_SECS {
                log::debug!("ukf dropping silent scanner {}", self.dims[i]);
                self.remove_dimension(i);
            } else {
                i += 1;
            }
        }
    }

    /// Fill the workspace with 2n+1 sigma points around the mean
    fn generate_sigma_points(&mut self, weights: &SigmaWeights) -> Result<(), DeviceFault> {
        let n = self.dims.len();
        if !matrix::cholesky(&self.covariance, &mut self.workspace.sqrt_cov, n) {
            self.condition();
            if !matrix::cholesky(&self.covariance, &mut self.workspace.sqrt_cov, n) {
                log::debug!("ukf covariance degraded to diagonal");
                for r in 0..n {
                    for c in 0..n {
                        if r != c {
                            self.covariance[r][c] = 0.0;
                        }
                    }
                }
                self.condition();
                if !matrix::cholesky(&self.covariance, &mut self.workspace.sqrt_cov, n) {
                    return Err(DeviceFault::NonFinite { stage: "ukf sigma points" });
                }
            }
        }

        let ws = &mut *self.workspace;
        ws.sigma[0] = self.mean;
        for col in 0..n {
            for d in 0..n {
                let offset = weights.scale * ws.sqrt_cov[d][col];
                ws.sigma[1 + col][d] = self.mean[d] + offset;
                ws.sigma[1 + n + col][d] = self.mean[d] - offset;
            }
        }
        Ok(())
    }

    /// Symmetrise, floor and cap the covariance
    fn condition(&mut self) {
        let n = self.dims.len();
        matrix::condition_covariance(&mut self.covariance, n, UKF_MIN_VARIANCE);
        for d in 0..n {
            let var = self.covariance[d][d];
            if var > UKF_MAX_VARIANCE {
                // D·P·D with D = diag(1, …, √(cap/var), …, 1) keeps P PSD
                let factor = libm::sqrt(UKF_MAX_VARIANCE / var);
                for j in 0..n {
                    self.covariance[d][j] *= factor;
                    self.covariance[j][d] *= factor;
                }
            }
        }
    }

    fn check_finite(&self, stage: &'static str) -> Result<(), DeviceFault> {
        let n = self.dims.len();
        if matrix::is_finite(&self.covariance, n) && self.mean.iter().take(n).all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(DeviceFault::NonFinite { stage })
        }
    }
}
