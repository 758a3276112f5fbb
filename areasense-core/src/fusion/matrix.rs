//! Dense matrix routines over fixed-capacity arrays
//!
//! The estimator's dimension count changes at runtime (scanners come into and
//! go out of range) but never exceeds [`MAX_DIMENSIONS`]. Every routine takes
//! the active size `n` and touches only the leading `n × n` block, so storage
//! is allocated once and reused.

use crate::constants::estimator::{COVARIANCE_JITTER, MAX_DIMENSIONS, SINGULAR_PIVOT};
use crate::constants::learning::MIN_VARIANCE;

/// Square matrix with capacity for every dimension
pub type SquareMatrix = [[f64; MAX_DIMENSIONS]; MAX_DIMENSIONS];

/// Vector with capacity for every dimension
pub type Vector = [f64; MAX_DIMENSIONS];

/// All-zero matrix
pub const fn zeros() -> SquareMatrix {
    [[0.0; MAX_DIMENSIONS]; MAX_DIMENSIONS]
}

/// Zero the leading `n × n` block
pub fn clear(m: &mut SquareMatrix, n: usize) {
    for row in m.iter_mut().take(n) {
        for v in row.iter_mut().take(n) {
            *v = 0.0;
        }
    }
}

/// Make matrix symmetric: A = (A + Aᵀ) / 2
///
/// Round-off in the covariance update drifts the two triangles apart; left
/// alone, Cholesky eventually fails on a matrix that should be PSD.
pub fn make_symmetric(m: &mut SquareMatrix, n: usize) {
    for i in 0..n {
        for j in i + 1..n {
            let avg = (m[i][j] + m[j][i]) * 0.5;
            m[i][j] = avg;
            m[j][i] = avg;
        }
    }
}

/// Symmetrise, add jitter and floor the diagonal
pub fn condition_covariance(m: &mut SquareMatrix, n: usize, floor: f64) {
    make_symmetric(m, n);
    for i in 0..n {
        m[i][i] = (m[i][i] + COVARIANCE_JITTER).max(floor);
    }
}

/// Every entry of the leading block is finite
pub fn is_finite(m: &SquareMatrix, n: usize) -> bool {
    m.iter().take(n).all(|row| row.iter().take(n).all(|v| v.is_finite()))
}

/// Cholesky decomposition: A = L × Lᵀ
///
/// ## Algorithm
///
/// - Diagonal: L[j,j] = sqrt(A[j,j] - Σ(L[j,k]²))
/// - Below diagonal: L[i,j] = (A[i,j] - Σ(L[i,k]×L[j,k])) / L[j,j]
///
/// Returns false if the matrix is not positive definite.
pub fn cholesky(a: &SquareMatrix, l: &mut SquareMatrix, n: usize) -> bool {
    if n > MAX_DIMENSIONS {
        return false;
    }
    clear(l, n);

    for j in 0..n {
        let mut sum = 0.0;
        for k in 0..j {
            sum += l[j][k] * l[j][k];
        }

        let diag = a[j][j] - sum;
        if !(diag > SINGULAR_PIVOT) {
            return false;
        }
        l[j][j] = libm::sqrt(diag);

        for i in (j + 1)..n {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[i][k] * l[j][k];
            }
            l[i][j] = (a[i][j] - sum) / l[j][j];
        }
    }

    true
}

/// Matrix inversion using Gauss-Jordan elimination with partial pivoting
///
/// Returns false if the matrix is singular.
pub fn invert(a: &SquareMatrix, inv: &mut SquareMatrix, n: usize) -> bool {
    if n > MAX_DIMENSIONS {
        return false;
    }

    // Augmented matrix [A | I]
    let mut aug = [[0.0f64; MAX_DIMENSIONS * 2]; MAX_DIMENSIONS];
    for i in 0..n {
        for j in 0..n {
            aug[i][j] = a[i][j];
            aug[i][j + n] = if i == j { 1.0 } else { 0.0 };
        }
    }

    for k in 0..n {
        let mut max_row = k;
        let mut max_val = aug[k][k].abs();
        for (i, row) in aug.iter().enumerate().take(n).skip(k + 1) {
            if row[k].abs() > max_val {
                max_val = row[k].abs();
                max_row = i;
            }
        }

        if !(max_val > SINGULAR_PIVOT) {
            return false;
        }

        if max_row != k {
            aug.swap(k, max_row);
        }

        let pivot = aug[k][k];
        for v in aug[k].iter_mut().take(n * 2) {
            *v /= pivot;
        }

        for i in 0..n {
            if i != k {
                let factor = aug[i][k];
                if factor != 0.0 {
                    for j in 0..(n * 2) {
                        aug[i][j] -= factor * aug[k][j];
                    }
                }
            }
        }
    }

    for i in 0..n {
        for j in 0..n {
            inv[i][j] = aug[i][j + n];
        }
    }

    true
}

/// Forward substitution: solve L×y = b
pub fn forward_substitute(l: &SquareMatrix, b: &Vector, y: &mut Vector, n: usize) {
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[i][j] * y[j];
        }
        y[i] = (b[i] - sum) / l[i][i];
    }
}

/// How a Mahalanobis distance was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MahalanobisMethod {
    /// Full covariance via Cholesky
    Cholesky,
    /// Full covariance via Gauss-Jordan inverse
    GaussJordan,
    /// Diagonal only; the full matrix was degenerate
    Diagonal,
}

/// Squared Mahalanobis distance d² = xᵀ Σ⁻¹ x
///
/// Tries Cholesky, then a Gauss-Jordan inverse, then falls back to the
/// diagonal with each variance floored at [`MIN_VARIANCE`]. The result is
/// always finite and non-negative for finite input.
pub fn mahalanobis(cov: &SquareMatrix, diff: &Vector, n: usize) -> (f64, MahalanobisMethod) {
    let mut scratch = zeros();

    if cholesky(cov, &mut scratch, n) {
        let mut y = [0.0; MAX_DIMENSIONS];
        forward_substitute(&scratch, diff, &mut y, n);
        let d2: f64 = y.iter().take(n).map(|v| v * v).sum();
        if d2.is_finite() {
            return (d2, MahalanobisMethod::Cholesky);
        }
    }

    if invert(cov, &mut scratch, n) {
        let mut d2 = 0.0;
        for i in 0..n {
            for j in 0..n {
                d2 += diff[i] * scratch[i][j] * diff[j];
            }
        }
        if d2.is_finite() && d2 >= 0.0 {
            return (d2, MahalanobisMethod::GaussJordan);
        }
    }

    let d2 = (0..n)
        .map(|i| {
            let var = if cov[i][i].is_finite() { cov[i][i].max(MIN_VARIANCE) } else { MIN_VARIANCE };
            diff[i] * diff[i] / var
        })
        .sum();
    (d2, MahalanobisMethod::Diagonal)
}
