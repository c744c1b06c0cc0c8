//! # Portfolio Data Utilities
//!
//! $$
//! \Sigma_{ij} = \sigma_i \sigma_j \rho_{ij}
//! $$
//!
//! Helpers for moving between volatility/correlation and covariance form.

use nalgebra::DMatrix;

use super::error::PortfolioError;

/// Build a covariance matrix from per-asset volatilities and a correlation matrix.
///
/// `corr` is given row by row and must be `n x n` where `n = sigmas.len()`.
pub fn covariance_matrix(
  sigmas: &[f64],
  corr: &[Vec<f64>],
) -> Result<DMatrix<f64>, PortfolioError> {
  let n = sigmas.len();
  if corr.len() != n {
    return Err(PortfolioError::DimensionMismatch {
      expected: n,
      actual: corr.len(),
    });
  }
  if let Some(row) = corr.iter().find(|row| row.len() != n) {
    return Err(PortfolioError::DimensionMismatch {
      expected: n,
      actual: row.len(),
    });
  }

  Ok(DMatrix::from_fn(n, n, |i, j| sigmas[i] * sigmas[j] * corr[i][j]))
}

/// Build a covariance matrix from volatilities and a flat, row-major correlation list.
pub fn covariance_from_flat(
  sigmas: &[f64],
  corr: &[f64],
) -> Result<DMatrix<f64>, PortfolioError> {
  let n = sigmas.len();
  if corr.len() != n * n {
    return Err(PortfolioError::DimensionMismatch {
      expected: n * n,
      actual: corr.len(),
    });
  }
  if n == 0 {
    return Ok(DMatrix::zeros(0, 0));
  }

  let rows: Vec<Vec<f64>> = corr.chunks(n).map(|row| row.to_vec()).collect();
  covariance_matrix(sigmas, &rows)
}

/// Recover the correlation matrix implied by a covariance matrix.
///
/// Assets with zero variance get zero off-diagonal correlation.
pub fn correlation_matrix(cov: &DMatrix<f64>) -> DMatrix<f64> {
  let n = cov.nrows();
  let sd: Vec<f64> = (0..n).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();

  DMatrix::from_fn(n, n, |i, j| {
    let denom = sd[i] * sd[j];
    if i == j {
      1.0
    } else if denom > 1e-15 {
      (cov[(i, j)] / denom).clamp(-1.0, 1.0)
    } else {
      0.0
    }
  })
}
